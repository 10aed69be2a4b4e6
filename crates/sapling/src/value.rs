//! Runtime values.
//!
//! A [`Value`] is a source position plus a [`ValueKind`] payload. Every value
//! exposes a `type` tag string, truthiness, and a display form. Arrays,
//! dictionaries, classes and libraries are reference types: cloning a value
//! clones the handle, so `new` returns the same object the environment holds
//! and field writes are visible through every alias.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Body;
use crate::call::Param;
use crate::error::Result;
use crate::token::Pos;
use crate::vm::Vm;

/// A host-provided callable, invoked with the verified argument values.
pub type HostFn = Rc<dyn Fn(&mut Vm, Vec<Value>) -> Result<Value>>;

/// A function: either a user-defined body or a host callable. Both carry a
/// declared parameter list consumed by the same verifier.
#[derive(Clone)]
pub struct Func {
    pub name: String,
    pub params: Vec<Param>,
    pub kind: FuncKind,
}

#[derive(Clone)]
pub enum FuncKind {
    User { body: Body },
    Host(HostFn),
}

impl Func {
    pub fn user(name: impl Into<String>, params: Vec<Param>, body: Body) -> Self {
        Self {
            name: name.into(),
            params,
            kind: FuncKind::User { body },
        }
    }

    pub fn host<F>(name: impl Into<String>, params: Vec<Param>, f: F) -> Self
    where
        F: Fn(&mut Vm, Vec<Value>) -> Result<Value> + 'static,
    {
        Self {
            name: name.into(),
            params,
            kind: FuncKind::Host(Rc::new(f)),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, FuncKind::Host(_))
    }
}

/// A method: a function plus the class it is bound to. Calling it binds
/// `self` to the owning class in the callee environment.
#[derive(Clone)]
pub struct Method {
    pub func: Func,
    pub owner: Rc<RefCell<ClassObj>>,
}

/// The shared payload of classes and libraries.
///
/// The attribute map stores `_<name>` keys; Sapling source `c.foo` reads
/// attribute `_foo`. The single-underscore prefix separates exposed members
/// from implementation members of the host.
pub struct ClassObj {
    pub name: String,
    /// The value's `type` tag; `"class"`/`"lib"` unless overridden (struct
    /// classes are tagged with the struct name).
    pub type_tag: String,
    pub attrs: IndexMap<String, Value>,
    /// Fixed display override, e.g. `Struct 'P'`.
    pub display: Option<String>,
}

impl ClassObj {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            attrs: IndexMap::new(),
            display: None,
        }
    }
}

#[derive(Clone)]
pub enum ValueKind {
    Int(i64),
    Float(f64),
    Hex(i64),
    Bool(bool),
    Str(String),
    StrBytes(Vec<u8>),
    Nil,
    Regex(Rc<regex::Regex>),
    Array(Rc<RefCell<Vec<Value>>>),
    Dictionary(Rc<RefCell<Vec<(Value, Value)>>>),
    Func(Rc<Func>),
    Method(Rc<Method>),
    Class(Rc<RefCell<ClassObj>>),
    Lib(Rc<RefCell<ClassObj>>),
}

#[derive(Clone)]
pub struct Value {
    pub pos: Pos,
    pub kind: ValueKind,
}

impl Value {
    pub fn new(pos: Pos, kind: ValueKind) -> Self {
        Self { pos, kind }
    }

    pub fn int(value: i64, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Int(value))
    }

    pub fn float(value: f64, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Float(value))
    }

    pub fn hex(value: i64, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Hex(value))
    }

    pub fn bool(value: bool, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Bool(value))
    }

    pub fn string(value: impl Into<String>, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Str(value.into()))
    }

    pub fn bytes(value: Vec<u8>, pos: Pos) -> Self {
        Self::new(pos, ValueKind::StrBytes(value))
    }

    pub fn nil(pos: Pos) -> Self {
        Self::new(pos, ValueKind::Nil)
    }

    pub fn regex(re: regex::Regex, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Regex(Rc::new(re)))
    }

    pub fn array(items: Vec<Value>, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Array(Rc::new(RefCell::new(items))))
    }

    pub fn dictionary(entries: Vec<(Value, Value)>, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Dictionary(Rc::new(RefCell::new(entries))))
    }

    pub fn func(f: Func, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Func(Rc::new(f)))
    }

    pub fn method(m: Method, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Method(Rc::new(m)))
    }

    pub fn class(obj: ClassObj, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Class(Rc::new(RefCell::new(obj))))
    }

    pub fn lib(obj: ClassObj, pos: Pos) -> Self {
        Self::new(pos, ValueKind::Lib(Rc::new(RefCell::new(obj))))
    }

    /// The same value re-tagged with the position of a new reference site.
    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }

    /// The value's `type` tag.
    pub fn type_name(&self) -> String {
        match &self.kind {
            ValueKind::Int(_) => "int".to_string(),
            ValueKind::Float(_) => "float".to_string(),
            ValueKind::Hex(_) => "hex".to_string(),
            ValueKind::Bool(_) => "bool".to_string(),
            ValueKind::Str(_) => "string".to_string(),
            ValueKind::StrBytes(_) => "strbytes".to_string(),
            ValueKind::Nil => "nil".to_string(),
            ValueKind::Regex(_) => "regex".to_string(),
            ValueKind::Array(_) => "array".to_string(),
            ValueKind::Dictionary(_) => "dictionary".to_string(),
            ValueKind::Func(_) => "func".to_string(),
            ValueKind::Method(_) => "method".to_string(),
            ValueKind::Class(c) | ValueKind::Lib(c) => c.borrow().type_tag.clone(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match &self.kind {
            ValueKind::Int(v) => *v > 0,
            ValueKind::Float(v) => *v > 0.0,
            ValueKind::Hex(v) => *v != 0,
            ValueKind::Bool(v) => *v,
            ValueKind::Str(s) => !s.is_empty(),
            ValueKind::StrBytes(b) => !b.is_empty(),
            ValueKind::Nil => false,
            ValueKind::Regex(_) => true,
            ValueKind::Array(a) => !a.borrow().is_empty(),
            ValueKind::Dictionary(d) => !d.borrow().is_empty(),
            ValueKind::Func(_) | ValueKind::Method(_) | ValueKind::Class(_) | ValueKind::Lib(_) => {
                true
            }
        }
    }

    /// The display form used by `print` and by container rendering.
    ///
    /// `in_container` is true when a surrounding array or dictionary is
    /// asking: strings render quoted inside containers and bare at the top
    /// level, matching `print`.
    pub fn repr(&self, in_container: bool) -> String {
        match &self.kind {
            ValueKind::Int(v) => v.to_string(),
            ValueKind::Float(v) => fmt_float(*v),
            ValueKind::Hex(v) => v.to_string(),
            ValueKind::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            ValueKind::Str(s) => {
                if in_container {
                    format!("'{s}'")
                } else {
                    s.clone()
                }
            }
            ValueKind::StrBytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("strbytes({hex})")
            }
            ValueKind::Nil => "nil".to_string(),
            ValueKind::Regex(re) => re.as_str().to_string(),
            ValueKind::Array(items) => {
                let inner: Vec<String> = items.borrow().iter().map(|v| v.repr(true)).collect();
                format!("{{{}}}", inner.join(", "))
            }
            ValueKind::Dictionary(entries) => {
                let inner: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(true), v.repr(true)))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            ValueKind::Func(f) => format!("Func '{}'", f.name),
            ValueKind::Method(m) => format!("Method '{}'", m.func.name),
            ValueKind::Class(c) => {
                let c = c.borrow();
                c.display
                    .clone()
                    .unwrap_or_else(|| format!("Class '{}'", c.name))
            }
            ValueKind::Lib(l) => {
                let l = l.borrow();
                l.display
                    .clone()
                    .unwrap_or_else(|| format!("Lib '{}'", l.name))
            }
        }
    }
}

fn fmt_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f}.0")
    } else {
        f.to_string()
    }
}

/// Structural equality, ignoring positions. This backs dictionary key
/// lookup and the array `has`/`remove` methods; the user-visible `==`
/// operator goes through the operator table instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Float(a), ValueKind::Float(b)) => a == b,
            (ValueKind::Hex(a), ValueKind::Hex(b)) => a == b,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Str(a), ValueKind::Str(b)) => a == b,
            (ValueKind::StrBytes(a), ValueKind::StrBytes(b)) => a == b,
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Regex(a), ValueKind::Regex(b)) => a.as_str() == b.as_str(),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (ValueKind::Dictionary(a), ValueKind::Dictionary(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (ValueKind::Func(a), ValueKind::Func(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Method(a), ValueKind::Method(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Class(a), ValueKind::Class(b)) => Rc::ptr_eq(a, b),
            (ValueKind::Lib(a), ValueKind::Lib(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Debug renders the display form with the type tag, which keeps test
/// failure output readable.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.repr(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        let p = Pos::default();
        assert!(Value::int(1, p).is_truthy());
        assert!(!Value::int(0, p).is_truthy());
        assert!(!Value::int(-3, p).is_truthy());
        assert!(Value::float(0.5, p).is_truthy());
        assert!(!Value::float(0.0, p).is_truthy());
        assert!(Value::hex(0x2, p).is_truthy());
        assert!(!Value::hex(0x0, p).is_truthy());
        assert!(Value::string("x", p).is_truthy());
        assert!(!Value::string("", p).is_truthy());
        assert!(!Value::nil(p).is_truthy());
        assert!(!Value::array(vec![], p).is_truthy());
        assert!(Value::array(vec![Value::nil(p)], p).is_truthy());
    }

    #[test]
    fn repr_forms() {
        let p = Pos::default();
        assert_eq!(Value::int(3, p).repr(false), "3");
        assert_eq!(Value::float(5.0, p).repr(false), "5.0");
        assert_eq!(Value::float(2.5, p).repr(false), "2.5");
        assert_eq!(Value::bool(true, p).repr(false), "true");
        assert_eq!(Value::nil(p).repr(false), "nil");
        assert_eq!(Value::string("hi", p).repr(false), "hi");
        assert_eq!(Value::string("hi", p).repr(true), "'hi'");

        let arr = Value::array(
            vec![Value::int(1, p), Value::string("a", p), Value::nil(p)],
            p,
        );
        assert_eq!(arr.repr(false), "{1, 'a', nil}");

        let dict = Value::dictionary(vec![(Value::string("a", p), Value::int(1, p))], p);
        assert_eq!(dict.repr(false), "{'a': 1}");
    }

    #[test]
    fn container_handles_are_shared() {
        let p = Pos::default();
        let arr = Value::array(vec![Value::int(1, p)], p);
        let alias = arr.clone();
        if let ValueKind::Array(items) = &arr.kind {
            items.borrow_mut().push(Value::int(2, p));
        }
        assert_eq!(alias.repr(false), "{1, 2}");
    }

    #[test]
    fn structural_equality_ignores_position() {
        assert_eq!(Value::int(3, Pos::new(1, 1)), Value::int(3, Pos::new(9, 9)));
        assert_ne!(Value::int(3, Pos::default()), Value::float(3.0, Pos::default()));
    }
}
