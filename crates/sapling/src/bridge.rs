//! The host-module bridge.
//!
//! Builders that expose host Rust code to Sapling as class or library
//! values: constants become value attributes, functions become host
//! callables with declared parameter schemas, and an optional display
//! string and type-tag override shape how the value presents itself.
//! The builtin module registry and the scalar method tables are built on
//! the same mechanism, so one call verifier serves everything.

use crate::call::Param;
use crate::error::Result;
use crate::token::Pos;
use crate::value::{ClassObj, Func, Value};
use crate::vm::Vm;

/// Builder for a library value (`type` tag `"lib"`).
pub struct LibBuilder {
    obj: ClassObj,
}

impl LibBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            obj: ClassObj::new(name, "lib"),
        }
    }

    /// Expose a constant attribute.
    pub fn constant(&mut self, name: &str, value: Value) -> &mut Self {
        self.obj.attrs.insert(format!("_{name}"), value);
        self
    }

    /// Expose a host function with a declared parameter schema.
    pub fn function<F>(&mut self, name: &str, params: Vec<Param>, f: F) -> &mut Self
    where
        F: Fn(&mut Vm, Vec<Value>) -> Result<Value> + 'static,
    {
        let func = Func::host(name, params, f);
        self.obj
            .attrs
            .insert(format!("_{name}"), Value::func(func, Pos::default()));
        self
    }

    /// Override the display string.
    pub fn display(&mut self, display: impl Into<String>) -> &mut Self {
        self.obj.display = Some(display.into());
        self
    }

    pub fn build(self, pos: Pos) -> Value {
        Value::lib(self.obj, pos)
    }
}

/// Builder for a class value. Same surface as [`LibBuilder`] plus a
/// type-tag override.
pub struct ClassBuilder {
    obj: ClassObj,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            obj: ClassObj::new(name, "class"),
        }
    }

    /// Override the value's `type` tag (struct classes are tagged with the
    /// struct name, for example).
    pub fn type_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.obj.type_tag = tag.into();
        self
    }

    pub fn constant(&mut self, name: &str, value: Value) -> &mut Self {
        self.obj.attrs.insert(format!("_{name}"), value);
        self
    }

    pub fn function<F>(&mut self, name: &str, params: Vec<Param>, f: F) -> &mut Self
    where
        F: Fn(&mut Vm, Vec<Value>) -> Result<Value> + 'static,
    {
        let func = Func::host(name, params, f);
        self.obj
            .attrs
            .insert(format!("_{name}"), Value::func(func, Pos::default()));
        self
    }

    pub fn display(&mut self, display: impl Into<String>) -> &mut Self {
        self.obj.display = Some(display.into());
        self
    }

    pub fn build(self, pos: Pos) -> Value {
        Value::class(self.obj, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn library_attributes_are_prefixed() {
        let mut b = LibBuilder::new("demo");
        b.constant("version", Value::string("1.0", Pos::default()));
        b.function("noop", vec![], |_, _| Ok(Value::nil(Pos::default())));
        let lib = b.build(Pos::default());

        let ValueKind::Lib(obj) = &lib.kind else {
            panic!()
        };
        let obj = obj.borrow();
        assert!(obj.attrs.contains_key("_version"));
        assert!(obj.attrs.contains_key("_noop"));
        assert_eq!(lib.type_name(), "lib");
    }

    #[test]
    fn class_type_tag_override() {
        let mut b = ClassBuilder::new("Window");
        b.type_tag("Window").display("Class 'Window'");
        let class = b.build(Pos::default());
        assert_eq!(class.type_name(), "Window");
        assert_eq!(class.repr(false), "Class 'Window'");
    }
}
