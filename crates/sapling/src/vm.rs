//! The tree-walking virtual machine.
//!
//! This module executes the instruction tree produced by the parser. It is
//! the **only** module that mutates runtime state — the environment, the
//! diagnostics call stack, the loose position, and the output sink all live
//! here; `operators`, `attrs`, and `call` are stateless helpers.
//!
//! Function calls snapshot the environment: the callee starts from the
//! caller's bindings plus its parameters, and its writes are discarded on
//! return. Imports evaluate the module in a child VM seeded the same way
//! and fold its final environment into a library value.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{ArgNode, BinOp, Body, Code, ImportSpec, Node, ParamNode};
use crate::attrs;
use crate::builtins;
use crate::cache;
use crate::call::{self, Arg, Param, TypeSpec};
use crate::env::Env;
use crate::error::{Error, Result};
use crate::modules;
use crate::operators;
use crate::parser;
use crate::token::Pos;
use crate::value::{ClassObj, Func, FuncKind, Method, Value, ValueKind};

/// Retained callers are diagnostics only; the stack is bounded so long
/// runs cannot grow it without limit.
const CALL_STACK_LIMIT: usize = 256;

/// A diagnostics record: the name of a function that was entered.
#[derive(Debug, Clone)]
pub struct Caller {
    pub name: String,
}

/// Where `print` output goes. A capture buffer is shared with child VMs so
/// imported modules print to the same place.
#[derive(Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    Capture(Rc<RefCell<Vec<String>>>),
}

/// Statement execution result: either a plain value or an in-flight
/// `return` unwinding to the enclosing call.
enum Flow {
    Normal(Value),
    Return(Value),
}

pub struct Vm {
    pub env: Env,
    src: Option<String>,
    loose_pos: Pos,
    call_stack: VecDeque<Caller>,
    base_dir: PathBuf,
    import_memo: Rc<RefCell<HashMap<PathBuf, Value>>>,
    output: OutputSink,
}

impl Vm {
    /// A VM with the base environment, printing to stdout. `src` is the
    /// source text retained for error rendering.
    pub fn new(src: Option<&str>) -> Self {
        Self {
            env: builtins::base_env(),
            src: src.map(str::to_string),
            loose_pos: Pos::default(),
            call_stack: VecDeque::new(),
            base_dir: std::env::current_dir().unwrap_or_default(),
            import_memo: Rc::new(RefCell::new(HashMap::new())),
            output: OutputSink::Stdout,
        }
    }

    /// A VM whose `print` output lands in a buffer read back with
    /// [`take_output`](Self::take_output).
    pub fn with_capture(src: Option<&str>) -> Self {
        let mut vm = Self::new(src);
        vm.output = OutputSink::Capture(Rc::new(RefCell::new(Vec::new())));
        vm
    }

    /// Directory that file imports resolve against.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    pub fn source(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn loose_pos(&self) -> Pos {
        self.loose_pos
    }

    /// The retained caller records, most recent first.
    pub fn call_stack(&self) -> impl Iterator<Item = &Caller> {
        self.call_stack.iter()
    }

    /// Parse and run a source string in this VM.
    pub fn eval_source(&mut self, src: &str) -> Result<()> {
        let code = parser::parse(src)?;
        if self.src.is_none() {
            self.src = Some(src.to_string());
        }
        self.run(&code)
    }

    /// Run a parsed program.
    ///
    /// A top-level `func main` is invoked once before the statement
    /// sequence executes.
    pub fn run(&mut self, code: &Code) -> Result<()> {
        let main = code.stmts.iter().find(|stmt| {
            matches!(stmt, Node::FuncDef { name, .. } if name == "main")
        });
        if let Some(def) = main {
            self.loose_pos = def.pos();
            self.exec(def)?;
            let main_fn = self.env.get("main").map(|slot| slot.value.clone());
            if let Some(f) = main_fn {
                self.call_callable(&f, Vec::new())?;
            }
        }

        for stmt in &code.stmts {
            self.loose_pos = stmt.pos();
            if let Flow::Return(_) = self.exec(stmt)? {
                break;
            }
        }
        Ok(())
    }

    pub fn write_line(&mut self, line: String) {
        match &self.output {
            OutputSink::Stdout => println!("{line}"),
            OutputSink::Capture(buf) => buf.borrow_mut().push(line),
        }
    }

    /// Drain the capture buffer. Empty for a stdout VM.
    pub fn take_output(&mut self) -> Vec<String> {
        match &self.output {
            OutputSink::Capture(buf) => std::mem::take(&mut *buf.borrow_mut()),
            OutputSink::Stdout => Vec::new(),
        }
    }

    /// A child VM for evaluating an imported module: same bindings, shared
    /// output sink and import memo, fresh call stack.
    fn child(&self, src: Option<String>) -> Vm {
        Vm {
            env: self.env.clone(),
            src,
            loose_pos: Pos::default(),
            call_stack: VecDeque::new(),
            base_dir: self.base_dir.clone(),
            import_memo: Rc::clone(&self.import_memo),
            output: self.output.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Statement execution
    // -----------------------------------------------------------------------

    fn exec(&mut self, node: &Node) -> Result<Flow> {
        match node {
            Node::Assign {
                pos,
                name,
                value,
                constant,
                op,
                annotation,
            } => {
                self.exec_assign(*pos, name, value, *constant, *op, annotation)?;
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::FuncDef {
                pos,
                name,
                params,
                body,
            } => {
                let params = self.lower_params(params)?;
                let f = Func::user(name.clone(), params, body.clone());
                self.env.insert(name.clone(), Value::func(f, *pos));
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::AttrFuncDef {
                pos,
                class_name,
                name,
                params,
                body,
            } => {
                self.exec_attr_func(*pos, class_name, name, params, body)?;
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::Struct { pos, name, fields } => {
                self.exec_struct(*pos, name, fields)?;
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::Enum { pos, name, members } => {
                let mut obj = ClassObj::new(name.clone(), "class");
                for member in members {
                    let value = self.eval(&member.value)?;
                    obj.attrs.insert(format!("_{}", member.name), value);
                }
                self.env.insert(name.clone(), Value::class(obj, *pos));
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::SetSelf {
                pos,
                field,
                value,
                class_name,
            } => {
                self.exec_set_self(*pos, field, value, class_name)?;
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::If {
                pos,
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.exec_body(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_body(otherwise)
                } else {
                    Ok(Flow::Normal(Value::nil(*pos)))
                }
            }

            Node::While {
                pos,
                condition,
                body,
            } => {
                while self.eval(condition)?.is_truthy() {
                    if let Flow::Return(v) = self.exec_body(body)? {
                        return Ok(Flow::Return(v));
                    }
                }
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            // Bottom-tested: the body always runs at least once.
            Node::Repeat { pos, body, until } => {
                loop {
                    if let Flow::Return(v) = self.exec_body(body)? {
                        return Ok(Flow::Return(v));
                    }
                    if self.eval(until)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            Node::Return { value, .. } => Ok(Flow::Return(self.eval(value)?)),

            Node::Import { pos, spec } => {
                match spec {
                    ImportSpec::Module(name) => self.import_module(name, None, *pos)?,
                    ImportSpec::From { names, module } => {
                        self.import_module(module, Some(names), *pos)?
                    }
                }
                Ok(Flow::Normal(Value::nil(*pos)))
            }

            _ => Ok(Flow::Normal(self.eval(node)?)),
        }
    }

    fn exec_body(&mut self, body: &Body) -> Result<Flow> {
        for stmt in &body.stmts {
            if let Flow::Return(v) = self.exec(stmt)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Normal(Value::nil(body.pos)))
    }

    fn exec_assign(
        &mut self,
        pos: Pos,
        name: &str,
        value_node: &Node,
        constant: bool,
        op: Option<BinOp>,
        annotation: &str,
    ) -> Result<()> {
        let mut value = self.eval(value_node)?;

        if let Some(op) = op {
            let Some(slot) = self.env.get(name) else {
                return Err(Error::name(name, pos));
            };
            if slot.constant {
                return Err(Error::runtime(
                    format!("Cannot assign to constant '{name}'"),
                    pos,
                ));
            }
            let current = slot.value.clone();
            value = operators::binary(op, &current, &value)?;
        }

        if let Some(slot) = self.env.get(name) {
            if slot.constant {
                return Err(Error::runtime(
                    format!("Cannot assign to constant '{name}'"),
                    pos,
                ));
            }
        }

        if annotation != "any" && annotation != value.type_name() {
            return Err(Error::type_error(
                format!("Assignment does not match annotated type '{annotation}'"),
                pos,
            ));
        }

        self.env.insert_var(name, value, constant);
        Ok(())
    }

    fn exec_attr_func(
        &mut self,
        pos: Pos,
        class_name: &str,
        name: &str,
        params: &[ParamNode],
        body: &Body,
    ) -> Result<()> {
        let Some(slot) = self.env.get(class_name) else {
            return Err(Error::name(class_name, pos));
        };
        let target = slot.value.clone();
        let ValueKind::Class(owner) = &target.kind else {
            return Err(Error::type_error(
                format!(
                    "Cannot set function '{name}' on '{}'",
                    target.type_name()
                ),
                target.pos,
            ));
        };

        let params = self.lower_params(params)?;
        let method = Method {
            func: Func::user(name.to_string(), params, body.clone()),
            owner: Rc::clone(owner),
        };
        owner
            .borrow_mut()
            .attrs
            .insert(format!("_{name}"), Value::method(method, pos));
        Ok(())
    }

    /// A struct declaration synthesises a class whose `_init` takes one
    /// annotated parameter per field and whose body writes each field back
    /// onto the class.
    fn exec_struct(
        &mut self,
        pos: Pos,
        name: &str,
        fields: &[crate::ast::StructField],
    ) -> Result<()> {
        let params: Vec<Param> = fields
            .iter()
            .map(|f| Param::typed(f.name.clone(), f.type_name.clone()))
            .collect();
        let body = Body {
            pos,
            stmts: fields
                .iter()
                .map(|f| Node::SetSelf {
                    pos: f.pos,
                    field: f.name.clone(),
                    value: Box::new(Node::Id {
                        pos: f.pos,
                        name: f.name.clone(),
                    }),
                    class_name: name.to_string(),
                })
                .collect(),
        };

        let mut obj = ClassObj::new(name, name);
        obj.display = Some(format!("Struct '{name}'"));
        obj.attrs.insert(
            "_init".to_string(),
            Value::func(Func::user("_init", params, body), pos),
        );
        self.env.insert(name, Value::class(obj, pos));
        Ok(())
    }

    fn exec_set_self(
        &mut self,
        pos: Pos,
        field: &str,
        value_node: &Node,
        class_name: &str,
    ) -> Result<()> {
        let Some(slot) = self.env.get(class_name) else {
            return Err(Error::name(class_name, pos));
        };
        let target = slot.value.clone();
        let ValueKind::Class(owner) = &target.kind else {
            return Err(Error::type_error(
                format!("Cannot set '{}' as self", target.type_name()),
                target.pos,
            ));
        };
        let value = self.eval(value_node)?;
        owner.borrow_mut().attrs.insert(format!("_{field}"), value);
        Ok(())
    }

    /// Parameter defaults are evaluated once, at definition time.
    fn lower_params(&mut self, params: &[ParamNode]) -> Result<Vec<Param>> {
        let mut out = Vec::with_capacity(params.len());
        for node in params {
            let ty = if node.annotation == "any" {
                TypeSpec::Any
            } else {
                TypeSpec::One(node.annotation.clone())
            };
            let mut param = Param::new(node.name.clone());
            param.ty = ty;
            if let Some(default) = &node.default {
                let value = self.eval(default)?;
                param = param.with_default(value);
            }
            out.push(param);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Expression evaluation
    // -----------------------------------------------------------------------

    fn eval(&mut self, node: &Node) -> Result<Value> {
        match node {
            Node::Int { pos, value } => Ok(Value::int(*value, *pos)),
            Node::Float { pos, value } => Ok(Value::float(*value, *pos)),
            Node::Hex { pos, value } => Ok(Value::hex(*value, *pos)),
            Node::Bool { pos, value } => Ok(Value::bool(*value, *pos)),
            Node::Str { pos, value } => Ok(Value::string(value.clone(), *pos)),
            Node::Nil { pos } => Ok(Value::nil(*pos)),
            Node::Regex { pos, pattern } => regex::Regex::new(pattern)
                .map(|re| Value::regex(re, *pos))
                .map_err(|_| {
                    Error::runtime(format!("Invalid regular expression '{pattern}'"), *pos)
                }),

            Node::Id { pos, name } => match self.env.get(name) {
                Some(slot) => Ok(slot.value.clone().at(*pos)),
                None => Err(Error::name(name, *pos)),
            },

            Node::Array { pos, items } => {
                let values: Result<Vec<Value>> = items.iter().map(|n| self.eval(n)).collect();
                Ok(Value::array(values?, *pos))
            }

            Node::Dictionary { pos, entries } => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    out.push((key, value));
                }
                Ok(Value::dictionary(out, *pos))
            }

            Node::ArrayComp {
                pos,
                expr,
                binder,
                source,
            } => self.eval_array_comp(*pos, expr, binder, source),

            Node::BinaryOp {
                op, left, right, ..
            } => self.eval_binary(*op, left, right),

            Node::UnaryOp { op, expr, .. } => {
                let value = self.eval(expr)?;
                operators::unary(*op, &value)
            }

            Node::Index { expr, index, .. } => {
                let container = self.eval(expr)?;
                let key = self.eval(index)?;
                index_value(&container, &key)
            }

            Node::Attribute {
                base,
                attr,
                null_safe,
                ..
            } => {
                let base = self.eval(base)?;
                self.get_attr(&base, attr, *null_safe)
            }

            Node::Call { func, args, .. } => {
                let callee = self.eval(func)?;
                let args = self.eval_args(args)?;
                self.call_callable(&callee, args)
            }

            Node::New { pos, class, args } => self.eval_new(*pos, class, args),

            other => Err(Error::runtime(
                "Statement cannot be used as an expression",
                other.pos(),
            )),
        }
    }

    /// `&&`/`||` short-circuit: the right operand is not evaluated when the
    /// left already determines the result.
    fn eval_binary(&mut self, op: BinOp, left: &Node, right: &Node) -> Result<Value> {
        let left = self.eval(left)?;

        if let (BinOp::And | BinOp::Or, ValueKind::Bool(a)) = (op, &left.kind) {
            match (op, *a) {
                (BinOp::And, false) => return Ok(Value::bool(false, left.pos)),
                (BinOp::Or, true) => return Ok(Value::bool(true, left.pos)),
                _ => {}
            }
        }

        let right = self.eval(right)?;
        operators::binary(op, &left, &right)
    }

    fn eval_array_comp(
        &mut self,
        pos: Pos,
        expr: &Node,
        binder: &str,
        source: &Node,
    ) -> Result<Value> {
        let source = self.eval(source)?;
        let ValueKind::Array(items) = &source.kind else {
            return Err(Error::type_error(
                "Expected 'array' for array comprehension",
                source.pos,
            ));
        };
        let items = items.borrow().clone();

        let saved = self.env.clone();
        let mut out = Vec::with_capacity(items.len());
        let mut failed = None;
        for item in items {
            self.env.insert(binder, item);
            match self.eval(expr) {
                Ok(v) => out.push(v),
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        self.env = saved;

        match failed {
            Some(e) => Err(e),
            None => Ok(Value::array(out, pos)),
        }
    }

    fn eval_args(&mut self, args: &[ArgNode]) -> Result<Vec<Arg>> {
        args.iter()
            .map(|a| {
                Ok(Arg {
                    value: self.eval(&a.value)?,
                    name: a.name.clone(),
                })
            })
            .collect()
    }

    fn eval_new(&mut self, pos: Pos, class: &Node, args: &[ArgNode]) -> Result<Value> {
        let class_val = self.eval(class)?;
        let init = match &class_val.kind {
            ValueKind::Class(rc) => rc.borrow().attrs.get("_init").cloned(),
            _ => {
                return Err(Error::type_error(
                    format!("Cannot instantiate type '{}'", class_val.type_name()),
                    class_val.pos,
                ));
            }
        };

        if let Some(init) = init {
            let args = self.eval_args(args)?;
            match &init.kind {
                ValueKind::Func(f) => {
                    let f = (**f).clone();
                    self.invoke(&f, None, args)?;
                }
                ValueKind::Method(m) => {
                    let f = m.func.clone();
                    let owner = Value::new(pos, ValueKind::Class(Rc::clone(&m.owner)));
                    self.invoke(&f, Some(owner), args)?;
                }
                _ => {
                    return Err(Error::type_error(
                        format!("'{}' is not callable", init.type_name()),
                        init.pos,
                    ));
                }
            }
        }

        Ok(class_val.at(pos))
    }

    // -----------------------------------------------------------------------
    // Attribute access
    // -----------------------------------------------------------------------

    /// Resolve `base.attr` (or `base?.attr` when `null_safe`).
    pub fn get_attr(&mut self, base: &Value, attr: &str, null_safe: bool) -> Result<Value> {
        if null_safe && matches!(base.kind, ValueKind::Nil) {
            return Ok(Value::nil(base.pos));
        }

        match &base.kind {
            ValueKind::Class(obj) | ValueKind::Lib(obj) => obj
                .borrow()
                .attrs
                .get(&format!("_{attr}"))
                .cloned()
                .map(|v| v.at(base.pos))
                .ok_or_else(|| Error::attribute(base.type_name(), attr, base.pos)),
            _ => attrs::lookup(base, attr)
                .ok_or_else(|| Error::attribute(base.type_name(), attr, base.pos)),
        }
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Call any callable value with already-evaluated arguments.
    pub fn call_callable(&mut self, callee: &Value, args: Vec<Arg>) -> Result<Value> {
        match &callee.kind {
            ValueKind::Func(f) => {
                let f = (**f).clone();
                self.push_caller(&f.name);
                self.invoke(&f, None, args)
            }
            ValueKind::Method(m) => {
                let f = m.func.clone();
                self.push_caller(&f.name);
                let owner = Value::new(callee.pos, ValueKind::Class(Rc::clone(&m.owner)));
                self.invoke(&f, Some(owner), args)
            }
            _ => Err(Error::type_error(
                format!("'{}' is not callable", callee.type_name()),
                callee.pos,
            )),
        }
    }

    /// Verify arguments and run the callable. A user-defined body executes
    /// against a snapshot of the caller's environment; methods bind `self`
    /// to the owning class first. A body without `return` yields `Nil`.
    fn invoke(&mut self, func: &Func, self_binding: Option<Value>, args: Vec<Arg>) -> Result<Value> {
        let verified = call::verify(&args, &func.params, self.loose_pos)?;

        match &func.kind {
            FuncKind::Host(f) => {
                let f = Rc::clone(f);
                f(self, verified)
            }
            FuncKind::User { body } => {
                let saved = self.env.clone();
                if let Some(this) = self_binding {
                    self.env.insert("self", this);
                }
                for (param, value) in func.params.iter().zip(verified) {
                    self.env.insert(param.name.clone(), value);
                }
                let flow = self.exec_body(body);
                self.env = saved;
                match flow? {
                    Flow::Return(v) => Ok(v),
                    Flow::Normal(_) => Ok(Value::nil(self.loose_pos)),
                }
            }
        }
    }

    fn push_caller(&mut self, name: &str) {
        if self.call_stack.len() == CALL_STACK_LIMIT {
            self.call_stack.pop_back();
        }
        self.call_stack.push_front(Caller {
            name: name.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Imports
    // -----------------------------------------------------------------------

    /// Resolve an import: a `.sap` source file in the base directory, then a
    /// `.sapped` parse-tree sidecar, then the builtin module registry.
    ///
    /// `names` is `Some` for a from-import, which copies the named
    /// attributes instead of binding the whole library.
    fn import_module(&mut self, module: &str, names: Option<&[String]>, pos: Pos) -> Result<()> {
        let sap = self.base_dir.join(format!("{module}.sap"));
        let sapped = self.base_dir.join(format!("{module}.sapped"));

        let lib = if sap.is_file() {
            debug!(module, path = %sap.display(), "importing source module");
            self.load_file_module(&sap, true, pos)?
        } else if sapped.is_file() {
            debug!(module, path = %sapped.display(), "importing pre-parsed module");
            self.load_file_module(&sapped, false, pos)?
        } else if let Some(lib) = modules::lookup(module, pos) {
            debug!(module, "importing builtin module");
            lib
        } else {
            return Err(Error::Import {
                name: module.to_string(),
                pos,
            });
        };

        match names {
            None => {
                let bind_name = module.replace('-', "_");
                self.env.insert(bind_name, lib);
            }
            Some(names) => {
                if let ValueKind::Lib(obj) = &lib.kind {
                    let obj = obj.borrow();
                    for name in names {
                        if let Some(value) = obj.attrs.get(&format!("_{name}")) {
                            self.env.insert(name.clone(), value.clone());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Evaluate a module file in a child VM and fold its environment into a
    /// library value. Results are memoised by canonical path.
    fn load_file_module(&mut self, path: &Path, is_source: bool, pos: Pos) -> Result<Value> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(lib) = self.import_memo.borrow().get(&canonical) {
            return Ok(lib.clone());
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().replace('-', "_"))
            .unwrap_or_default();

        let mut child;
        let code;
        if is_source {
            let src = std::fs::read_to_string(path).map_err(|_| Error::File {
                path: path.display().to_string(),
                pos,
            })?;
            code = parser::parse(&src)?;
            child = self.child(Some(src));
        } else {
            let bytes = std::fs::read(path).map_err(|_| Error::File {
                path: path.display().to_string(),
                pos,
            })?;
            code = cache::deserialize(&bytes)?;
            child = self.child(None);
        }
        child.run(&code)?;

        let mut obj = ClassObj::new(stem, "lib");
        for (name, value) in child.env.iter() {
            obj.attrs.insert(format!("_{name}"), value.clone());
        }
        let lib = Value::lib(obj, pos);

        self.import_memo
            .borrow_mut()
            .insert(canonical, lib.clone());
        Ok(lib)
    }
}

// ---------------------------------------------------------------------------
// Indexing
// ---------------------------------------------------------------------------

/// `container[key]`. Strings index to single-character strings, byte
/// strings to single bytes, arrays to elements, dictionaries by value
/// equality. Negative indices count from the end.
fn index_value(container: &Value, key: &Value) -> Result<Value> {
    let pos = container.pos;
    match (&container.kind, &key.kind) {
        (ValueKind::Str(s), ValueKind::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            match resolve_index(*i, chars.len()) {
                Some(idx) => Ok(Value::string(chars[idx].to_string(), pos)),
                None => Err(Error::index(format!("Index out of range '{i}'"), pos)),
            }
        }
        (ValueKind::StrBytes(b), ValueKind::Int(i)) => match resolve_index(*i, b.len()) {
            Some(idx) => Ok(Value::bytes(vec![b[idx]], pos)),
            None => Err(Error::index(format!("Index out of range '{i}'"), pos)),
        },
        (ValueKind::Array(items), ValueKind::Int(i)) => {
            let items = items.borrow();
            match resolve_index(*i, items.len()) {
                Some(idx) => Ok(items[idx].clone()),
                None => Err(Error::index(format!("Index out of range '{i}'"), pos)),
            }
        }
        (ValueKind::Dictionary(entries), _) => entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                Error::index(format!("Key not found '{}'", key.repr(true)), pos)
            }),
        _ => Err(Error::type_error(
            format!("Cannot index '{}'", container.type_name()),
            pos,
        )),
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { len as i64 + i } else { i };
    if idx >= 0 && (idx as usize) < len {
        Some(idx as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Vec<String> {
        let mut vm = Vm::with_capture(Some(src));
        vm.eval_source(src).unwrap();
        vm.take_output()
    }

    fn run_err(src: &str) -> Error {
        let mut vm = Vm::with_capture(Some(src));
        vm.eval_source(src).unwrap_err()
    }

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(run("print(1 + 2)"), vec!["3"]);
        assert_eq!(run("print(7 / 2)"), vec!["3.5"]);
        assert_eq!(run("print(2 * 3 + 4)"), vec!["10"]);
    }

    #[test]
    fn variables_and_compound_assignment() {
        assert_eq!(run("x = 1\nx += 4\nprint(x)"), vec!["5"]);
        assert_eq!(run("x = 10\nx /= 4\nprint(x)"), vec!["2.5"]);
    }

    #[test]
    fn undefined_name() {
        let err = run_err("print(missing)");
        assert_eq!(err.to_string(), "NameError: 'missing' is not defined");
    }

    #[test]
    fn constants_are_immutable() {
        let err = run_err("const x = 1\nx = 2");
        assert_eq!(
            err.to_string(),
            "RuntimeError: Cannot assign to constant 'x'"
        );
        let err = run_err("const x = 1\nx += 2");
        assert_eq!(
            err.to_string(),
            "RuntimeError: Cannot assign to constant 'x'"
        );
    }

    #[test]
    fn annotated_assignment() {
        assert_eq!(run("int x = 3\nprint(x)"), vec!["3"]);
        let err = run_err("int x = 's'");
        assert_eq!(
            err.to_string(),
            "TypeError: Assignment does not match annotated type 'int'"
        );
        assert_eq!(err.pos(), Pos::new(1, 1));
    }

    #[test]
    fn if_else_chains() {
        let src = "x = 2\nif x == 1 { print('one') } else if x == 2 { print('two') } else { print('many') }";
        assert_eq!(run(src), vec!["two"]);
    }

    #[test]
    fn while_loop() {
        assert_eq!(
            run("i = 0\nwhile i < 3 { i += 1 }\nprint(i)"),
            vec!["3"]
        );
    }

    #[test]
    fn repeat_until_is_bottom_tested() {
        assert_eq!(
            run("i = 0\nrepeat { i += 1 } until i == 3\nprint(i)"),
            vec!["3"]
        );
        // The body runs once even when the condition is already true.
        assert_eq!(
            run("i = 9\nrepeat { i += 1 } until true\nprint(i)"),
            vec!["10"]
        );
    }

    #[test]
    fn functions_and_recursion() {
        let src = "func fact(n) { if n <= 1 { return 1 } return n * fact(n - 1) }\nprint(fact(5))";
        assert_eq!(run(src), vec!["120"]);
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(run("func f() { }\nprint(f())"), vec!["nil"]);
    }

    #[test]
    fn callee_writes_stay_local() {
        let src = "x = 1\nfunc f() { x = 99\nreturn x }\nprint(f())\nprint(x)";
        assert_eq!(run(src), vec!["99", "1"]);
    }

    #[test]
    fn named_arguments_and_defaults() {
        let src = "func pair(a, b) { return a - b }\nprint(pair(b: 2, a: 10))";
        assert_eq!(run(src), vec!["8"]);
        let src = "func inc(x, int by = 1) { return x + by }\nprint(inc(4))\nprint(inc(4, 3))";
        assert_eq!(run(src), vec!["5", "7"]);
    }

    #[test]
    fn named_argument_evaluation_is_left_to_right() {
        // The dictionary handle is shared into the callee snapshots, so the
        // mutating `add` records the order the argument expressions ran in.
        let src = "log = {'seq': ''}\n\
                   func note(x) { log.add('seq', log['seq'] + x)\nreturn x }\n\
                   func pair(a, b) { return a + b }\n\
                   print(pair(b: note('B'), a: note('A')))\n\
                   print(log['seq'])";
        assert_eq!(run(src), vec!["AB", "BA"]);
    }

    #[test]
    fn short_circuit_logic() {
        // `boom` is never called: && short-circuits on a false left side.
        let src = "func boom() { return missing }\nprint(false && boom())";
        assert_eq!(run(src), vec!["false"]);
        let src = "func boom() { return missing }\nprint(true || boom())";
        assert_eq!(run(src), vec!["true"]);
    }

    #[test]
    fn non_callable_call() {
        let err = run_err("x = 1\nx()");
        assert_eq!(err.to_string(), "TypeError: 'int' is not callable");
    }

    #[test]
    fn string_methods_and_indexing() {
        assert_eq!(run("a = 'hello'\nprint(a.upper())"), vec!["HELLO"]);
        assert_eq!(run("print('hello'[1])"), vec!["e"]);
        // Negative indices count from the end (there is no unary minus, so
        // they only arise from computed values).
        assert_eq!(run("i = 0 - 1\nprint('hello'[i])"), vec!["o"]);
        let err = run_err("print('hi'[5])");
        assert_eq!(err.to_string(), "IndexError: Index out of range '5'");
    }

    #[test]
    fn arrays() {
        assert_eq!(run("arr = {1, 2, 3}\nprint(arr.add(4))"), vec!["{1, 2, 3, 4}"]);
        assert_eq!(run("arr = {1, 2, 3}\nprint(arr[1])"), vec!["2"]);
        assert_eq!(run("print(len({1, 2}))"), vec!["2"]);
        assert_eq!(run("print({1, 2} + {3})"), vec!["{1, 2, 3}"]);
    }

    #[test]
    fn dictionaries() {
        assert_eq!(run("d = {'a': 1, 'b': 2}\nprint(d['a'])"), vec!["1"]);
        assert_eq!(run("d = {'a': 1}\nprint(d.keys)"), vec!["{'a'}"]);
        let err = run_err("d = {'a': 1}\nprint(d['z'])");
        assert_eq!(err.to_string(), "IndexError: Key not found ''z''");
    }

    #[test]
    fn array_comprehension() {
        assert_eq!(
            run("print({x * x : x in {1, 2, 3}})"),
            vec!["{1, 4, 9}"]
        );
        let err = run_err("print({x : x in 5})");
        assert_eq!(
            err.to_string(),
            "TypeError: Expected 'array' for array comprehension"
        );
    }

    #[test]
    fn comprehension_binder_stays_local() {
        let err = run_err("{x * x : x in {1}}\nprint(x)");
        assert_eq!(err.to_string(), "NameError: 'x' is not defined");
    }

    #[test]
    fn structs() {
        let src = "struct P { int x int y }\np = new P(3, 4)\nprint(p.x)\nprint(p.y)";
        assert_eq!(run(src), vec!["3", "4"]);

        let err = run_err("struct P { int x int y }\np = new P(3)");
        assert_eq!(err.to_string(), "TypeError: Expected 2 arguments, got 1");

        let err = run_err("struct P { int x }\np = new P('s')");
        assert_eq!(err.to_string(), "TypeError: Expected 'int' but got 'string'");
    }

    #[test]
    fn struct_type_tag_override() {
        let src = "struct P { int x }\np = new P(1)\nprint(type(p))\nprint(p)";
        assert_eq!(run(src), vec!["P", "Struct 'P'"]);
    }

    #[test]
    fn methods() {
        let src = "enum C { tag = 0 }\nfunc C.hello() { return 1 }\nc = new C()\nprint(c.hello())";
        assert_eq!(run(src), vec!["1"]);
    }

    #[test]
    fn method_self_binding() {
        let src = "struct P { int x }\nfunc P.double() { return self.x * 2 }\np = new P(21)\nprint(p.double())";
        assert_eq!(run(src), vec!["42"]);
    }

    #[test]
    fn enums() {
        assert_eq!(
            run("enum Color { red = 1 green = 2 }\nprint(Color.red)"),
            vec!["1"]
        );
    }

    #[test]
    fn new_on_non_class() {
        let err = run_err("x = 5\nnew x()");
        assert_eq!(err.to_string(), "TypeError: Cannot instantiate type 'int'");
    }

    #[test]
    fn attribute_errors_and_null_safety() {
        let err = run_err("x = 1\nx.upper");
        assert_eq!(
            err.to_string(),
            "AttributeError: 'int' type has no attribute 'upper'"
        );
        assert_eq!(run("x = nil\nprint(x?.anything)"), vec!["nil"]);
        let err = run_err("x = nil\nx.anything");
        assert_eq!(
            err.to_string(),
            "AttributeError: 'nil' type has no attribute 'anything'"
        );
    }

    #[test]
    fn truthiness_of_not() {
        assert_eq!(run("print(!0)"), vec!["true"]);
        assert_eq!(run("print(!!'x')"), vec!["true"]);
        assert_eq!(run("print(!{})"), vec!["true"]);
    }

    #[test]
    fn main_runs_before_top_level_statements() {
        let src = "func main() { print('from main') }\nprint('top')";
        assert_eq!(run(src), vec!["from main", "top"]);
    }

    #[test]
    fn func_value_attributes() {
        let src = "func add(a, b) { return a + b }\nprint(add.name)\nprint(add.is_builtin)\nprint(add.call({2, 3}))";
        assert_eq!(run(src), vec!["add", "false", "5"]);
        assert_eq!(run("print(print.is_builtin)"), vec!["true"]);
    }

    #[test]
    fn loop_return_propagates_to_caller() {
        let src = "func find() { i = 0\nwhile true { i += 1\nif i == 4 { return i } } }\nprint(find())";
        assert_eq!(run(src), vec!["4"]);
    }
}
