//! The base environment: host functions every program starts with.
//!
//! Each builtin is a [`Func`] with a declared parameter schema, so the call
//! verifier treats them exactly like user-defined functions.

use crate::call::Param;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::token::Pos;
use crate::value::{Func, Value, ValueKind};
use crate::vm::Vm;

/// Build the environment every VM starts from.
pub fn base_env() -> Env {
    let mut env = Env::new();
    let pos = Pos::default();

    let mut install = |name: &str, params: Vec<Param>, f: fn(&mut Vm, Vec<Value>) -> Result<Value>| {
        env.insert(name, Value::func(Func::host(name, params, f), pos));
    };

    install("print", vec![Param::new("x")], |vm, args| {
        let line = args[0].repr(false);
        vm.write_line(line);
        Ok(Value::nil(args[0].pos))
    });

    install("type", vec![Param::new("x")], |_, args| {
        Ok(Value::string(args[0].type_name(), args[0].pos))
    });

    install("len", vec![Param::new("x")], |_, args| {
        let x = &args[0];
        let len = match &x.kind {
            ValueKind::Str(s) => s.chars().count(),
            ValueKind::StrBytes(b) => b.len(),
            ValueKind::Array(items) => items.borrow().len(),
            ValueKind::Dictionary(entries) => entries.borrow().len(),
            ValueKind::Regex(re) => re.as_str().chars().count(),
            _ => {
                return Err(Error::type_error(
                    format!("Cannot find length of type '{}'", x.type_name()),
                    x.pos,
                ));
            }
        };
        Ok(Value::int(len as i64, x.pos))
    });

    install("attrs", vec![Param::new("x")], |_, args| {
        let x = &args[0];
        let names: Vec<Value> = match &x.kind {
            ValueKind::Class(obj) | ValueKind::Lib(obj) => obj
                .borrow()
                .attrs
                .keys()
                .map(|k| Value::string(k.trim_start_matches('_'), x.pos))
                .collect(),
            _ => crate::attrs::names(x)
                .into_iter()
                .map(|n| Value::string(n, x.pos))
                .collect(),
        };
        Ok(Value::array(names, x.pos))
    });

    install(
        "get",
        vec![Param::new("obj"), Param::typed("name", "string")],
        |vm, args| {
            let name = string_arg(&args[1]);
            vm.get_attr(&args[0], &name, false)
        },
    );

    install(
        "set",
        vec![
            Param::new("obj"),
            Param::typed("name", "string"),
            Param::new("value"),
        ],
        |_, mut args| {
            let value = args.pop().expect("verified arity");
            let name = string_arg(&args[1]);
            let obj = &args[0];
            match &obj.kind {
                ValueKind::Class(c) | ValueKind::Lib(c) => {
                    c.borrow_mut().attrs.insert(format!("_{name}"), value);
                    Ok(Value::nil(obj.pos))
                }
                _ => Err(Error::runtime(
                    format!("Cannot set attribute on '{}'", obj.type_name()),
                    obj.pos,
                )),
            }
        },
    );

    install("args_of", vec![Param::new("f")], |_, args| {
        let f = &args[0];
        let params = match &f.kind {
            ValueKind::Func(func) => &func.params,
            ValueKind::Method(m) => &m.func.params,
            _ => {
                return Err(Error::type_error(
                    format!("'{}' is not callable", f.type_name()),
                    f.pos,
                ));
            }
        };
        let names: Vec<Value> = params
            .iter()
            .map(|p| Value::string(p.name.clone(), f.pos))
            .collect();
        Ok(Value::array(names, f.pos))
    });

    install(
        "range",
        vec![
            Param::typed("start", "int"),
            Param::typed("end", "int"),
            Param::typed("increment", "int").with_synth_default(|pos| Value::int(1, pos)),
        ],
        |_, args| {
            let (start, end, inc) = (int_arg(&args[0]), int_arg(&args[1]), int_arg(&args[2]));
            if inc == 0 {
                return Err(Error::runtime(
                    "Range increment cannot be zero",
                    args[2].pos,
                ));
            }
            let mut items = Vec::new();
            let mut i = start;
            while (inc > 0 && i < end) || (inc < 0 && i > end) {
                items.push(Value::int(i, args[0].pos));
                i += inc;
            }
            Ok(Value::array(items, args[0].pos))
        },
    );

    install("to_int", vec![Param::new("x")], |vm, args| {
        let x = &args[0];
        let value = match &x.kind {
            ValueKind::Int(v) | ValueKind::Hex(v) => Some(*v),
            ValueKind::Float(v) => Some(*v as i64),
            ValueKind::Bool(v) => Some(i64::from(*v)),
            ValueKind::Str(s) => s.trim().parse().ok(),
            _ => None,
        };
        match value {
            Some(v) => Ok(Value::int(v, x.pos)),
            None => Err(Error::type_error("Invalid cast type 'int'", vm.loose_pos())),
        }
    });

    install("to_float", vec![Param::new("x")], |vm, args| {
        let x = &args[0];
        let value = match &x.kind {
            ValueKind::Int(v) | ValueKind::Hex(v) => Some(*v as f64),
            ValueKind::Float(v) => Some(*v),
            ValueKind::Bool(v) => Some(f64::from(u8::from(*v))),
            ValueKind::Str(s) => s.trim().parse().ok(),
            _ => None,
        };
        match value {
            Some(v) => Ok(Value::float(v, x.pos)),
            None => Err(Error::type_error(
                "Invalid cast type 'float'",
                vm.loose_pos(),
            )),
        }
    });

    install("to_string", vec![Param::new("x")], |_, args| {
        Ok(Value::string(args[0].repr(false), args[0].pos))
    });

    install("to_bool", vec![Param::new("x")], |_, args| {
        Ok(Value::bool(args[0].is_truthy(), args[0].pos))
    });

    env
}

fn string_arg(v: &Value) -> String {
    match &v.kind {
        ValueKind::Str(s) => s.clone(),
        _ => String::new(),
    }
}

fn int_arg(v: &Value) -> i64 {
    match &v.kind {
        ValueKind::Int(i) => *i,
        _ => 0,
    }
}
