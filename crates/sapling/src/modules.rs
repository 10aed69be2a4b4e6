//! Built-in modules: math, time, system.
//!
//! These back the last stage of import resolution. Each is assembled with
//! the [`crate::bridge`] builders; the breadth of a full standard library
//! is deliberately out of scope.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::bridge::LibBuilder;
use crate::call::Param;
use crate::error::{Error, Result};
use crate::token::Pos;
use crate::value::{Value, ValueKind};

/// Resolve a builtin module by name.
pub fn lookup(name: &str, pos: Pos) -> Option<Value> {
    match name {
        "math" => Some(math(pos)),
        "time" => Some(time(pos)),
        "system" => Some(system(pos)),
        _ => None,
    }
}

fn number(v: &Value) -> f64 {
    match &v.kind {
        ValueKind::Int(i) => *i as f64,
        ValueKind::Float(f) => *f,
        _ => 0.0,
    }
}

fn num_param(name: &str) -> Param {
    Param::any_of(name, &["int", "float"])
}

fn math(pos: Pos) -> Value {
    let mut m = LibBuilder::new("math");

    m.constant("pi", Value::float(std::f64::consts::PI, pos));
    m.constant("e", Value::float(std::f64::consts::E, pos));
    m.constant("tau", Value::float(std::f64::consts::TAU, pos));
    m.constant("inf", Value::float(f64::INFINITY, pos));

    m.function("sqrt", vec![num_param("x")], |_, args| {
        Ok(Value::float(number(&args[0]).sqrt(), args[0].pos))
    });
    m.function("floor", vec![num_param("x")], |_, args| {
        Ok(Value::int(number(&args[0]).floor() as i64, args[0].pos))
    });
    m.function("ceil", vec![num_param("x")], |_, args| {
        Ok(Value::int(number(&args[0]).ceil() as i64, args[0].pos))
    });
    m.function("abs", vec![num_param("x")], |_, args| {
        let x = &args[0];
        match &x.kind {
            ValueKind::Int(i) => Ok(Value::int(i.wrapping_abs(), x.pos)),
            _ => Ok(Value::float(number(x).abs(), x.pos)),
        }
    });
    m.function("pow", vec![num_param("x"), num_param("y")], |_, args| {
        Ok(Value::float(
            number(&args[0]).powf(number(&args[1])),
            args[0].pos,
        ))
    });
    m.function("log", vec![num_param("x")], |_, args| {
        Ok(Value::float(number(&args[0]).ln(), args[0].pos))
    });
    m.function("sin", vec![num_param("x")], |_, args| {
        Ok(Value::float(number(&args[0]).sin(), args[0].pos))
    });
    m.function("cos", vec![num_param("x")], |_, args| {
        Ok(Value::float(number(&args[0]).cos(), args[0].pos))
    });
    m.function("tan", vec![num_param("x")], |_, args| {
        Ok(Value::float(number(&args[0]).tan(), args[0].pos))
    });
    m.function(
        "gcd",
        vec![Param::typed("a", "int"), Param::typed("b", "int")],
        |_, args| {
            let int_of = |v: &Value| match v.kind {
                ValueKind::Int(i) => i.unsigned_abs(),
                _ => 0,
            };
            Ok(Value::int(gcd(int_of(&args[0]), int_of(&args[1])) as i64, args[0].pos))
        },
    );
    m.function("factorial", vec![Param::typed("n", "int")], |_, args| {
        let ValueKind::Int(n) = args[0].kind else {
            return Ok(Value::nil(args[0].pos));
        };
        factorial(n, args[0].pos)
    });

    m.build(pos)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn factorial(n: i64, pos: Pos) -> Result<Value> {
    if n < 0 {
        return Err(Error::type_error(
            "Factorial of a negative integer",
            pos,
        ));
    }
    let mut acc: i64 = 1;
    for i in 2..=n {
        acc = acc
            .checked_mul(i)
            .ok_or_else(|| Error::overflow(format!("Factorial of {n} overflows"), pos))?;
    }
    Ok(Value::int(acc, pos))
}

fn time(pos: Pos) -> Value {
    let mut t = LibBuilder::new("time");

    t.function("now", vec![], |_, _| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Ok(Value::float(secs, Pos::default()))
    });
    t.function("unix", vec![], |_, _| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Value::int(secs, Pos::default()))
    });
    t.function("sleep", vec![num_param("seconds")], |_, args| {
        let secs = number(&args[0]).max(0.0);
        std::thread::sleep(Duration::from_secs_f64(secs));
        Ok(Value::nil(args[0].pos))
    });

    t.build(pos)
}

fn system(pos: Pos) -> Value {
    let mut s = LibBuilder::new("system");

    s.constant("platform", Value::string(std::env::consts::OS, pos));
    s.constant("arch", Value::string(std::env::consts::ARCH, pos));

    s.function("env", vec![Param::typed("name", "string")], |_, args| {
        let name = match &args[0].kind {
            ValueKind::Str(s) => s.clone(),
            _ => String::new(),
        };
        match std::env::var(&name) {
            Ok(value) => Ok(Value::string(value, args[0].pos)),
            Err(_) => Ok(Value::nil(args[0].pos)),
        }
    });
    s.function("cwd", vec![], |_, _| {
        let dir = std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        Ok(Value::string(dir, Pos::default()))
    });

    s.build(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        assert!(lookup("math", Pos::default()).is_some());
        assert!(lookup("time", Pos::default()).is_some());
        assert!(lookup("system", Pos::default()).is_some());
        assert!(lookup("nope", Pos::default()).is_none());
    }

    #[test]
    fn factorial_overflow_is_an_overflow_error() {
        let err = factorial(30, Pos::default()).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: Factorial of 30 overflows");
        assert_eq!(factorial(5, Pos::default()).unwrap(), Value::int(120, Pos::default()));
    }
}
