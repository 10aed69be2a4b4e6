//! Attribute tables for the scalar value variants.
//!
//! Classes and libraries carry an explicit attribute map; every other
//! variant resolves attributes through the static tables here. Properties
//! compute their value at access time; methods resolve to host functions
//! capturing the receiver, so `"hi".upper` is itself a callable value.

use crate::call::Param;
use crate::error::{Error, Result};
use crate::value::{Func, Value, ValueKind};
use crate::vm::Vm;

/// Resolve an attribute on a scalar value. `attr` is the bare name as
/// written in source (`c.foo` passes `foo`). Returns `None` when the
/// variant has no such attribute.
pub fn lookup(value: &Value, attr: &str) -> Option<Value> {
    match &value.kind {
        ValueKind::Str(s) => str_attr(s, attr, value),
        ValueKind::StrBytes(b) => bytes_attr(b, attr, value),
        ValueKind::Int(n) => int_attr(*n, attr, value),
        ValueKind::Regex(_) => regex_attr(attr, value),
        ValueKind::Array(_) => array_attr(attr, value),
        ValueKind::Dictionary(_) => dict_attr(attr, value),
        ValueKind::Func(f) => func_attr(&f.name, f.is_host(), attr, value),
        ValueKind::Method(m) => func_attr(&m.func.name, m.func.is_host(), attr, value),
        _ => None,
    }
}

/// The attribute names a value exposes, for the `attrs` builtin.
pub fn names(value: &Value) -> Vec<&'static str> {
    match &value.kind {
        ValueKind::Str(_) => vec![
            "end", "join", "length", "lower", "replace", "split", "start", "strip", "title",
            "to_bytes", "upper",
        ],
        ValueKind::StrBytes(_) => vec!["end", "length", "start", "to_string"],
        ValueKind::Int(_) => vec!["to_bin", "to_hex", "to_octal"],
        ValueKind::Regex(_) => vec!["find_all", "match", "match_string"],
        ValueKind::Array(_) => vec!["add", "get", "has", "remove", "set"],
        ValueKind::Dictionary(_) => vec!["add", "get", "keys", "values"],
        ValueKind::Func(_) | ValueKind::Method(_) => vec!["call", "is_builtin", "name"],
        _ => Vec::new(),
    }
}

/// Build a host-function attribute capturing the receiver.
fn method<F>(name: &str, params: Vec<Param>, receiver: &Value, f: F) -> Option<Value>
where
    F: Fn(&mut Vm, &Value, Vec<Value>) -> Result<Value> + 'static,
{
    let captured = receiver.clone();
    Some(Value::func(
        Func::host(name, params, move |vm, args| f(vm, &captured, args)),
        receiver.pos,
    ))
}

fn expect_str(v: &Value) -> String {
    match &v.kind {
        ValueKind::Str(s) => s.clone(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// String
// ---------------------------------------------------------------------------

fn str_attr(s: &str, attr: &str, value: &Value) -> Option<Value> {
    let pos = value.pos;
    match attr {
        "length" => Some(Value::int(s.chars().count() as i64, pos)),
        "start" => match s.chars().next() {
            Some(c) => Some(Value::string(c.to_string(), pos)),
            None => Some(Value::nil(pos)),
        },
        "end" => match s.chars().last() {
            Some(c) => Some(Value::string(c.to_string(), pos)),
            None => Some(Value::nil(pos)),
        },
        "upper" => method("upper", vec![], value, |_, recv, _| {
            Ok(Value::string(expect_str(recv).to_uppercase(), recv.pos))
        }),
        "lower" => method("lower", vec![], value, |_, recv, _| {
            Ok(Value::string(expect_str(recv).to_lowercase(), recv.pos))
        }),
        "title" => method("title", vec![], value, |_, recv, _| {
            Ok(Value::string(title_case(&expect_str(recv)), recv.pos))
        }),
        "replace" => method(
            "replace",
            vec![Param::typed("old", "string"), Param::typed("new", "string")],
            value,
            |_, recv, args| {
                let old = expect_str(&args[0]);
                let new = expect_str(&args[1]);
                Ok(Value::string(
                    expect_str(recv).replace(&old, &new),
                    recv.pos,
                ))
            },
        ),
        "split" => method(
            "split",
            vec![Param::typed("text", "string")],
            value,
            |_, recv, args| {
                let sep = expect_str(&args[0]);
                let s = expect_str(recv);
                let parts: Vec<Value> = if sep.is_empty() {
                    s.chars()
                        .map(|c| Value::string(c.to_string(), recv.pos))
                        .collect()
                } else {
                    s.split(&sep).map(|p| Value::string(p, recv.pos)).collect()
                };
                Ok(Value::array(parts, recv.pos))
            },
        ),
        "join" => method(
            "join",
            vec![Param::typed("text", "string")],
            value,
            |_, recv, args| {
                // Intersperses the separator between the receiver's characters.
                let sep = expect_str(&args[0]);
                let joined: Vec<String> = expect_str(recv)
                    .chars()
                    .map(|c| c.to_string())
                    .collect();
                Ok(Value::string(joined.join(&sep), recv.pos))
            },
        ),
        "strip" => method(
            "strip",
            vec![Param::typed("text", "string")],
            value,
            |_, recv, args| {
                let chars: Vec<char> = expect_str(&args[0]).chars().collect();
                let s = expect_str(recv);
                Ok(Value::string(
                    s.trim_matches(|c| chars.contains(&c)),
                    recv.pos,
                ))
            },
        ),
        "to_bytes" => method("to_bytes", vec![], value, |_, recv, _| {
            Ok(Value::bytes(expect_str(recv).into_bytes(), recv.pos))
        }),
        _ => None,
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// StrBytes
// ---------------------------------------------------------------------------

fn bytes_attr(b: &[u8], attr: &str, value: &Value) -> Option<Value> {
    let pos = value.pos;
    match attr {
        "length" => Some(Value::int(b.len() as i64, pos)),
        "start" => match b.first() {
            Some(byte) => Some(Value::bytes(vec![*byte], pos)),
            None => Some(Value::nil(pos)),
        },
        "end" => match b.last() {
            Some(byte) => Some(Value::bytes(vec![*byte], pos)),
            None => Some(Value::nil(pos)),
        },
        "to_string" => method("to_string", vec![], value, |_, recv, _| {
            let ValueKind::StrBytes(bytes) = &recv.kind else {
                return Ok(Value::nil(recv.pos));
            };
            String::from_utf8(bytes.clone())
                .map(|s| Value::string(s, recv.pos))
                .map_err(|_| Error::decode("Byte string is not valid UTF-8", recv.pos))
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Int
// ---------------------------------------------------------------------------

fn int_attr(n: i64, attr: &str, value: &Value) -> Option<Value> {
    match attr {
        "to_hex" => method("to_hex", vec![], value, move |_, recv, _| {
            Ok(Value::string(format!("{n:#x}"), recv.pos))
        }),
        "to_octal" => method("to_octal", vec![], value, move |_, recv, _| {
            Ok(Value::string(format!("{n:#o}"), recv.pos))
        }),
        "to_bin" => method("to_bin", vec![], value, move |_, recv, _| {
            Ok(Value::string(format!("{n:#b}"), recv.pos))
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Regex
// ---------------------------------------------------------------------------

fn regex_attr(attr: &str, value: &Value) -> Option<Value> {
    let re = |v: &Value| match &v.kind {
        ValueKind::Regex(re) => Some(re.clone()),
        _ => None,
    };
    match attr {
        "match" => method(
            "match",
            vec![Param::typed("string", "string")],
            value,
            move |_, recv, args| {
                let re = re(recv).expect("receiver is a regex");
                let text = expect_str(&args[0]);
                let hit = re.find(&text).is_some_and(|m| m.start() == 0);
                Ok(Value::bool(hit, recv.pos))
            },
        ),
        "match_string" => method(
            "match_string",
            vec![Param::typed("string", "string")],
            value,
            move |_, recv, args| {
                let re = re(recv).expect("receiver is a regex");
                let text = expect_str(&args[0]);
                match re.find(&text).filter(|m| m.start() == 0) {
                    Some(m) => Ok(Value::string(m.as_str(), recv.pos)),
                    None => Ok(Value::nil(recv.pos)),
                }
            },
        ),
        "find_all" => method(
            "find_all",
            vec![Param::typed("string", "string")],
            value,
            move |_, recv, args| {
                let re = re(recv).expect("receiver is a regex");
                let text = expect_str(&args[0]);
                let hits: Vec<Value> = re
                    .find_iter(&text)
                    .map(|m| Value::string(m.as_str(), recv.pos))
                    .collect();
                Ok(Value::array(hits, recv.pos))
            },
        ),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

fn array_attr(attr: &str, value: &Value) -> Option<Value> {
    let items = |v: &Value| match &v.kind {
        ValueKind::Array(items) => items.clone(),
        _ => unreachable!("receiver is an array"),
    };
    match attr {
        "get" => method(
            "get",
            vec![Param::typed("index", "int")],
            value,
            move |_, recv, args| {
                let items = items(recv);
                let items = items.borrow();
                let ValueKind::Int(i) = args[0].kind else {
                    return Ok(Value::nil(recv.pos));
                };
                match resolve_index(i, items.len()) {
                    Some(idx) => Ok(items[idx].clone()),
                    None => Ok(Value::nil(recv.pos)),
                }
            },
        ),
        "set" => method(
            "set",
            vec![Param::typed("index", "int"), Param::new("value")],
            value,
            move |_, recv, mut args| {
                let value = args.pop().expect("verified arity");
                let ValueKind::Int(i) = args[0].kind else {
                    return Ok(Value::nil(recv.pos));
                };
                let items = items(recv);
                let mut items = items.borrow_mut();
                let len = items.len();
                if let Some(idx) = resolve_index(i, len) {
                    items[idx] = value;
                }
                Ok(Value::nil(recv.pos))
            },
        ),
        "add" => method(
            "add",
            vec![Param::new("value")],
            value,
            move |_, recv, mut args| {
                let items = items(recv);
                let mut out = items.borrow().clone();
                out.push(args.pop().expect("verified arity"));
                Ok(Value::array(out, recv.pos))
            },
        ),
        "remove" => method(
            "remove",
            vec![Param::new("value")],
            value,
            move |_, recv, args| {
                let items = items(recv);
                let out: Vec<Value> = items
                    .borrow()
                    .iter()
                    .filter(|v| **v != args[0])
                    .cloned()
                    .collect();
                Ok(Value::array(out, recv.pos))
            },
        ),
        "has" => method(
            "has",
            vec![Param::new("value")],
            value,
            move |_, recv, args| {
                let items = items(recv);
                let found = items.borrow().contains(&args[0]);
                Ok(Value::bool(found, recv.pos))
            },
        ),
        _ => None,
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

// ---------------------------------------------------------------------------
// Dictionary
// ---------------------------------------------------------------------------

fn dict_attr(attr: &str, value: &Value) -> Option<Value> {
    let entries = |v: &Value| match &v.kind {
        ValueKind::Dictionary(entries) => entries.clone(),
        _ => unreachable!("receiver is a dictionary"),
    };
    match attr {
        "keys" => {
            let entries = entries(value);
            let keys: Vec<Value> = entries.borrow().iter().map(|(k, _)| k.clone()).collect();
            Some(Value::array(keys, value.pos))
        }
        "values" => {
            let entries = entries(value);
            let values: Vec<Value> = entries.borrow().iter().map(|(_, v)| v.clone()).collect();
            Some(Value::array(values, value.pos))
        }
        "get" => method(
            "get",
            vec![Param::new("key")],
            value,
            move |_, recv, args| {
                let entries = entries(recv);
                let entries = entries.borrow();
                match entries.iter().find(|(k, _)| *k == args[0]) {
                    Some((_, v)) => Ok(v.clone()),
                    None => Ok(Value::nil(args[0].pos)),
                }
            },
        ),
        "add" => method(
            "add",
            vec![Param::new("key"), Param::new("value")],
            value,
            move |_, recv, mut args| {
                let value = args.pop().expect("verified arity");
                let key = args.pop().expect("verified arity");
                let entries = entries(recv);
                let mut entries = entries.borrow_mut();
                if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = value;
                } else {
                    entries.push((key, value));
                }
                Ok(Value::nil(recv.pos))
            },
        ),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Func / Method
// ---------------------------------------------------------------------------

fn func_attr(name: &str, is_host: bool, attr: &str, value: &Value) -> Option<Value> {
    let pos = value.pos;
    match attr {
        "name" => Some(Value::string(name, pos)),
        "is_builtin" => Some(Value::bool(is_host, pos)),
        "call" => method(
            "call",
            vec![Param::typed("args", "array").with_synth_default(|pos| Value::array(vec![], pos))],
            value,
            |vm, recv, args| {
                let ValueKind::Array(items) = &args[0].kind else {
                    return Ok(Value::nil(recv.pos));
                };
                let call_args: Vec<crate::call::Arg> = items
                    .borrow()
                    .iter()
                    .cloned()
                    .map(crate::call::Arg::positional)
                    .collect();
                vm.call_callable(recv, call_args)
            },
        ),
        _ => None,
    }
}
