//! The call protocol: parameter schemas and argument verification.
//!
//! Every callable — user-defined functions, methods, scalar-type methods,
//! and bridge-exposed host functions — declares its parameters as a list of
//! [`Param`]s, and the single [`verify`] pass binds call-site arguments
//! against them: named arguments first, positional arguments into the
//! remaining slots in order, defaults for whatever stays unbound, a type
//! check on every binding, and an arity check at the end.

use crate::error::{Error, Result};
use crate::token::Pos;
use crate::value::Value;

/// A parameter's declared type: unchecked, one tag, or a set of tags.
#[derive(Clone, Debug)]
pub enum TypeSpec {
    Any,
    One(String),
    AnyOf(Vec<String>),
}

impl TypeSpec {
    fn accepts(&self, tag: &str) -> bool {
        match self {
            TypeSpec::Any => true,
            TypeSpec::One(t) => t == tag,
            TypeSpec::AnyOf(ts) => ts.iter().any(|t| t == tag || t == "any"),
        }
    }

    fn describe(&self) -> String {
        match self {
            TypeSpec::Any => "'any'".to_string(),
            TypeSpec::One(t) => format!("'{t}'"),
            TypeSpec::AnyOf(ts) => {
                let quoted: Vec<String> = ts.iter().map(|t| format!("'{t}'")).collect();
                format!("one of {}", quoted.join(", "))
            }
        }
    }
}

/// A parameter default: absent, a literal value re-positioned at the current
/// loose position, or a thunk synthesising a value at that position.
#[derive(Clone)]
pub enum ParamDefault {
    None,
    Value(Value),
    Synth(fn(Pos) -> Value),
}

/// A declared parameter of a callable.
#[derive(Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeSpec,
    pub default: ParamDefault,
}

impl Param {
    /// An unannotated required parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: TypeSpec::Any,
            default: ParamDefault::None,
        }
    }

    /// A parameter checked against one type tag (`any` means unchecked).
    pub fn typed(name: impl Into<String>, ty: impl Into<String>) -> Self {
        let ty = ty.into();
        Self {
            name: name.into(),
            ty: if ty == "any" {
                TypeSpec::Any
            } else {
                TypeSpec::One(ty)
            },
            default: ParamDefault::None,
        }
    }

    /// A parameter accepting any of the given type tags.
    pub fn any_of(name: impl Into<String>, tys: &[&str]) -> Self {
        Self {
            name: name.into(),
            ty: TypeSpec::AnyOf(tys.iter().map(|t| t.to_string()).collect()),
            default: ParamDefault::None,
        }
    }

    /// Attach a literal default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = ParamDefault::Value(value);
        self
    }

    /// Attach a position thunk default.
    pub fn with_synth_default(mut self, f: fn(Pos) -> Value) -> Self {
        self.default = ParamDefault::Synth(f);
        self
    }
}

/// An evaluated call-site argument.
#[derive(Clone, Debug)]
pub struct Arg {
    pub value: Value,
    pub name: Option<String>,
}

impl Arg {
    pub fn positional(value: Value) -> Self {
        Self { value, name: None }
    }

    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Self {
            value,
            name: Some(name.into()),
        }
    }
}

/// Verify arguments against a parameter list, producing one value per
/// parameter in declaration order.
///
/// `loose_pos` is the evaluator's loose position, used to position
/// synthesised defaults and arity errors with no argument to blame.
pub fn verify(args: &[Arg], params: &[Param], loose_pos: Pos) -> Result<Vec<Value>> {
    let mut bound: Vec<Option<Value>> = vec![None; params.len()];

    // Named arguments bind their slots first.
    for arg in args.iter().filter(|a| a.name.is_some()) {
        let name = arg.name.as_deref().unwrap();
        let Some(idx) = params.iter().position(|p| p.name == name) else {
            return Err(Error::type_error(
                format!("Unexpected named argument '{name}'"),
                arg.value.pos,
            ));
        };
        if bound[idx].is_some() {
            return Err(Error::type_error(
                format!("Duplicate argument '{name}'"),
                arg.value.pos,
            ));
        }
        check_type(&params[idx], &arg.value)?;
        bound[idx] = Some(arg.value.clone());
    }

    // Positional arguments fill the remaining slots in order.
    let mut slot = 0;
    for arg in args.iter().filter(|a| a.name.is_none()) {
        while slot < bound.len() && bound[slot].is_some() {
            slot += 1;
        }
        if slot >= bound.len() {
            return Err(arity_error(args, params, loose_pos));
        }
        check_type(&params[slot], &arg.value)?;
        bound[slot] = Some(arg.value.clone());
        slot += 1;
    }

    // Defaults for whatever stays unbound.
    for (i, param) in params.iter().enumerate() {
        if bound[i].is_none() {
            match &param.default {
                ParamDefault::Value(v) => bound[i] = Some(v.clone().at(loose_pos)),
                ParamDefault::Synth(f) => bound[i] = Some(f(loose_pos)),
                ParamDefault::None => {}
            }
        }
    }

    if bound.iter().any(Option::is_none) {
        return Err(arity_error(args, params, loose_pos));
    }

    Ok(bound.into_iter().map(Option::unwrap).collect())
}

fn check_type(param: &Param, value: &Value) -> Result<()> {
    let tag = value.type_name();
    if param.ty.accepts(&tag) {
        Ok(())
    } else {
        Err(Error::type_error(
            format!("Expected {} but got '{tag}'", param.ty.describe()),
            value.pos,
        ))
    }
}

fn arity_error(args: &[Arg], params: &[Param], loose_pos: Pos) -> Error {
    let pos = args.first().map(|a| a.value.pos).unwrap_or(loose_pos);
    Error::type_error(
        format!("Expected {} arguments, got {}", params.len(), args.len()),
        pos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    fn p() -> Pos {
        Pos::default()
    }

    #[test]
    fn positional_binding_in_order() {
        let params = vec![Param::new("a"), Param::new("b")];
        let args = vec![
            Arg::positional(Value::int(1, p())),
            Arg::positional(Value::int(2, p())),
        ];
        let out = verify(&args, &params, p()).unwrap();
        assert_eq!(out[0], Value::int(1, p()));
        assert_eq!(out[1], Value::int(2, p()));
    }

    #[test]
    fn named_arguments_bind_by_name() {
        let params = vec![Param::new("a"), Param::new("b")];
        let args = vec![
            Arg::named("b", Value::int(2, p())),
            Arg::named("a", Value::int(1, p())),
        ];
        let out = verify(&args, &params, p()).unwrap();
        assert_eq!(out[0], Value::int(1, p()));
        assert_eq!(out[1], Value::int(2, p()));
    }

    #[test]
    fn positional_skips_slots_bound_by_name() {
        let params = vec![Param::new("a"), Param::new("b")];
        let args = vec![
            Arg::named("a", Value::int(1, p())),
            Arg::positional(Value::int(2, p())),
        ];
        let out = verify(&args, &params, p()).unwrap();
        assert_eq!(out[0], Value::int(1, p()));
        assert_eq!(out[1], Value::int(2, p()));
    }

    #[test]
    fn defaults_fill_unbound_parameters() {
        let params = vec![
            Param::typed("start", "int"),
            Param::typed("increment", "int").with_synth_default(|pos| Value::int(1, pos)),
        ];
        let args = vec![Arg::positional(Value::int(5, p()))];
        let out = verify(&args, &params, p()).unwrap();
        assert_eq!(out[1], Value::int(1, p()));
    }

    #[test]
    fn type_mismatch() {
        let params = vec![Param::typed("x", "int")];
        let args = vec![Arg::positional(Value::string("s", p()))];
        let err = verify(&args, &params, p()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Expected 'int' but got 'string'"
        );
    }

    #[test]
    fn type_sets() {
        let params = vec![Param::any_of("x", &["int", "float"])];
        assert!(verify(
            &[Arg::positional(Value::float(1.5, p()))],
            &params,
            p()
        )
        .is_ok());
        let err = verify(&[Arg::positional(Value::nil(p()))], &params, p()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Expected one of 'int', 'float' but got 'nil'"
        );
    }

    #[test]
    fn arity_errors() {
        let params = vec![Param::new("a"), Param::new("b")];
        let err = verify(&[Arg::positional(Value::int(1, p()))], &params, p()).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Expected 2 arguments, got 1");

        let args = vec![
            Arg::positional(Value::int(1, p())),
            Arg::positional(Value::int(2, p())),
            Arg::positional(Value::int(3, p())),
        ];
        let err = verify(&args, &params, p()).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Expected 2 arguments, got 3");
    }

    #[test]
    fn unknown_named_argument() {
        let params = vec![Param::new("a")];
        let err = verify(&[Arg::named("z", Value::int(1, p()))], &params, p()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Unexpected named argument 'z'"
        );
    }
}
