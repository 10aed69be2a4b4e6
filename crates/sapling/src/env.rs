//! The environment: an insertion-ordered mapping from identifier to value.
//!
//! Assignments create `Var` cells carrying the constant flag; builtins are
//! installed as plain bindings. Reads unwrap cells transparently. Function
//! calls snapshot the whole map — the callee starts from the caller's
//! bindings and its writes stay local.

use indexmap::IndexMap;

use crate::value::Value;

/// One environment entry. `constant` is only ever true for `Var` cells
/// created by `const` assignments.
#[derive(Clone, Debug)]
pub struct Slot {
    pub value: Value,
    pub constant: bool,
}

#[derive(Clone, Default)]
pub struct Env {
    slots: IndexMap<String, Slot>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a binding without unwrapping.
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    /// Install a plain (non-constant) binding. Used for builtins, parameter
    /// binding, and module attribute copies.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(
            name.into(),
            Slot {
                value,
                constant: false,
            },
        );
    }

    /// Install a `Var` cell from an assignment.
    pub fn insert_var(&mut self, name: impl Into<String>, value: Value, constant: bool) {
        self.slots.insert(name.into(), Slot { value, constant });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Iterate bindings in insertion order, cells unwrapped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().map(|(k, slot)| (k.as_str(), &slot.value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    #[test]
    fn insertion_order_is_preserved() {
        let mut env = Env::new();
        env.insert("b", Value::int(1, Pos::default()));
        env.insert("a", Value::int(2, Pos::default()));
        env.insert_var("c", Value::int(3, Pos::default()), true);
        let names: Vec<&str> = env.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn constant_flag_round_trips() {
        let mut env = Env::new();
        env.insert_var("x", Value::int(1, Pos::default()), true);
        assert!(env.get("x").unwrap().constant);
        env.insert("y", Value::int(2, Pos::default()));
        assert!(!env.get("y").unwrap().constant);
    }

    #[test]
    fn snapshots_are_independent() {
        let mut parent = Env::new();
        parent.insert("x", Value::int(1, Pos::default()));
        let mut child = parent.clone();
        child.insert("x", Value::int(2, Pos::default()));
        child.insert("y", Value::int(3, Pos::default()));
        assert_eq!(parent.get("x").unwrap().value, Value::int(1, Pos::default()));
        assert!(!parent.contains("y"));
    }
}
