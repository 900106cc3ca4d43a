use crate::interpreter::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A name-to-value scope with an optional parent. Closures keep the chain
/// alive through `Rc`, so scopes form a DAG rooted at the globals.
#[derive(Default)]
pub struct Environment {
    enclosing: Option<Rc<Environment>>,
    values: RefCell<HashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<Environment>) -> Self {
        Self {
            enclosing: Some(enclosing),
            values: RefCell::new(HashMap::new()),
        }
    }

    /// Bind in this scope, shadowing any enclosing binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        self.enclosing.as_ref().and_then(|env| env.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        if self.values.borrow().contains_key(name) {
            return true;
        }
        self.enclosing
            .as_ref()
            .is_some_and(|env| env.contains(name))
    }

    /// Mutate the nearest binding of `name`. Returns false when no scope in
    /// the chain has it; the caller decides where the new binding goes.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.enclosing {
            Some(env) => env.assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_get() {
        let env = Environment::new();
        env.define("x", Value::Num(1.0));
        assert_eq!(env.get("x"), Some(Value::Num(1.0)));
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn get_walks_the_parent_chain() {
        let parent = Rc::new(Environment::new());
        parent.define("x", Value::Num(1.0));
        let child = Environment::with_enclosing(Rc::clone(&parent));
        assert_eq!(child.get("x"), Some(Value::Num(1.0)));
    }

    #[test]
    fn define_shadows_the_parent() {
        let parent = Rc::new(Environment::new());
        parent.define("x", Value::Num(1.0));
        let child = Environment::with_enclosing(Rc::clone(&parent));
        child.define("x", Value::Num(2.0));
        assert_eq!(child.get("x"), Some(Value::Num(2.0)));
        assert_eq!(parent.get("x"), Some(Value::Num(1.0)));
    }

    #[test]
    fn assign_mutates_the_nearest_binding() {
        let parent = Rc::new(Environment::new());
        parent.define("x", Value::Num(1.0));
        let child = Environment::with_enclosing(Rc::clone(&parent));
        assert!(child.assign("x", Value::Num(5.0)));
        assert_eq!(parent.get("x"), Some(Value::Num(5.0)));
    }

    #[test]
    fn assign_reports_missing_names() {
        let env = Environment::new();
        assert!(!env.assign("ghost", Value::Nil));
    }

    #[test]
    fn shared_scope_is_visible_through_both_children() {
        let shared = Rc::new(Environment::new());
        shared.define("n", Value::Num(0.0));
        let a = Environment::with_enclosing(Rc::clone(&shared));
        let b = Environment::with_enclosing(Rc::clone(&shared));
        assert!(a.assign("n", Value::Num(7.0)));
        assert_eq!(b.get("n"), Some(Value::Num(7.0)));
    }
}
