use crate::error::{LoxError, Result};
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to one scope.  Blocks, calls and closures all hold these;
/// a scope lives as long as the last handle to it.
pub type Env = Rc<RefCell<Environment>>;

/// One lexical scope: its own bindings plus a link to the enclosing scope.
/// The global scope is the only one without an enclosing link.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Env>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Env) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Fresh global scope wrapped in a handle.
    pub fn global() -> Env {
        Rc::new(RefCell::new(Environment::new()))
    }

    /// Fresh scope nested in `enclosing`, wrapped in a handle.
    pub fn nested(enclosing: &Env) -> Env {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Bind `name` in this scope.  Redefinition silently replaces.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}' = {}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Walk outward until `name` is found.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// The scope exactly `distance` links up from `env` (0 = `env` itself).
    pub fn ancestor(env: &Env, distance: usize) -> Option<Env> {
        let mut current: Env = Rc::clone(env);

        for _ in 0..distance {
            let next: Env = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Read `name` from the scope `distance` links up, without walking further.
    pub fn get_at(env: &Env, distance: usize, name: &str, line: usize) -> Result<Value> {
        Self::ancestor(env, distance)
            .and_then(|scope| scope.borrow().values.get(name).cloned())
            .ok_or_else(|| undefined_variable(name, line))
    }

    /// Write `name` in the scope `distance` links up.
    pub fn assign_at(
        env: &Env,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let scope: Env =
            Self::ancestor(env, distance).ok_or_else(|| undefined_variable(name, line))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined_variable(name, line)),
        }
    }
}

fn undefined_variable(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    #[test]
    fn test_define_and_get() {
        let mut env = Environment::new();
        env.define("foo", string("bar"));
        env.define("baz", Value::Bool(false));

        assert_eq!(env.get("foo", 1).unwrap(), string("bar"));
        assert_eq!(env.get("baz", 1).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_redefinition_replaces() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::Number(2.0));

        assert_eq!(env.get("a", 1).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_error_if_undefined() {
        let mut env = Environment::new();
        let err = env.assign("foo", string("bar"), 3).unwrap_err();

        assert_eq!(err.message(), Some("Undefined variable 'foo'."));
        assert_eq!(err.line(), Some(3));
        assert!(env.get("foo", 3).is_err());
    }

    #[test]
    fn test_assign_walks_outward() {
        let outer = Environment::global();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::nested(&outer);
        inner
            .borrow_mut()
            .assign("x", Value::Number(5.0), 1)
            .unwrap();

        assert_eq!(outer.borrow().get("x", 1).unwrap(), Value::Number(5.0));
        assert!(inner.borrow().values.is_empty());
    }

    #[test]
    fn test_multi_level() {
        let env1 = Environment::global();
        env1.borrow_mut().define("foo", string("bar"));

        let env2 = Environment::nested(&env1);
        env2.borrow_mut().define("foo", string("foofoo"));

        assert_eq!(Environment::get_at(&env2, 0, "foo", 1).unwrap(), string("foofoo"));
        assert_eq!(Environment::get_at(&env2, 1, "foo", 1).unwrap(), string("bar"));

        Environment::assign_at(&env2, 1, "foo", Value::Bool(false), 1).unwrap();

        assert_eq!(env1.borrow().get("foo", 1).unwrap(), Value::Bool(false));
        assert!(Environment::get_at(&env2, 2, "foo", 1).is_err());
    }
}
