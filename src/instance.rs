use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::callable::{Callable, LoxClass};
use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Instances are shared and mutated through every reference to them.
pub type InstanceRef = Rc<RefCell<LoxInstance>>;

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> InstanceRef {
        Rc::new(RefCell::new(LoxInstance {
            class,
            fields: HashMap::new(),
        }))
    }

    /// Fields shadow methods; a method comes back bound to `instance`.
    pub fn get(instance: &InstanceRef, name: &Token) -> Result<Value> {
        let method = {
            let this = instance.borrow();

            if let Some(value) = this.fields.get(&name.lexeme) {
                return Ok(value.clone());
            }

            this.class.find_method(&name.lexeme)
        };

        match method {
            Some(method) => {
                debug!("Binding method '{}' to instance", name.lexeme);

                Ok(Value::Callable(Callable::Function(
                    method.bind(Rc::clone(instance)),
                )))
            }

            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Always writes an own field, even if a method has the same name.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_owned(), value);
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();

        f.debug_struct("LoxInstance")
            .field("class", &self.class.name)
            .field("fields", &names)
            .finish()
    }
}
