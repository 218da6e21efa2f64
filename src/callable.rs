//! Everything a call expression can invoke: native functions, user functions
//! (including bound methods) and classes.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{Env, Environment};
use crate::error::{LoxError, Result};
use crate::instance::{InstanceRef, LoxInstance};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Name of the method run when a class is called.
pub const INITIALIZER: &str = "init";

/// Signature of a host function exposed to scripts.  A returned `Err` becomes
/// a runtime error at the call site.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

/// `clock()`: seconds since the Unix epoch as a number.
pub fn clock() -> NativeFunction {
    NativeFunction {
        name: "clock",
        arity: 0,
        func: |_args: &[Value]| {
            debug!("Calling native function 'clock'");

            let timestamp: f64 = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| format!("Clock error: {}", e))?
                .as_secs_f64();

            Ok(Value::Number(timestamp))
        },
    }
}

/// A user function or method together with the scope it closes over.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Env,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Env, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Method bound to `instance`: a copy whose closure gains a scope
    /// holding `this`.
    pub fn bind(&self, instance: InstanceRef) -> Rc<LoxFunction> {
        let env: Env = Environment::nested(&self.closure);
        env.borrow_mut().define("this", Value::Instance(instance));

        Rc::new(LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        })
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        let env: Env = Environment::nested(&self.closure);
        {
            let mut scope = env.borrow_mut();
            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                scope.define(&param.lexeme, argument);
            }
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, &env)?;

        // An initializer always hands back its receiver.
        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this", self.declaration.name.line);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: &str,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            superclass,
            methods,
        }
    }

    /// Own methods first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        match self.methods.get(name) {
            Some(method) => Some(Rc::clone(method)),
            None => self
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }

    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map_or(0, |initializer| initializer.arity())
    }

    /// Calling a class makes an instance and runs `init` on it, if any.
    pub fn instantiate(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        info!("Instantiating class '{}'", class.name);

        let instance: InstanceRef = LoxInstance::new(Rc::clone(class));

        if let Some(initializer) = class.find_method(INITIALIZER) {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// Cheap‑to‑clone handle to any invocable value.
#[derive(Clone)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
        }
    }

    /// Invoke with already‑evaluated arguments.  `paren` locates errors.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value> {
        if arguments.len() != self.arity() {
            return Err(LoxError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    self.arity(),
                    arguments.len()
                ),
            ));
        }

        match self {
            Callable::Native(native) => {
                let result: Value =
                    (native.func)(&arguments).map_err(|msg| LoxError::runtime(paren.line, msg))?;

                info!("Native function '{}' returned: {}", native.name, result);

                Ok(result)
            }

            Callable::Function(function) => function.call(interpreter, arguments),

            Callable::Class(class) => LoxClass::instantiate(class, interpreter, arguments),
        }
    }

    /// Identity comparison.
    pub fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::Function(function) => write!(f, "<fn {}>", function.name()),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

// Closures can reach back to the value being printed, so Debug stays shallow.
impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
