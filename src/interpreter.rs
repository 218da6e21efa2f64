//! Tree‑walking evaluator.
//!
//! The active scope is an explicit `&Env` argument on every `execute` /
//! `evaluate` call rather than a field swapped in and out, so leaving a block
//! or call (normally or through `?`) can never leave the wrong scope active.
//!
//! `return` travels as [`Flow::Return`] through statement results until the
//! call site consumes it; the error channel carries only real errors.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::callable::{self, Callable, LoxClass, LoxFunction, INITIALIZER};
use crate::environment::{Env, Environment};
use crate::error::{LoxError, Result};
use crate::instance::LoxInstance;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Env,
    /// Resolver output: scope distance per variable‑like expression.
    /// Absent ids are globals.
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter printing to `out`; native functions such as `clock`
    /// are predefined in the global scope.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: Env = Environment::global();
        let clock = callable::clock();

        debug!("Defining native function '{}'", clock.name);

        globals
            .borrow_mut()
            .define(clock.name, Value::Callable(Callable::Native(Rc::new(clock))));

        Self {
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Record that the expression `id` binds `depth` scopes out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Drop recorded distances, e.g. from a resolve pass that failed.
    pub fn forget_locals(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.locals.remove(id);
        }
    }

    pub fn local_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Run a resolved program in the global scope.  The first runtime error
    /// aborts the rest of the program.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let globals: Env = Rc::clone(&self.globals);
        let outcome: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt, &globals).map(|_| ()));

        // A runtime error outranks a failed flush.
        let flushed: io::Result<()> = self.out.flush();
        outcome?;
        flushed?;

        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Evaluate one stand‑alone expression in the global scope.
    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value> {
        let globals: Env = Rc::clone(&self.globals);

        self.evaluate(expr, &globals)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    /// Run `statements` in `env`, stopping early on `return`.
    pub fn execute_block(&mut self, statements: &[Stmt], env: &Env) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr, env)?;

                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };

                env.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope: Env = Environment::nested(env);

                return self.execute_block(statements, &scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    return self.execute(then_branch, env);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch, env);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body, env)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(Rc::clone(declaration), Rc::clone(env), false);

                env.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);

                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.declare_class(name, superclass.as_ref(), methods, env)?,
        }

        Ok(Flow::Normal)
    }

    fn declare_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        env: &Env,
    ) -> Result<()> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr, env)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    let line: usize = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class."));
                }
            },
            None => None,
        };

        env.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra scope holding `super`.
        let method_env: Env = match &superclass {
            Some(superclass) => {
                let scope: Env = Environment::nested(env);
                scope.borrow_mut().define(
                    "super",
                    Value::Callable(Callable::Class(Rc::clone(superclass))),
                );
                scope
            }
            None => Rc::clone(env),
        };

        let methods: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let is_initializer: bool = method.name.lexeme == INITIALIZER;
                let function =
                    LoxFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);

                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(&name.lexeme, superclass, methods);

        env.borrow_mut().assign(
            &name.lexeme,
            Value::Callable(Callable::Class(Rc::new(class))),
            name.line,
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr, env: &Env) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Grouping(inner) => self.evaluate(inner, env),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right, env)?;

                match operator.token_type {
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator.line, "Operand must be a number.")),
                    },
                    _ => Err(invalid_operator(operator)),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left, env)?;
                let right: Value = self.evaluate(right, env)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left, env)?;

                // The deciding operand itself is the result.
                let decided: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right, env)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name, env),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value, env)?;

                match self.local_depth(*id) {
                    Some(distance) => Environment::assign_at(
                        env,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee, env)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument, env)?);
                }

                match callee {
                    Value::Callable(callable) => callable.call(self, values, paren),
                    _ => Err(LoxError::runtime(
                        paren.line,
                        "Can only call functions and classes.",
                    )),
                }
            }

            Expr::Get { object, name } => match self.evaluate(object, env)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object, env)? else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value, env)?;
                instance.borrow_mut().set(&name.lexeme, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword, env),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.super_method(*id, keyword, method, env),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token, env: &Env) -> Result<Value> {
        match self.local_depth(id) {
            Some(distance) => Environment::get_at(env, distance, &name.lexeme, name.line),
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    /// `super.method`: find `method` from the superclass bound one scope
    /// outside `this`, then bind it to the current receiver.
    fn super_method(&self, id: ExprId, keyword: &Token, method: &Token, env: &Env) -> Result<Value> {
        let distance: usize = self.local_depth(id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a class.")
        })?;

        let superclass: Value = Environment::get_at(env, distance, "super", keyword.line)?;
        let receiver: Value =
            Environment::get_at(env, distance.saturating_sub(1), "this", keyword.line)?;

        let (Value::Callable(Callable::Class(superclass)), Value::Instance(receiver)) =
            (superclass, receiver)
        else {
            return Err(LoxError::runtime(
                keyword.line,
                "Superclass must be a class.",
            ));
        };

        let found = superclass.find_method(&method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
        })?;

        Ok(Value::Callable(Callable::Function(found.bind(receiver))))
    }
}

fn invalid_operator(operator: &Token) -> LoxError {
    LoxError::runtime(
        operator.line,
        format!("Invalid operator '{}'.", operator.lexeme),
    )
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
    }
}

/// Arithmetic, comparison and equality.  Plain IEEE semantics: dividing by
/// zero yields an infinity or NaN rather than an error.
fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    debug!(
        "Evaluating binary '{}' on {} and {}",
        operator.lexeme, left, right
    );

    let value: Value = match operator.token_type {
        TokenType::EQUAL_EQUAL => Value::Bool(left == right),
        TokenType::BANG_EQUAL => Value::Bool(left != right),

        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(a), Value::String(b)) => {
                let mut joined: String = String::with_capacity(a.len() + b.len());
                joined.push_str(&a);
                joined.push_str(&b);
                Value::String(Rc::from(joined))
            }
            _ => {
                return Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                ))
            }
        },

        TokenType::MINUS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a - b)
        }
        TokenType::STAR => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a * b)
        }
        TokenType::SLASH => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Number(a / b)
        }
        TokenType::GREATER => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a > b)
        }
        TokenType::GREATER_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a >= b)
        }
        TokenType::LESS => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a < b)
        }
        TokenType::LESS_EQUAL => {
            let (a, b) = number_operands(operator, &left, &right)?;
            Value::Bool(a <= b)
        }

        _ => return Err(invalid_operator(operator)),
    };

    Ok(value)
}
