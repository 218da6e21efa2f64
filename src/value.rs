use std::fmt;
use std::rc::Rc;

use crate::ast::LiteralValue;
use crate::callable::Callable;
use crate::instance::InstanceRef;

/// Dynamic runtime value.
///
/// Strings are `Rc<str>` so copying a value between scopes never copies text.
/// Callables and instances compare by identity.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Callable(Callable),
    Instance(InstanceRef),
}

impl Value {
    /// `nil` and `false` are falsey; everything else (including `0` and `""`)
    /// is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value {
    /// Same kind and same content; never coerces across kinds.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&LiteralValue> for Value {
    fn from(literal: &LiteralValue) -> Self {
        match literal {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::Str(s) => Value::String(Rc::from(s.as_str())),
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Nil => Value::Nil,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // `{}` already prints 3.0 as "3" and 3.5 as "3.5".
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write_number(f, *n),

            Value::String(s) => write!(f, "{}", s),

            Value::Callable(c) => write!(f, "{}", c),

            Value::Instance(i) => write!(f, "{}", i.borrow()),
        }
    }
}

/// Plain decimal for `1e-3 <= |n| < 1e7` (and zero), otherwise scientific
/// notation with a mandatory fractional digit: `1.0E21`, `1.5E-7`.
fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    let magnitude: f64 = n.abs();

    if n == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return write!(f, "{}", n);
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1e21" or "1.5e-7".
    let scientific: String = format!("{:e}", n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));

    if mantissa.contains('.') {
        write!(f, "{}E{}", mantissa, exponent)
    } else {
        write!(f, "{}.0E{}", mantissa, exponent)
    }
}
