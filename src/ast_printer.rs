use crate::ast::{Expr, LiteralValue};

/// Renders an expression in fully parenthesised prefix form, e.g.
/// `(* (- 123.0) (group 45.67))`.  Backs the `parse` command.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::Bool(b) => b.to_string(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                // 3 → "3.0" so literals read as numbers, unlike `print`.
                LiteralValue::Number(n) if n.fract() == 0.0 => format!("{:.1}", n),
                LiteralValue::Number(n) => n.to_string(),
            },

            Expr::Grouping(inner) => Self::parenthesize("group", &[&**inner]),

            Expr::Unary { operator, right } => Self::parenthesize(&operator.lexeme, &[&**right]),

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => Self::parenthesize(&operator.lexeme, &[&**left, &**right]),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                Self::parenthesize(&format!("= {}", name.lexeme), &[&**value])
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts: Vec<&Expr> = vec![&**callee];
                parts.extend(arguments.iter());

                Self::parenthesize("call", &parts)
            }

            Expr::Get { object, name } => {
                format!("(. {} {})", Self::print(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
        let mut s: String = format!("({}", name);

        for expr in exprs {
            s.push(' ');
            s.push_str(&Self::print(expr));
        }

        s.push(')');
        s
    }
}
