//! Pipeline entry point: scan → parse → resolve → interpret.
//!
//! A [`Session`] owns one interpreter, so globals defined by one call to
//! [`Session::run`] are visible to the next (the REPL relies on this).
//! Diagnostics go to a caller‑supplied [`Reporter`]; the session only needs
//! to know whether any were produced.

use std::io::Write;

use log::{debug, info};

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;

/// Receives every diagnostic the pipeline produces.
pub trait Reporter {
    fn report(&mut self, error: &LoxError);
}

/// Prints diagnostics to standard error.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&mut self, error: &LoxError) {
        eprintln!("{}", error);
    }
}

impl Reporter for Vec<LoxError> {
    fn report(&mut self, error: &LoxError) {
        // LoxError wraps io::Error and so is not Clone; keep the text.
        let copy: LoxError = match error {
            LoxError::Lex { message, line } => LoxError::Lex {
                message: message.clone(),
                line: *line,
            },
            LoxError::Parse { message, line } => LoxError::Parse {
                message: message.clone(),
                line: *line,
            },
            LoxError::Resolve { message, line } => LoxError::Resolve {
                message: message.clone(),
                line: *line,
            },
            other => LoxError::Runtime {
                message: other.message().map_or_else(|| other.to_string(), str::to_owned),
                line: other.line().unwrap_or(0),
            },
        };

        self.push(copy);
    }
}

/// How far a run got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Lexical, parse or resolution errors; nothing was executed.
    StaticError,
    /// Execution started and was aborted by a runtime error.
    RuntimeError,
}

pub struct Session {
    interpreter: Interpreter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session printing to standard output.
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    /// Session printing to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_output(out),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Run `source` as a program.  Static errors from every stage that ran
    /// are reported and block execution; a runtime error is reported once
    /// and ends the run.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> RunStatus {
        info!("Running {} byte(s) of source", source.len());

        let (tokens, lex_errors) = scanner::scan_all(source);
        for error in &lex_errors {
            reporter.report(error);
        }

        let statements = match Parser::new(&tokens).parse() {
            Ok(statements) if lex_errors.is_empty() => statements,

            Ok(_) => return RunStatus::StaticError,

            Err(errors) => {
                for error in &errors {
                    reporter.report(error);
                }

                return RunStatus::StaticError;
            }
        };

        debug!("Parsed {} statements", statements.len());

        if let Err(errors) = Resolver::new(&mut self.interpreter).resolve(&statements) {
            for error in &errors {
                reporter.report(error);
            }

            return RunStatus::StaticError;
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => RunStatus::Completed,

            Err(error) => {
                debug!("Runtime debug: {}", error);
                reporter.report(&error);

                RunStatus::RuntimeError
            }
        }
    }
}
