//! Shared harness: run Lox source through a [`Session`] and capture what it
//! prints alongside every diagnostic it reports.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::error::LoxError;
use rox::session::{RunStatus, Session};

/// `Write` sink whose buffer stays readable after the session takes it.
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session plus handles on its output and diagnostics.
pub struct Harness {
    pub session: Session,
    pub output: SharedOutput,
    pub errors: Vec<LoxError>,
}

impl Harness {
    pub fn new() -> Self {
        let output = SharedOutput::default();

        Self {
            session: Session::with_output(Box::new(output.clone())),
            output,
            errors: Vec::new(),
        }
    }

    pub fn run(&mut self, source: &str) -> RunStatus {
        self.session.run(source, &mut self.errors)
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .filter_map(|e| e.message().map(str::to_owned))
            .collect()
    }
}

/// Run `source` in a fresh session, returning the printed lines.
pub fn run(source: &str) -> (RunStatus, Vec<String>, Vec<LoxError>) {
    let mut harness = Harness::new();
    let status = harness.run(source);

    (status, harness.output.lines(), harness.errors)
}

/// Run a program expected to complete, returning its printed lines.
pub fn output_of(source: &str) -> Vec<String> {
    let (status, lines, errors) = run(source);

    assert!(
        errors.is_empty(),
        "unexpected diagnostics: {:?}",
        errors.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
    assert_eq!(status, RunStatus::Completed);

    lines
}
