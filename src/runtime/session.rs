//! The incremental session: each turn splices the accumulated declaration
//! dump and the new fragment into a synthetic source unit, re-checks it,
//! and executes the new statements at top level in the persistent root
//! frame.

use crate::host;
use crate::language::errors::SyntaxError;
use crate::language::parser::parse_file;
use crate::language::typecheck::{check_file, PackageInfo, TypeError, TypeInfo};
use crate::language::ast::{File, Stmt};
use crate::runtime::environment::{Frame, InterpShared, OutputSink};
use crate::runtime::error::RuntimeError;
use crate::runtime::stmt::{run_stmt, Flow};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The fragment ran (or was empty).
    Complete,
    /// The fragment is a proper prefix; the driver should request another
    /// line and re-run with the concatenation.
    NeedMore,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{}", .error.message)]
    Syntax { error: SyntaxError, input: String },
    #[error("{}", .error.message)]
    Type { error: TypeError, input: String },
    #[error("not implemented: {0}")]
    Unimplemented(String),
    #[error("runtime error: {0}")]
    Runtime(RuntimeError),
}

pub struct Session {
    root: Arc<Frame>,
    packages: HashMap<String, PackageInfo>,
    import_clause: String,
    pending: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_output(OutputSink::stdout())
    }

    pub fn with_output(out: OutputSink) -> Self {
        let registry = crate::runtime::registry::Registry::new();
        let bridged = host::install(&registry, &out);
        let mut names: Vec<&String> = bridged.checker.keys().collect();
        names.sort();
        let import_clause = names
            .iter()
            .map(|name| format!("{:?};", name))
            .collect::<String>();
        let interp = Arc::new(InterpShared {
            registry,
            pkgs: bridged.runtime,
            out,
        });
        let root = Frame::root(interp, Arc::new(TypeInfo::default()));
        Self {
            root,
            packages: bridged.checker,
            import_clause,
            pending: String::new(),
        }
    }

    /// Discards any buffered continuation input. Declared state is kept.
    pub fn reset_pending(&mut self) {
        self.pending.clear();
    }

    /// Runs one line of input. `NeedMore` means the accumulated fragment is
    /// incomplete and the driver should supply another line.
    pub fn run(&mut self, line: &str) -> Result<RunStatus, SessionError> {
        let src = if self.pending.is_empty() {
            line.trim().to_string()
        } else {
            let combined = format!("{}\n{}", self.pending, line);
            self.pending.clear();
            combined.trim().to_string()
        };
        if src.is_empty() {
            return Ok(RunStatus::Complete);
        }

        let (decl_dump, decl_count) = self.root.dump_decls();
        let prefix = format!(
            "package ebb;import({});func _(){{{}{{\n",
            self.import_clause, decl_dump
        );
        let tail_start = prefix.len() + src.len();
        let input = format!("{}{}\n}}}}", prefix, src);

        let file = match parse_file(&input) {
            Ok(file) => file,
            Err(errors) => {
                let first = errors.first().clone();
                let at_tail = first.span.start >= tail_start;
                let stray_close = first.message.starts_with("Expected declaration");
                if at_tail && !stray_close {
                    self.pending = src;
                    return Ok(RunStatus::NeedMore);
                }
                let error = if stray_close && at_tail {
                    SyntaxError::new("Unexpected '}'", first.span)
                } else {
                    first
                };
                return Err(SessionError::Syntax { error, input });
            }
        };

        let stmts = match user_statements(&file, decl_count) {
            Ok(stmts) => stmts,
            Err(error) => return Err(SessionError::Syntax { error, input }),
        };
        if stmts.is_empty() {
            return Ok(RunStatus::Complete);
        }

        let info = match check_file(&file, &self.packages) {
            Ok(info) => info,
            Err(error) => return Err(SessionError::Type { error, input }),
        };
        self.root.set_info(Arc::new(info));

        for stmt in stmts {
            match run_stmt(&self.root, stmt, "", true) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(_)) => {
                    return Err(SessionError::Runtime(RuntimeError::StrayFlow {
                        kind: "return",
                    }));
                }
                Ok(Flow::Break(_)) => {
                    return Err(SessionError::Runtime(RuntimeError::StrayFlow {
                        kind: "break",
                    }));
                }
                Ok(Flow::Continue(_)) => {
                    return Err(SessionError::Runtime(RuntimeError::StrayFlow {
                        kind: "continue",
                    }));
                }
                Err(RuntimeError::Unimplemented { feature }) => {
                    return Err(SessionError::Unimplemented(feature));
                }
                Err(err) => return Err(SessionError::Runtime(err)),
            }
        }
        Ok(RunStatus::Complete)
    }
}

/// Descends the synthetic unit to the block holding the user's new
/// statements, verifying the structure survived any braces in the input.
fn user_statements(file: &File, decl_count: usize) -> Result<&[Stmt], SyntaxError> {
    let stray = || SyntaxError::new("Unexpected '}'", crate::language::span::Span::default());
    if file.decls.len() != 1 {
        return Err(stray());
    }
    let body = &file.decls[0].body;
    if body.stmts.len() != decl_count + 1 {
        return Err(stray());
    }
    match body.stmts.last() {
        Some(Stmt::Block(block)) => Ok(&block.stmts),
        _ => Err(stray()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn session_with_buffer() -> (Session, Arc<Mutex<Vec<u8>>>) {
        let (sink, buf) = OutputSink::buffer();
        (Session::with_output(sink), buf)
    }

    fn output(buf: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buf.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn evaluates_and_echoes_expressions() {
        let (mut session, buf) = session_with_buffer();
        assert_eq!(session.run("x := 2 + 3 * 4").unwrap(), RunStatus::Complete);
        assert_eq!(session.run("x").unwrap(), RunStatus::Complete);
        assert_eq!(output(&buf), "=> int: 14\n");
    }

    #[test]
    fn detects_incomplete_input_and_resumes() {
        let (mut session, buf) = session_with_buffer();
        assert_eq!(
            session.run("f := func(n int) int {").unwrap(),
            RunStatus::NeedMore
        );
        assert_eq!(session.run("return n - 1").unwrap(), RunStatus::NeedMore);
        assert_eq!(session.run("}").unwrap(), RunStatus::Complete);
        assert_eq!(session.run("f(10)").unwrap(), RunStatus::Complete);
        assert_eq!(output(&buf), "=> int: 9\n");
    }

    #[test]
    fn stray_close_brace_is_an_error_not_a_continuation() {
        let (mut session, _) = session_with_buffer();
        match session.run("}") {
            Err(SessionError::Syntax { error, .. }) => {
                assert!(error.message.contains("Unexpected"), "{}", error.message);
            }
            other => panic!("expected syntax error, got {:?}", other.map(|_| ())),
        }
        // The session is still usable afterwards.
        assert_eq!(session.run("y := 1").unwrap(), RunStatus::Complete);
    }

    #[test]
    fn declarations_persist_across_turns() {
        let (mut session, buf) = session_with_buffer();
        session.run("x := 41").unwrap();
        session.run("x = x + 1").unwrap();
        session.run("x").unwrap();
        assert_eq!(output(&buf), "=> int: 42\n");
    }

    #[test]
    fn runtime_errors_keep_the_session_alive() {
        let (mut session, buf) = session_with_buffer();
        session.run("var p *int").unwrap();
        match session.run("*p") {
            Err(SessionError::Runtime(RuntimeError::NilDereference)) => {}
            other => panic!("expected nil dereference, got {:?}", other.map(|_| ())),
        }
        session.run("q := 7").unwrap();
        session.run("q").unwrap();
        assert_eq!(output(&buf), "=> int: 7\n");
    }

    #[test]
    fn stray_return_is_a_runtime_error() {
        let (mut session, _) = session_with_buffer();
        match session.run("return") {
            Err(SessionError::Runtime(RuntimeError::StrayFlow { kind: "return" })) => {}
            other => panic!("expected stray return, got {:?}", other.map(|_| ())),
        }
    }
}
