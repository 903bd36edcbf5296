//! The interactive console: a rustyline loop around the incremental
//! session, switching between the primary and continuation prompts.

use crate::runtime::{RunStatus, Session};
use crate::tools::diagnostics::report_session_error;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::Path;

const PRIMARY_PROMPT: &str = ">>> ";
const CONTINUATION_PROMPT: &str = "... ";

pub fn run_repl() -> i32 {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("failed to start line editor: {}", err);
            return 1;
        }
    };
    let mut session = Session::new();
    let mut prompt = PRIMARY_PROMPT;

    loop {
        match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match session.run(&line) {
                    Ok(RunStatus::NeedMore) => prompt = CONTINUATION_PROMPT,
                    Ok(RunStatus::Complete) => prompt = PRIMARY_PROMPT,
                    Err(err) => {
                        report_session_error(&err);
                        prompt = PRIMARY_PROMPT;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Drop any pending continuation and start over.
                session.reset_pending();
                prompt = PRIMARY_PROMPT;
            }
            Err(ReadlineError::Eof) => {
                println!();
                return 0;
            }
            Err(err) => {
                eprintln!("read error: {}", err);
                return 1;
            }
        }
    }
}

/// Feeds a script through the same incremental session, line by line.
pub fn run_script(path: &Path) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read {}: {}", path.display(), err);
            return 1;
        }
    };
    let mut session = Session::new();
    let mut status = RunStatus::Complete;
    let mut failed = false;
    for line in source.lines() {
        match session.run(line) {
            Ok(s) => status = s,
            Err(err) => {
                report_session_error(&err);
                status = RunStatus::Complete;
                failed = true;
            }
        }
    }
    if status == RunStatus::NeedMore {
        eprintln!("script ended mid-statement");
        return 1;
    }
    if failed { 1 } else { 0 }
}
