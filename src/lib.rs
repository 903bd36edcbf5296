pub mod console;
pub mod host;
pub mod language;
pub mod runtime;
pub mod tools;

pub use runtime::environment::OutputSink;
pub use runtime::{RunStatus, Session, SessionError};
