//! Command results: `Outcome` for success paths, `CommandError` for failures.

use thiserror::Error;

use crate::bus::{InvalidPath, RemoteError};

/// What a successful handler asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Finished; nothing extra to print.
    Done,
    /// The handler reports its own result (possibly later, asynchronously).
    InProgress,
    /// Terminate the interpreter.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Argument list too long")]
    ArgumentListTooLong,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Cannot build call: {0}")]
    CallSetup(#[from] InvalidPath),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("{0}")]
    Remote(#[from] RemoteError),
}

pub type CommandResult = Result<Outcome, CommandError>;
