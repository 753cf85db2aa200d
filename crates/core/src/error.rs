// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Server busy: {0}")]
    Busy(String),

    #[error("Scratch error: {0}")]
    Scratch(#[from] crate::port::ScratchError),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Prediction tool exited with {}", describe_exit(.exit_code))]
    ToolFailed { exit_code: Option<i32> },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
