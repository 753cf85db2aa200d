// Prediction Tool Port
// Abstraction over the external spectrum prediction executable

use crate::domain::Invocation;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Live output of a streaming run (stderr and stdout interleaved)
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Result of a completed (buffered) tool run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Prediction Tool trait
///
/// Implementations:
/// - CfmPredictTool: spawns the cfm-predict executable
/// - MockPredictionTool: canned behavior for tests
#[async_trait]
pub trait PredictionTool: Send + Sync {
    /// Run the tool to completion
    ///
    /// A non-zero exit is reported as `ExecutionStatus::Failed`, not as an error.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Timeout if the run exceeds `invocation.timeout`
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ExecutionError>;

    /// Start the tool and relay its stderr and stdout as they are produced
    ///
    /// The stderr copy is started first. A timeout or non-zero exit after the
    /// stream was handed out surfaces as a trailing `Err` item.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    async fn stream(&self, invocation: &Invocation) -> Result<ByteStream, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock tool behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0; streaming yields the given chunks
        Success(Vec<String>),
        /// Exit with the given code and stderr
        ExitCode(i32, String),
        /// Fail to launch
        SpawnFail(String),
        /// Time out after N ms
        Timeout(i64),
    }

    /// Mock Prediction Tool for testing
    pub struct MockPredictionTool {
        behavior: Arc<Mutex<MockBehavior>>,
        invocations: Arc<Mutex<Vec<Invocation>>>,
    }

    impl MockPredictionTool {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                invocations: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success(vec!["mock output".to_string()]))
        }

        pub fn new_exit_code(code: i32, stderr: impl Into<String>) -> Self {
            Self::new(MockBehavior::ExitCode(code, stderr.into()))
        }

        pub fn call_count(&self) -> usize {
            self.invocations.lock().unwrap().len()
        }

        pub fn last_invocation(&self) -> Option<Invocation> {
            self.invocations.lock().unwrap().last().cloned()
        }

        fn record(&self, invocation: &Invocation) -> MockBehavior {
            self.invocations.lock().unwrap().push(invocation.clone());
            self.behavior.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PredictionTool for MockPredictionTool {
        async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ExecutionError> {
            match self.record(invocation) {
                MockBehavior::Success(chunks) => Ok(ExecutionResult {
                    status: ExecutionStatus::Success,
                    duration_ms: 10,
                    exit_code: Some(0),
                    stdout: Some(chunks.concat()),
                    stderr: None,
                }),
                MockBehavior::ExitCode(code, stderr) => Ok(ExecutionResult {
                    status: ExecutionStatus::Failed,
                    duration_ms: 10,
                    exit_code: Some(code),
                    stdout: None,
                    stderr: Some(stderr),
                }),
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::Timeout(ms) => Err(ExecutionError::Timeout(ms)),
            }
        }

        async fn stream(&self, invocation: &Invocation) -> Result<ByteStream, ExecutionError> {
            match self.record(invocation) {
                MockBehavior::Success(chunks) => {
                    let items: Vec<std::io::Result<Bytes>> =
                        chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                MockBehavior::ExitCode(code, stderr) => {
                    let items = vec![
                        Ok(Bytes::from(stderr)),
                        Err(std::io::Error::other(format!("exit code {}", code))),
                    ];
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::Timeout(ms) => {
                    let items: Vec<std::io::Result<Bytes>> = vec![Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("timeout after {}ms", ms),
                    ))];
                    Ok(Box::pin(futures::stream::iter(items)))
                }
            }
        }
    }
}
