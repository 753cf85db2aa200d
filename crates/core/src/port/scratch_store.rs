// Scratch Store Port
// Per-request input/output artifacts handed to the prediction tool

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScratchError {
    #[error("Create {kind} file failed: {reason}")]
    Create { kind: &'static str, reason: String },

    #[error("Write input file failed: {0}")]
    Write(String),

    #[error("Read output file failed: {0}")]
    Read(String),
}

/// Scratch artifacts owned by one request
///
/// Dropping the space removes every file it created.
#[async_trait]
pub trait ScratchSpace: Send + Sync {
    fn input_path(&self) -> &Path;

    fn output_path(&self) -> &Path;

    /// Read whatever the tool wrote to the output path
    async fn read_output(&self) -> Result<Vec<u8>, ScratchError>;
}

/// Factory for scratch spaces
#[async_trait]
pub trait ScratchStore: Send + Sync {
    /// Create a fresh, uniquely named input file holding `input`, plus an
    /// empty output file next to it
    async fn create(&self, input: &str) -> Result<Box<dyn ScratchSpace>, ScratchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory scratch store
    ///
    /// Tracks live spaces so tests can assert cleanup.
    pub struct MockScratchStore {
        output: Option<Vec<u8>>,
        fail_create: bool,
        live: Arc<AtomicUsize>,
        inputs: Arc<Mutex<Vec<String>>>,
    }

    impl MockScratchStore {
        /// Spaces whose output reads back as `output`
        pub fn with_output(output: impl Into<Vec<u8>>) -> Self {
            Self {
                output: Some(output.into()),
                fail_create: false,
                live: Arc::new(AtomicUsize::new(0)),
                inputs: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Spaces whose output cannot be read
        pub fn unreadable() -> Self {
            Self {
                output: None,
                ..Self::with_output(Vec::new())
            }
        }

        /// Store that cannot create spaces
        pub fn failing() -> Self {
            Self {
                fail_create: true,
                ..Self::with_output(Vec::new())
            }
        }

        /// Number of spaces not yet dropped
        pub fn live_spaces(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        pub fn inputs(&self) -> Vec<String> {
            self.inputs.lock().unwrap().clone()
        }
    }

    struct MockScratchSpace {
        input: PathBuf,
        output_path: PathBuf,
        output: Option<Vec<u8>>,
        live: Arc<AtomicUsize>,
    }

    impl Drop for MockScratchSpace {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ScratchSpace for MockScratchSpace {
        fn input_path(&self) -> &Path {
            &self.input
        }

        fn output_path(&self) -> &Path {
            &self.output_path
        }

        async fn read_output(&self) -> Result<Vec<u8>, ScratchError> {
            self.output
                .clone()
                .ok_or_else(|| ScratchError::Read("mock output unavailable".to_string()))
        }
    }

    #[async_trait]
    impl ScratchStore for MockScratchStore {
        async fn create(&self, input: &str) -> Result<Box<dyn ScratchSpace>, ScratchError> {
            if self.fail_create {
                return Err(ScratchError::Create {
                    kind: "input",
                    reason: "mock store refuses".to_string(),
                });
            }

            let mut inputs = self.inputs.lock().unwrap();
            inputs.push(input.to_string());
            let n = inputs.len();
            self.live.fetch_add(1, Ordering::SeqCst);

            Ok(Box::new(MockScratchSpace {
                input: PathBuf::from(format!("/mock/cfm-in-{}.txt", n)),
                output_path: PathBuf::from(format!("/mock/cfm-out-{}.txt", n)),
                output: self.output.clone(),
                live: self.live.clone(),
            }))
        }
    }
}
