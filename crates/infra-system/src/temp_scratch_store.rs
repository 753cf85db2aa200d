// Temp-file scratch store
// reason: tempfile for unique names and delete-on-drop paths

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use cfmid_core::port::scratch_store::{ScratchError, ScratchSpace, ScratchStore};

const INPUT_PREFIX: &str = "cfm-in-";
const OUTPUT_PREFIX: &str = "cfm-out-";
const SUFFIX: &str = ".txt";

/// Creates `cfm-in-*.txt` / `cfm-out-*.txt` pairs in a scratch directory
pub struct TempScratchStore {
    dir: PathBuf,
}

impl TempScratchStore {
    /// Scratch files go to `dir`, or the system temp dir when `None`
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create_blocking(dir: &Path, input: &str) -> Result<TempScratchSpace, ScratchError> {
        let mut input_file = Builder::new()
            .prefix(INPUT_PREFIX)
            .suffix(SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| ScratchError::Create {
                kind: "input",
                reason: e.to_string(),
            })?;
        input_file
            .write_all(input.as_bytes())
            .and_then(|_| input_file.flush())
            .map_err(|e| ScratchError::Write(e.to_string()))?;
        // Close the handle; the path is still removed on drop
        let input = input_file.into_temp_path();

        let output = Builder::new()
            .prefix(OUTPUT_PREFIX)
            .suffix(SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| ScratchError::Create {
                kind: "output",
                reason: e.to_string(),
            })?
            .into_temp_path();

        debug!(
            input = %input.display(),
            output = %output.display(),
            "Scratch files created"
        );

        Ok(TempScratchSpace {
            input: Some(input),
            output: Some(output),
        })
    }
}

impl Default for TempScratchStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ScratchStore for TempScratchStore {
    async fn create(&self, input: &str) -> Result<Box<dyn ScratchSpace>, ScratchError> {
        let dir = self.dir.clone();
        let input = input.to_string();
        let space = tokio::task::spawn_blocking(move || Self::create_blocking(&dir, &input))
            .await
            .map_err(|e| ScratchError::Create {
                kind: "input",
                reason: e.to_string(),
            })??;
        Ok(Box::new(space))
    }
}

/// Input/output pair, removed from disk on drop
pub struct TempScratchSpace {
    // Always Some until Drop
    input: Option<TempPath>,
    output: Option<TempPath>,
}

impl TempScratchSpace {
    fn path(slot: &Option<TempPath>) -> &Path {
        slot.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

#[async_trait]
impl ScratchSpace for TempScratchSpace {
    fn input_path(&self) -> &Path {
        Self::path(&self.input)
    }

    fn output_path(&self) -> &Path {
        Self::path(&self.output)
    }

    async fn read_output(&self) -> Result<Vec<u8>, ScratchError> {
        tokio::fs::read(self.output_path())
            .await
            .map_err(|e| ScratchError::Read(e.to_string()))
    }
}

impl Drop for TempScratchSpace {
    fn drop(&mut self) {
        for path in [self.input.take(), self.output.take()].into_iter().flatten() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "Scratch file removed"),
                // Already gone (tool may have replaced or removed it)
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %shown, error = %e, "Scratch file cleanup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_create_writes_input_and_empty_output() {
        let dir = TempDir::new().unwrap();
        let store = TempScratchStore::new(Some(dir.path().to_path_buf()));

        let space = store.create("C1=CC=CC=C1").await.unwrap();

        let input = std::fs::read_to_string(space.input_path()).unwrap();
        assert_eq!(input, "C1=CC=CC=C1");
        assert!(space.output_path().exists());
        assert!(space.read_output().await.unwrap().is_empty());

        let name = space.input_path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(INPUT_PREFIX) && name.ends_with(SUFFIX));
        let name = space.output_path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(OUTPUT_PREFIX) && name.ends_with(SUFFIX));
    }

    #[tokio::test]
    async fn test_drop_removes_files() {
        let dir = TempDir::new().unwrap();
        let store = TempScratchStore::new(Some(dir.path().to_path_buf()));

        let space = store.create("CCO").await.unwrap();
        std::fs::write(space.output_path(), "spectrum").unwrap();
        assert_eq!(space.read_output().await.unwrap(), b"spectrum");
        assert_eq!(scratch_files(dir.path()).len(), 2);

        drop(space);
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let dir = TempDir::new().unwrap();
        let store = TempScratchStore::new(Some(dir.path().to_path_buf()));

        let a = store.create("CCO").await.unwrap();
        let b = store.create("CCO").await.unwrap();

        assert_ne!(a.input_path(), b.input_path());
        assert_ne!(a.output_path(), b.output_path());
    }

    #[tokio::test]
    async fn test_missing_dir_is_create_error() {
        let dir = TempDir::new().unwrap();
        let store = TempScratchStore::new(Some(dir.path().join("does-not-exist")));

        let err = store.create("CCO").await.err().unwrap();
        assert!(matches!(err, ScratchError::Create { kind: "input", .. }));
    }

    #[tokio::test]
    async fn test_drop_tolerates_removed_output() {
        let dir = TempDir::new().unwrap();
        let store = TempScratchStore::new(Some(dir.path().to_path_buf()));

        let space = store.create("CCO").await.unwrap();
        std::fs::remove_file(space.output_path()).unwrap();
        assert!(matches!(
            space.read_output().await,
            Err(ScratchError::Read(_))
        ));
        drop(space);
        assert!(scratch_files(dir.path()).is_empty());
    }
}
