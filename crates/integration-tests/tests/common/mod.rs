//! Shared wiring for the end-to-end tests: real subprocess and scratch
//! adapters, with a shell script standing in for cfm-predict.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use cfmid_api_http::{AppState, RateLimiter};
use cfmid_core::application::PredictionService;
use cfmid_core::domain::{OutputMode, ToolSettings};
use cfmid_core::port::id_provider::UuidProvider;
use cfmid_core::port::time_provider::SystemTimeProvider;
use cfmid_infra_system::{CfmPredictTool, TempScratchStore};

/// Writes the input line and threshold to the output file, like a tiny cfm-predict
pub const ECHO_TOOL: &str = r#"printf 'input=%s thresh=%s\n' "$(cat "$1")" "$2" > "$6""#;

pub struct Harness {
    // Held for its Drop; removes the stub and scratch directory
    _root: TempDir,
    pub scratch_dir: PathBuf,
    pub service: Arc<PredictionService>,
    pub state: AppState,
}

impl Harness {
    /// Entries left behind in the scratch directory
    pub fn leftovers(&self) -> Vec<String> {
        std::fs::read_dir(&self.scratch_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }
}

pub struct HarnessBuilder {
    script: String,
    mode: OutputMode,
    max_concurrent: usize,
    timeout: Duration,
}

pub fn harness(script: &str) -> HarnessBuilder {
    HarnessBuilder {
        script: script.to_string(),
        mode: OutputMode::Buffered,
        max_concurrent: 4,
        timeout: Duration::from_secs(10),
    }
}

impl HarnessBuilder {
    pub fn streaming(mut self) -> Self {
        self.mode = OutputMode::Streaming;
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let root = TempDir::new().unwrap();
        let scratch_dir = root.path().join("scratch");
        std::fs::create_dir(&scratch_dir).unwrap();

        let settings = ToolSettings {
            executable: write_stub(root.path(), &self.script),
            timeout: self.timeout,
            ..ToolSettings::default()
        };

        let time_provider = Arc::new(SystemTimeProvider);
        let tool = CfmPredictTool::new(time_provider.clone())
            .with_graceful_kill_timeout(Duration::from_millis(200));
        let service = Arc::new(
            PredictionService::new(
                Arc::new(tool),
                Arc::new(TempScratchStore::new(Some(scratch_dir.clone()))),
                Arc::new(UuidProvider),
                time_provider,
                settings,
                self.max_concurrent,
            )
            .with_output_mode(self.mode),
        );
        let state = AppState::new(service.clone(), RateLimiter::new(1_000, 1_000));

        Harness {
            _root: root,
            scratch_dir,
            service,
            state,
        }
    }
}

fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("cfm-predict");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
