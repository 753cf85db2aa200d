// Prediction Use Case
// validate -> admit -> write input -> spawn tool -> relay output -> cleanup

use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use crate::application::admission::AdmissionControl;
use crate::application::constants::STDERR_LOG_LIMIT;
use crate::domain::{InputFormat, Invocation, OutputMode, PredictionRequest, ToolSettings};
use crate::error::{AppError, Result};
use crate::port::{
    ByteStream, ExecutionStatus, IdProvider, PredictionTool, ScratchSpace, ScratchStore,
    TimeProvider,
};

/// Completed buffered prediction
#[derive(Debug, Clone)]
pub struct Prediction {
    pub request_id: String,
    pub spectrum: Vec<u8>,
    pub duration_ms: i64,
}

/// What the HTTP layer relays to the caller
pub enum PredictionOutput {
    Buffered(Prediction),
    Streaming(ByteStream),
}

/// Prediction Service
pub struct PredictionService {
    tool: Arc<dyn PredictionTool>,
    scratch_store: Arc<dyn ScratchStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    admission: AdmissionControl,
    settings: ToolSettings,
    input_format: InputFormat,
    output_mode: OutputMode,
}

impl PredictionService {
    pub fn new(
        tool: Arc<dyn PredictionTool>,
        scratch_store: Arc<dyn ScratchStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        settings: ToolSettings,
        max_concurrent: usize,
    ) -> Self {
        Self {
            tool,
            scratch_store,
            id_provider,
            time_provider,
            admission: AdmissionControl::new(max_concurrent),
            settings,
            input_format: InputFormat::default(),
            output_mode: OutputMode::default(),
        }
    }

    pub fn with_input_format(mut self, input_format: InputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn in_flight(&self) -> usize {
        self.admission.in_flight()
    }

    /// Run a prediction in the configured output mode
    pub async fn execute(&self, req: PredictionRequest) -> Result<PredictionOutput> {
        match self.output_mode {
            OutputMode::Buffered => self.predict(req).await.map(PredictionOutput::Buffered),
            OutputMode::Streaming => self
                .predict_streaming(req)
                .await
                .map(PredictionOutput::Streaming),
        }
    }

    /// Run the tool to completion and return the output file contents
    pub async fn predict(&self, req: PredictionRequest) -> Result<Prediction> {
        let request_id = self.id_provider.generate_id();
        let span = info_span!("predict", request_id = %request_id, mode = "buffered");

        async move {
            let _permit = self.admission.try_admit()?;
            let scratch = self.prepare(&req).await?;
            let invocation = self.invocation(scratch.as_ref(), &req);

            let start = self.time_provider.now_millis();
            let result = self.tool.run(&invocation).await.map_err(|e| {
                error!(error = %e, "cfm-predict did not complete");
                AppError::from(e)
            })?;

            if result.status != ExecutionStatus::Success {
                error!(
                    exit_code = ?result.exit_code,
                    stderr = %truncate(result.stderr.as_deref().unwrap_or_default()),
                    "cfm-predict failed"
                );
                return Err(AppError::ToolFailed {
                    exit_code: result.exit_code,
                });
            }

            let spectrum = scratch.read_output().await?;
            let duration_ms = self.time_provider.now_millis() - start;

            info!(
                duration_ms = duration_ms,
                output_bytes = spectrum.len(),
                "Prediction completed"
            );

            Ok(Prediction {
                request_id,
                spectrum,
                duration_ms,
            })
            // scratch dropped here on every path
        }
        .instrument(span)
        .await
    }

    /// Start the tool and hand back its live stderr/stdout
    ///
    /// Scratch files and the admission slot live until the stream is dropped.
    pub async fn predict_streaming(&self, req: PredictionRequest) -> Result<ByteStream> {
        let request_id = self.id_provider.generate_id();
        let span = info_span!("predict", request_id = %request_id, mode = "streaming");

        async move {
            let permit = self.admission.try_admit()?;
            let scratch = self.prepare(&req).await?;
            let invocation = self.invocation(scratch.as_ref(), &req);

            let stream = self.tool.stream(&invocation).await.map_err(|e| {
                error!(error = %e, "cfm-predict did not start");
                AppError::from(e)
            })?;

            info!("Streaming cfm-predict output");

            let held = (scratch, permit);
            let stream = stream.map(move |chunk| {
                let _held = &held;
                chunk
            });
            Ok(Box::pin(stream) as ByteStream)
        }
        .instrument(span)
        .await
    }

    async fn prepare(&self, req: &PredictionRequest) -> Result<Box<dyn ScratchSpace>> {
        let input = self.input_format.render(&req.smiles);
        let scratch = self.scratch_store.create(&input).await.map_err(|e| {
            error!(error = %e, "Scratch allocation failed");
            AppError::from(e)
        })?;
        Ok(scratch)
    }

    fn invocation(&self, scratch: &dyn ScratchSpace, req: &PredictionRequest) -> Invocation {
        Invocation::new(
            &self.settings,
            scratch.input_path(),
            scratch.output_path(),
            req.prob_thresh,
        )
    }
}

fn truncate(s: &str) -> &str {
    if s.len() <= STDERR_LOG_LIMIT {
        return s;
    }
    let mut end = STDERR_LOG_LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
