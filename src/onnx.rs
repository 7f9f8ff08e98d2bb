//! ONNX Runtime backed classifier.
//!
//! [`OnnxClassifier`] loads an exported forgery-detection graph and runs it
//! through `ort`. The graph's first input receives the clip tensor. If it
//! declares a second input, that one receives the per-clip length hints as
//! `int64`. The first output is returned as the logits.
//!
//! Exported graphs are inference-only, so the mode switch is tracked but has
//! no effect on the computation, and gradients are never recorded.

use std::path::{Path, PathBuf};

use ndarray::{Array1, ArrayD, ArrayView5};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::Tensor;

use crate::configuration::{Device, ScoreOptions};
use crate::error::ScoreError;
use crate::inference::{ClassifierError, ForgeryClassifier, ModelMode};

/// A forgery classifier running an ONNX graph.
pub struct OnnxClassifier {
    session: Session,
    model_path: PathBuf,
    device: Device,
    clips_input: String,
    lengths_input: Option<String>,
    logits_output: String,
    mode: ModelMode,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("model_path", &self.model_path)
            .field("device", &self.device)
            .field("clips_input", &self.clips_input)
            .field("lengths_input", &self.lengths_input)
            .field("logits_output", &self.logits_output)
            .field("mode", &self.mode)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load a graph from `path` and place it on `device`.
    ///
    /// # Errors
    ///
    /// - [`ScoreError::ModelLoad`] if the file is missing, is not a valid
    ///   graph, or declares no inputs or outputs.
    /// - [`ScoreError::UnsupportedDevice`] if `device` is a GPU and the crate
    ///   was built without the `cuda` feature, or the GPU cannot be used.
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Self, ScoreError> {
        let model_path = path.as_ref().to_path_buf();
        let load_error = |reason: String| ScoreError::ModelLoad {
            path: model_path.clone(),
            reason,
        };

        if !model_path.is_file() {
            return Err(load_error("file does not exist".to_string()));
        }

        log::debug!("Loading classifier from {} on {device}", model_path.display());

        let builder = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .map_err(|error| load_error(error.to_string()))?;
        let builder = with_device(builder, device)?;
        let session = builder
            .commit_from_file(&model_path)
            .map_err(|error| load_error(error.to_string()))?;

        let mut inputs = session.inputs.iter().map(|input| input.name.clone());
        let Some(clips_input) = inputs.next() else {
            return Err(load_error("graph declares no inputs".to_string()));
        };
        let lengths_input = inputs.next();
        let Some(logits_output) = session.outputs.first().map(|output| output.name.clone()) else {
            return Err(load_error("graph declares no outputs".to_string()));
        };

        log::info!(
            "Loaded classifier {} (inputs: {clips_input}{}, output: {logits_output})",
            model_path.display(),
            lengths_input
                .as_deref()
                .map(|name| format!(", {name}"))
                .unwrap_or_default()
        );

        Ok(Self {
            session,
            model_path,
            device,
            clips_input,
            lengths_input,
            logits_output,
            mode: ModelMode::default(),
        })
    }

    /// Load a graph from `path` on the device configured in `options`.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_options<P: AsRef<Path>>(
        path: P,
        options: &ScoreOptions,
    ) -> Result<Self, ScoreError> {
        Self::load(path, options.device())
    }

    /// Path the graph was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Device the session runs on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Names of the graph inputs in use, clips first.
    pub fn input_names(&self) -> Vec<&str> {
        std::iter::once(self.clips_input.as_str())
            .chain(self.lengths_input.as_deref())
            .collect()
    }
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, ScoreError> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => {
            let ordinal = cuda_ordinal(device_id)?;
            builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(ordinal)
                    .build()
                    .error_on_failure()])
                .map_err(|error| ScoreError::UnsupportedDevice(format!("{device}: {error}")))
        }
    }
}

/// ONNX Runtime takes a signed ordinal.
fn cuda_ordinal(device_id: u32) -> Result<i32, ScoreError> {
    i32::try_from(device_id).map_err(|_| {
        ScoreError::UnsupportedDevice(format!(
            "cuda:{device_id} is out of range for a CUDA device ordinal"
        ))
    })
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, ScoreError> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => {
            cuda_ordinal(device_id)?;
            Err(ScoreError::UnsupportedDevice(format!(
                "{device} requested but this build has no CUDA support (enable the `cuda` feature)"
            )))
        }
    }
}

impl ForgeryClassifier for OnnxClassifier {
    fn forward(
        &mut self,
        clips: ArrayView5<'_, f32>,
        lengths: &[usize],
    ) -> Result<ArrayD<f32>, ClassifierError> {
        let clips = Tensor::from_array(clips.as_standard_layout().into_owned())?;

        let outputs = match &self.lengths_input {
            Some(lengths_input) => {
                let lengths: Array1<i64> = lengths.iter().map(|&length| length as i64).collect();
                let lengths = Tensor::from_array(lengths)?;
                self.session.run(ort::inputs![
                    self.clips_input.as_str() => clips,
                    lengths_input.as_str() => lengths
                ])?
            }
            None => self
                .session
                .run(ort::inputs![self.clips_input.as_str() => clips])?,
        };

        let Some(logits) = outputs.get(self.logits_output.as_str()) else {
            return Err(format!("graph produced no `{}` output", self.logits_output).into());
        };
        Ok(logits.try_extract_array::<f32>()?.to_owned())
    }

    fn mode(&self) -> ModelMode {
        self.mode
    }

    fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }
}
