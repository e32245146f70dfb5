use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause for failures coming out of the inference engine, codec or window backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the video segmentation tool.
///
/// Every startup step has its own variant so callers (and tests) can tell a broken
/// descriptor file apart from a missing graph or an unresolvable node without parsing
/// message strings. All of them abort the run before the first frame is processed.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("Configuration error in {path:?}: {reason}")]
    Config {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Model not found: {path:?}")]
    ModelNotFound { path: PathBuf },

    #[error("Graph load error: {operation} failed for {path:?}")]
    GraphLoad {
        path: PathBuf,
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Node resolution error: {role} node `{name}` is not in the graph")]
    NodeResolution {
        role: &'static str,
        name: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Inference error: {operation} failed")]
    Inference {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Webcam reading is not implemented; pass --video <path>")]
    WebcamUnsupported,

    #[error("Output directory error: {operation} failed for {path:?}")]
    OutputDir {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Video error: {operation} failed")]
    Video {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Display error: {operation} failed")]
    Display {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Frame {index}: {operation} failed")]
    Frame {
        index: u64,
        operation: String,
        #[source]
        source: BoxError,
    },
}

pub type Result<T> = std::result::Result<T, SegError>;

impl SegError {
    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn frame(index: u64, operation: &str, source: impl Into<BoxError>) -> Self {
        Self::Frame {
            index,
            operation: operation.to_string(),
            source: source.into(),
        }
    }
}
