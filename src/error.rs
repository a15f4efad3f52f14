//! Unified error handling for trace-stitch.
//!
//! Only input, configuration and output problems are errors. Upstream engine
//! failures are recovered by the resolver chain and never surface here; see
//! [`crate::backend::Failure`].

use std::fmt;

/// Unified error type for trace-stitch operations.
#[derive(Debug, Clone)]
pub enum TraceStitchError {
    /// No input files were given
    NoInputFiles,
    /// File could not be read
    Io { path: String, message: String },
    /// File is not valid JSON
    Parse { path: String, message: String },
    /// JSON did not match any known track schema
    UnrecognizedSchema { path: String },
    /// Trace has too few usable points
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },
    /// Every segment resolved to nothing
    EmptyGeometry,
    /// HTTP/engine error that could not be recovered
    HttpError {
        message: String,
        status_code: Option<u16>,
    },
    /// Configuration error
    ConfigError { message: String },
    /// Result could not be written
    OutputError { path: String, message: String },
}

impl fmt::Display for TraceStitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStitchError::NoInputFiles => write!(f, "No input files given"),
            TraceStitchError::Io { path, message } => {
                write!(f, "Failed to read '{}': {}", path, message)
            }
            TraceStitchError::Parse { path, message } => {
                write!(f, "Invalid JSON in '{}': {}", path, message)
            }
            TraceStitchError::UnrecognizedSchema { path } => {
                write!(f, "'{}' has no recognizable track points", path)
            }
            TraceStitchError::InsufficientPoints {
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "Trace has {} points, minimum {} required",
                    point_count, minimum_required
                )
            }
            TraceStitchError::EmptyGeometry => write!(f, "No route geometry could be built"),
            TraceStitchError::HttpError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            TraceStitchError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TraceStitchError::OutputError { path, message } => {
                write!(f, "Failed to write '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for TraceStitchError {}

/// Result type alias for trace-stitch operations.
pub type Result<T> = std::result::Result<T, TraceStitchError>;

/// Extension trait for converting Option to TraceStitchError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T>;

    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T> {
        self.ok_or_else(|| TraceStitchError::InsufficientPoints {
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TraceStitchError::ConfigError {
            message: message.to_string(),
        })
    }
}
