//! Error types for SVM training, prediction and model files

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    /// A parameter set rejected before any solving starts
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model not trained")]
    ModelNotTrained,

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    /// Malformed or truncated model text
    #[error("Model file error at line {line}: {message}")]
    ModelFile { line: usize, message: String },

    /// An operation the model cannot answer, such as linear weights of an RBF model
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SVMError {
    pub(crate) fn model_file(line: usize, message: impl Into<String>) -> Self {
        SVMError::ModelFile {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SVMError::InvalidParameter("C <= 0".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: C <= 0");

        let err = SVMError::model_file(3, "missing rho");
        assert_eq!(err.to_string(), "Model file error at line 3: missing rho");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SVMError = io.into();
        assert!(matches!(err, SVMError::IoError(_)));
    }
}
