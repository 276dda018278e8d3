//! Error Handling Module
//!
//! Defines the error type shared by the EDA and training pipelines.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for wildfire detection operations
#[derive(Error, Debug)]
pub enum WildfireError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset layout or contents
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model construction or persistence
    #[error("Model error: {0}")]
    Model(String),

    /// Error inside the fit loop
    #[error("Training error: {0}")]
    Training(String),

    /// Error computing evaluation metrics
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Error during prediction
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for wildfire detection operations
pub type Result<T> = std::result::Result<T, WildfireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WildfireError::Dataset("no class directories".to_string());
        assert_eq!(format!("{}", err), "Dataset error: no class directories");
    }

    #[test]
    fn test_image_load_error_names_path() {
        let path = PathBuf::from("/data/train/wildfire/-73.5,45.6.jpg");
        let err = WildfireError::ImageLoad(path, "truncated file".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("-73.5,45.6.jpg"));
        assert!(msg.contains("truncated file"));
    }

    #[test]
    fn test_io_error_converts() {
        fn open_missing() -> Result<()> {
            std::fs::read("/definitely/not/here.png")?;
            Ok(())
        }
        assert!(matches!(open_missing(), Err(WildfireError::Io(_))));
    }
}
