//! Ingestion error types

use navigator_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::PdfParseError { path, message } => AppError::Ingestion {
                source_name: path,
                message,
            },
            IngestionError::UnsupportedFormat(name) => AppError::UnsupportedFormat { name },
            IngestionError::FileNotFound(path) => AppError::NotFound {
                resource_type: "file".to_string(),
                id: path,
            },
            IngestionError::NotADirectory(path) => AppError::NotFound {
                resource_type: "folder".to_string(),
                id: path,
            },
            IngestionError::TaskFailed(message) => AppError::Internal { message },
            IngestionError::IoError(err) => AppError::Internal {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_app_error() {
        let err: AppError = IngestionError::UnsupportedFormat("notes.docx".into()).into();
        assert_eq!(err.status_code().as_u16(), 400);

        let err: AppError = IngestionError::NotADirectory("/missing".into()).into();
        assert_eq!(err.status_code().as_u16(), 404);

        let err: AppError = IngestionError::PdfParseError {
            path: "broken.pdf".into(),
            message: "bad xref".into(),
        }
        .into();
        assert_eq!(err.status_code().as_u16(), 422);
    }
}
