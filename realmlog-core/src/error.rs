use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealmlogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed input in {document}: {reason}")]
    MalformedInput { document: String, reason: String },

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RealmlogError {
    pub fn malformed(document: impl Into<String>, reason: impl Into<String>) -> Self {
        RealmlogError::MalformedInput {
            document: document.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RealmlogError>;
