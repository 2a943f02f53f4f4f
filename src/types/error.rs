use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum S3bulkError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("failed to enumerate source directory: {0}")]
    Enumeration(String),
    #[error("failed to plan transfer: {0}")]
    Planning(String),
    #[error("transient transfer failure: {0}")]
    TransientTransfer(String),
    #[error("permanent transfer failure: {0}")]
    PermanentTransfer(String),
    #[error("cancelled")]
    Cancelled,
}
