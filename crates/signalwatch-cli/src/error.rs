use signalwatch_core::{VerificationError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] signalwatch_core::ValidationError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Verification(VerificationError::Invalid(_)) => 2,
            Self::Verification(VerificationError::NotFound { .. }) => 3,
            Self::Verification(_) => 1,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) | Self::Io(_) => 10,
            Self::Logging(_) => 11,
        }
    }
}
