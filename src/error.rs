use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the member store, the membership logic and the adapters.
///
/// Every variant renders as a message that can be shown to the operator as is.
/// Check-in outcomes such as an unknown code or a lapsed subscription are not
/// errors; see [`crate::membership::CheckInResult`].
#[derive(Debug, Error)]
pub enum GymError {
    /// The backing file exists but could not be read or parsed.
    #[error("member store {} is unavailable: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    /// Writing the new table failed; the previous file is left in place.
    #[error("failed to write member store {}: {reason}", path.display())]
    StorageWriteFailed { path: PathBuf, reason: String },

    /// Empty or malformed operator input.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("member '{0}' already exists")]
    DuplicateKey(String),

    #[error("member '{0}' not found")]
    NotFound(String),

    #[error("could not encode QR code: {0}")]
    QrEncode(String),

    /// Uploaded frame bytes are not a decodable image.
    #[error("could not read image: {0}")]
    InvalidImage(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, GymError>;
