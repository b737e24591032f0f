use thiserror::Error;

/// Error reported by the mediation SDK itself.
///
/// The SDK only gives us a numeric code and a message; we keep both so the
/// UI layer can log them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sdk error {code}: {message}")]
pub struct SdkError {
    pub code: i64,
    pub message: String,
}

impl SdkError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failures surfaced to callers of the ad lifecycle.
///
/// `Clone` because one load failure fans out to every queued continuation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdError {
    #[error("no slot configuration has been fetched and no valid cache exists")]
    ConfigurationUnavailable,

    #[error("ad load timed out")]
    LoadTimeout,

    #[error("ad load failed: {0}")]
    LoadFailed(SdkError),

    #[error("ad show failed: {0}")]
    ShowFailed(SdkError),

    #[error("an ad is already showing for this slot")]
    AlreadyShowing,

    #[error("ad is not ready")]
    NotReady,

    #[error("pending show request was replaced by a newer one")]
    ShowSuperseded,

    #[error("reward verification failed")]
    RewardVerificationFailed,

    #[error("no ad instance for slot_id={0}")]
    InstanceMissing(String),
}

/// Failures while fetching or decoding the slot configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("slot configuration fetch failed: {0}")]
    Fetch(String),

    #[error("slot configuration decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("slot configuration payload must be a JSON object")]
    NotAnObject,

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
