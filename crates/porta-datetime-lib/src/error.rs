#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortaError {
    /// The timezone argument was neither a zone name nor a timezone object.
    #[error("Timezone must be a string or a timezone object, got {kind}")]
    InvalidTimezoneArgument { kind: &'static str },

    #[error("Unknown or bad timezone: {0}")]
    UnknownTimezone(String),

    #[error("Failed to parse time string '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Date out of range: {0}")]
    OutOfRange(String),
}

impl PortaError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        PortaError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_invalid_timezone_argument(&self) -> bool {
        matches!(self, PortaError::InvalidTimezoneArgument { .. })
    }
}

pub type Result<T> = std::result::Result<T, PortaError>;
