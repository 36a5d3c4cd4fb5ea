/// Failure reported by a provider delta sequence
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Request aborted: {0}")]
    Aborted(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Malformed delta: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether this failure is the caller walking away rather than a real error
    pub fn is_abort(&self) -> bool {
        match self {
            ProviderError::Aborted(_) => true,
            other => {
                let message = other.to_string().to_lowercase();
                message.contains("abort") || message.contains("cancel")
            }
        }
    }
}

/// Terminal error item of a processed output stream
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("Provider stream failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to encode response metadata: {0}")]
    Metadata(String),

    #[error("Stream processor task failed: {0}")]
    Internal(String),
}
