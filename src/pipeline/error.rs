//! Error taxonomy for pipeline stages
//!
//! Errors are values recorded on the request context rather than control flow:
//! only [`ErrorSeverity::Critical`] stops the pipeline.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How an error affects the rest of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorSeverity {
    /// Operation degraded, continue
    Warning,
    /// Operation failed, continue with the next stage
    Error,
    /// Pipeline must stop now
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Domain an [`ErrorCode`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    RateLimit,
    Validation,
    Model,
    File,
    Transcription,
    Search,
    Agent,
    Pipeline,
    ExternalService,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Auth
    AuthRequired,
    AuthInvalidToken,
    AuthForbidden,
    // Rate limiting
    RateLimitExceeded,
    // Validation
    ValidationError,
    InvalidParameter,
    MissingParameter,
    // Model / execution
    ModelNotFound,
    ModelUnavailable,
    ModelExecutionFailed,
    ContextLengthExceeded,
    // File processing
    FileTooLarge,
    UnsupportedFileType,
    FileProcessingFailed,
    // Transcription
    TranscriptionFailed,
    AudioExtractionFailed,
    // Search / RAG
    SearchFailed,
    RagRetrievalFailed,
    // Agent
    AgentExecutionFailed,
    AgentToolFailed,
    // Pipeline
    PipelineTimeout,
    PipelineStageFailed,
    // External services
    ExternalServiceError,
    ExternalServiceTimeout,
    // Generic
    InternalError,
    UnknownError,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            AuthRequired | AuthInvalidToken | AuthForbidden => ErrorCategory::Auth,
            RateLimitExceeded => ErrorCategory::RateLimit,
            ValidationError | InvalidParameter | MissingParameter => ErrorCategory::Validation,
            ModelNotFound | ModelUnavailable | ModelExecutionFailed | ContextLengthExceeded => {
                ErrorCategory::Model
            }
            FileTooLarge | UnsupportedFileType | FileProcessingFailed => ErrorCategory::File,
            TranscriptionFailed | AudioExtractionFailed => ErrorCategory::Transcription,
            SearchFailed | RagRetrievalFailed => ErrorCategory::Search,
            AgentExecutionFailed | AgentToolFailed => ErrorCategory::Agent,
            PipelineTimeout | PipelineStageFailed => ErrorCategory::Pipeline,
            ExternalServiceError | ExternalServiceTimeout => ErrorCategory::ExternalService,
            InternalError | UnknownError => ErrorCategory::Generic,
        }
    }

    /// Suggested HTTP status when the error is reported to a client
    pub fn http_status(self) -> u16 {
        use ErrorCode::*;
        match self {
            AuthRequired | AuthInvalidToken => 401,
            AuthForbidden => 403,
            RateLimitExceeded => 429,
            ValidationError | InvalidParameter | MissingParameter | ContextLengthExceeded
            | UnsupportedFileType => 400,
            FileTooLarge => 413,
            ModelNotFound => 404,
            ModelUnavailable => 503,
            PipelineTimeout | ExternalServiceTimeout => 504,
            ExternalServiceError => 502,
            _ => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            AuthRequired => "AUTH_REQUIRED",
            AuthInvalidToken => "AUTH_INVALID_TOKEN",
            AuthForbidden => "AUTH_FORBIDDEN",
            RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ValidationError => "VALIDATION_ERROR",
            InvalidParameter => "INVALID_PARAMETER",
            MissingParameter => "MISSING_PARAMETER",
            ModelNotFound => "MODEL_NOT_FOUND",
            ModelUnavailable => "MODEL_UNAVAILABLE",
            ModelExecutionFailed => "MODEL_EXECUTION_FAILED",
            ContextLengthExceeded => "CONTEXT_LENGTH_EXCEEDED",
            FileTooLarge => "FILE_TOO_LARGE",
            UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            FileProcessingFailed => "FILE_PROCESSING_FAILED",
            TranscriptionFailed => "TRANSCRIPTION_FAILED",
            AudioExtractionFailed => "AUDIO_EXTRACTION_FAILED",
            SearchFailed => "SEARCH_FAILED",
            RagRetrievalFailed => "RAG_RETRIEVAL_FAILED",
            AgentExecutionFailed => "AGENT_EXECUTION_FAILED",
            AgentToolFailed => "AGENT_TOOL_FAILED",
            PipelineTimeout => "PIPELINE_TIMEOUT",
            PipelineStageFailed => "PIPELINE_STAGE_FAILED",
            ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ExternalServiceTimeout => "EXTERNAL_SERVICE_TIMEOUT",
            InternalError => "INTERNAL_ERROR",
            UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error recorded while processing one request
#[derive(Debug, Clone, Serialize)]
pub struct PipelineError {
    pub code: ErrorCode,
    pub severity: ErrorSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip)]
    pub cause: Option<Arc<dyn Error + Send + Sync>>,
}

impl PipelineError {
    pub fn new(code: ErrorCode, severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            metadata: Map::new(),
            cause: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSeverity::Warning, message)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSeverity::Error, message)
    }

    pub fn critical(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, ErrorSeverity::Critical, message)
    }

    /// Warning recorded by the orchestrator when a stage exceeds its timeout
    pub fn stage_timeout(stage_name: &str, timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        Self::warning(
            ErrorCode::PipelineTimeout,
            format!("Stage {} timed out after {}ms", stage_name, timeout_ms),
        )
        .with_metadata("stageName", stage_name)
        .with_metadata("timeoutMs", timeout_ms)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}
