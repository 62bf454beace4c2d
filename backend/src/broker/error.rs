//! Error types for remote broker and catalog operations.
//!
//! Every error carries a structured [`ErrorContext`] naming the operation,
//! the object it concerned and whether a retry could succeed.

use std::fmt;

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Structured context for broker errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "query_objects", "crossmatch")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "object", "stamp", "catalog")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether this error is retryable
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for broker and catalog calls
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport failure: DNS, connect, TLS, or a dropped connection.
    #[error("Connection error: {message} {context}")]
    Connection {
        message: String,
        context: ErrorContext,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message} {context}")]
    Status {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {message} {context}")]
    Decode {
        message: String,
        context: ErrorContext,
    },

    /// The requested object or product does not exist.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    #[error("Timeout error: {message} {context}")]
    Timeout {
        message: String,
        context: ErrorContext,
    },

    /// A paged search still had results after the configured page cap.
    #[error("Result truncated after {pages} pages ({fetched} objects) {context}")]
    PageLimit {
        pages: u32,
        fetched: usize,
        context: ErrorContext,
    },

    /// Client construction or endpoint configuration problem.
    #[error("Configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },
}

impl BrokerError {
    pub fn connection(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Connection {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// 5xx and 429 responses are marked retryable.
    pub fn status(status: u16, message: impl Into<String>, context: ErrorContext) -> Self {
        let context = if status >= 500 || status == 429 {
            context.retryable()
        } else {
            context
        };
        Self::Status {
            status,
            message: message.into(),
            context,
        }
    }

    pub fn decode(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Decode {
            message: message.into(),
            context,
        }
    }

    pub fn not_found(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    pub fn timeout(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Timeout {
            message: message.into(),
            context: context.retryable(),
        }
    }

    pub fn page_limit(pages: u32, fetched: usize, context: ErrorContext) -> Self {
        Self::PageLimit {
            pages,
            fetched,
            context: context.with_details("page limit reached"),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Classify a transport error from `reqwest`.
    pub fn from_reqwest(err: reqwest::Error, context: ErrorContext) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string(), context)
        } else if err.is_decode() {
            Self::decode(err.to_string(), context)
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string(), context)
        } else {
            Self::connection(err.to_string(), context)
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Connection { context, .. }
            | Self::Status { context, .. }
            | Self::Decode { context, .. }
            | Self::NotFound { context, .. }
            | Self::Timeout { context, .. }
            | Self::PageLimit { context, .. }
            | Self::Configuration { context, .. } => context,
        }
    }
}
