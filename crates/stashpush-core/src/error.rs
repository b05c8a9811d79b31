//! Error taxonomy for stashpush.
//!
//! Only configuration-time failures surface as errors. Everything that goes
//! wrong while delivering a single status or comment is logged and recorded
//! as a [`crate::delivery::Delivery`] instead.

/// Errors produced while parsing a property template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated interpolation starting at byte {offset} in {template:?}")]
    Unterminated { template: String, offset: usize },

    #[error("unsupported interpolation source {source_kind:?} in {template:?}")]
    UnsupportedSource {
        template: String,
        source_kind: String,
    },

    #[error("malformed interpolation {expr:?}")]
    Malformed { expr: String },
}

/// Errors raised by an HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Top-level stashpush errors.
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid pull request url {url:?}: {reason}")]
    InvalidPullRequestUrl { url: String, reason: String },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stashpush operations.
pub type Result<T> = std::result::Result<T, ReporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_display() {
        let err = TemplateError::Unterminated {
            template: "%(prop:x".to_string(),
            offset: 0,
        };
        assert!(err.to_string().contains("unterminated"));
        assert!(err.to_string().contains("%(prop:x"));
    }

    #[test]
    fn test_reporter_error_wraps_template_error() {
        let err: ReporterError = TemplateError::Malformed {
            expr: "%(prop)s".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("template error"));
        assert!(msg.contains("%(prop)s"));
    }

    #[test]
    fn test_invalid_pull_request_url_error() {
        let err = ReporterError::InvalidPullRequestUrl {
            url: "not a url".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("not a url"));
        assert!(msg.contains("relative URL"));
    }
}
