use thiserror::Error;

/// Core error type for lmchat.
/// Only transport and upstream failures end a session; decode-level problems
/// are absorbed inside the pipeline and never surface here.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The inference server could not be reached at all.
    #[error("could not reach inference server at {url}: {message}")]
    Transport { url: String, message: String },

    /// The inference server answered with a non-success status.
    #[error("inference server returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response body broke off while a session was being decoded.
    #[error("stream read failed: {0}")]
    StreamRead(String),

    #[error("upstream response decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Short stable label used in logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport { .. } => "transport",
            Self::Upstream { .. } => "upstream",
            Self::StreamRead(_) => "stream_read",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_embeds_status() {
        let err = RelayError::Upstream {
            status: 500,
            body: "model crashed".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("model crashed"));
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn transport_error_names_url() {
        let err = RelayError::Transport {
            url: "http://127.0.0.1:9".into(),
            message: "connection refused".into(),
        };
        assert!(err.to_string().contains("http://127.0.0.1:9"));
        assert_eq!(err.kind(), "transport");
    }
}
