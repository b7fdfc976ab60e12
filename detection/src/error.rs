use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detection backend unreachable: {0}")]
    Unreachable(String),

    #[error("request to detection backend failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from detection backend: {0}")]
    InvalidResponse(String),

    #[error("detection backend refused to embed: {0}")]
    EmbedRejected(String),

    #[error("protection mark unavailable: {0}")]
    MarkUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
