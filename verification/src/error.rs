use shield_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("candidate registry unavailable: {0}")]
    Registry(#[from] StoreError),

    #[error("probe {path} is unreadable: {source}")]
    ProbeUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
