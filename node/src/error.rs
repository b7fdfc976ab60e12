use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] shield_store_lmdb::LmdbError),

    #[error("store error: {0}")]
    Store(#[from] shield_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] shield_ledger::LedgerError),

    #[error("detection error: {0}")]
    Detection(#[from] shield_detection::DetectionError),

    #[error("HTTP server error: {0}")]
    Rpc(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
