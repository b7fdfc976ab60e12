use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid content reference: {0}")]
    InvalidContentRef(String),
}
