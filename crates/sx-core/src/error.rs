use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite value for {what} in configuration {id}: {value}")]
    NonFinite { id: i64, what: &'static str, value: f64 },

    #[error("Invalid field period count in configuration {id}: {nfp}")]
    InvalidNfp { id: i64, nfp: i64 },

    #[error("Unknown model order: {0}")]
    UnknownOrder(String),
}
