//! Service-level errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("trap listener cannot bind port {port}: {source}")]
    TrapBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;
