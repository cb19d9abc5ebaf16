use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("connection registry is not running")]
    RegistryClosed,

    #[error("failed to encode change event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}
