use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough cash available to settle fill. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Position not found for symbol: {0}")]
    PositionNotFound(String),

    #[error("Invalid sell quantity. Requested: {requested}, Available: {available}")]
    InsufficientQuantity { requested: u64, available: u64 },

    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error(transparent)]
    OrderState(#[from] core_types::CoreError),
}
