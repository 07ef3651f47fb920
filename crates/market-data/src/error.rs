use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("No quote available for {0}: {1}")]
    Unavailable(String, String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}
