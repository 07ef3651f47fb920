use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Producer received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Producer '{0}' is disabled in the configuration")]
    Disabled(String),
}
