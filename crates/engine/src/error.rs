use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Risk policy error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("Producer error: {0}")]
    Producer(#[from] producers::ProducerError),

    #[error("Execution error: {0}")]
    Execution(#[from] executor::ExecutorError),
}
