use crate::DecisionProducer;
use crate::error::ProducerError;
use crate::momentum::Momentum;
use crate::reversion::Reversion;
use configuration::ProducerConfig;
use core_types::ProducerId;
use std::sync::Arc;

/// Creates a producer instance from its configuration block.
///
/// Disabled producers are refused here so the engine only ever holds live
/// ones. The match is exhaustive; adding a `ProducerId` variant without a
/// factory arm is a compile error.
pub fn create_producer(config: &ProducerConfig) -> Result<Arc<dyn DecisionProducer>, ProducerError> {
    if !config.enabled {
        return Err(ProducerError::Disabled(config.name.clone()));
    }
    match config.id {
        ProducerId::Momentum => Ok(Arc::new(Momentum::new(config)?)),
        ProducerId::Reversion => Ok(Arc::new(Reversion::new(config)?)),
    }
}
