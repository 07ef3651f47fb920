pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderKind, OrderStatus, ProducerId, TradeAction};
pub use error::CoreError;
pub use structs::{Decision, Fill, Order, Position, RiskVerdict, TradeRecord};
