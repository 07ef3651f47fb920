//! # Quorum Events
//!
//! This crate defines the serializable records the engine emits to external
//! sinks (persistence, telemetry, UI). It is a Layer 0 crate: it depends only
//! on `core-types` and provides the definitive field names for everything
//! that crosses the process boundary.

// Declare the modules that make up this crate.
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use messages::{
    EngineEvent, FillRecord, LedgerSnapshot, OrderRecord, PositionRecord, VerdictRecord,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_and_payload_tags() {
        let snapshot = LedgerSnapshot {
            timestamp: chrono::Utc::now(),
            cash: rust_decimal_macros::dec!(10000),
            positions: Vec::new(),
            total_value: rust_decimal_macros::dec!(10000),
            realized_pnl: rust_decimal_macros::dec!(0),
            unrealized_pnl: rust_decimal_macros::dec!(0),
            total_return: rust_decimal_macros::dec!(0),
        };
        let json = serde_json::to_value(EngineEvent::CycleComplete(snapshot)).unwrap();
        assert_eq!(json["type"], "CycleComplete");
        // Interop contract: camelCase field names for downstream consumers.
        assert!(json["payload"].get("totalValue").is_some());
        assert!(json["payload"].get("unrealizedPnl").is_some());
    }
}
