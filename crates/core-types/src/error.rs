use crate::enums::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Order {0} is in terminal state {1:?} and cannot transition")]
    TerminalOrder(Uuid, OrderStatus),
}
