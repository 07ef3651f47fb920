use core_types::{Order, OrderStatus};
use events::OrderRecord;
use std::collections::VecDeque;

/// A bounded in-memory record of every order the engine has created.
///
/// Orders are kept in creation order. When the store is over capacity the
/// oldest *terminal* order is evicted; open orders are never dropped, since a
/// resting limit order that disappeared from the store would silently stop
/// being re-evaluated.
#[derive(Debug)]
pub struct OrderStore {
    orders: VecDeque<Order>,
    capacity: usize,
}

impl OrderStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            orders: VecDeque::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, order: Order) {
        self.orders.push_back(order);
        while self.orders.len() > self.capacity {
            let Some(victim) = self
                .orders
                .iter()
                .position(|o| o.status.is_terminal())
            else {
                // Every stored order is still open; keep them all.
                break;
            };
            self.orders.remove(victim);
        }
    }

    /// Removes and returns all orders still awaiting the market, for
    /// re-evaluation. The caller re-inserts them afterwards.
    pub fn take_open(&mut self) -> Vec<Order> {
        let mut open = Vec::new();
        let mut kept = VecDeque::with_capacity(self.orders.len());
        for order in self.orders.drain(..) {
            if order.status == OrderStatus::Submitted {
                open.push(order);
            } else {
                kept.push_back(order);
            }
        }
        self.orders = kept;
        open
    }

    /// Pages through the order history, newest first.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<OrderRecord> {
        self.orders
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .map(Into::into)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Submitted)
            .count()
    }
}
