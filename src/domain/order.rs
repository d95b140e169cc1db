//! Exchange order entity.
//! Matching and settlement run in remote stored procedures; only the
//! lifecycle rules live here.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (OrderStatus::PartiallyFilled, OrderStatus::Open) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub side: OrderSide,
    pub currency: String,
    pub amount: BigDecimal,
    pub filled: BigDecimal,
    pub price: BigDecimal,
    pub status: OrderStatus,
}

impl Order {
    /// Status implied by the filled quantity. Cancelled orders stay cancelled.
    pub fn status_for_fill(&self) -> OrderStatus {
        if self.status == OrderStatus::Cancelled {
            return OrderStatus::Cancelled;
        }
        let zero = BigDecimal::from(0);
        if self.filled >= self.amount {
            OrderStatus::Filled
        } else if self.filled > zero {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        }
    }

    pub fn remaining(&self) -> BigDecimal {
        let remaining = &self.amount - &self.filled;
        if remaining < BigDecimal::from(0) {
            BigDecimal::from(0)
        } else {
            remaining
        }
    }
}
