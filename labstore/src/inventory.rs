use thiserror::Error;

use crate::{BorrowRequest, Component};

/// A stock movement that would leave a component outside `0..=total`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("component {component} has {available} available, {requested} requested")]
    Insufficient {
        component: String,
        available: u32,
        requested: u64,
    },
    #[error("component {component} would exceed its total of {total}")]
    ExceedsTotal { component: String, total: u32 },
    #[error("component {component} has {available} available out of {total}")]
    Inconsistent {
        component: String,
        available: u32,
        total: u32,
    },
}

impl Component {
    /// Checks `available_quantity <= total_quantity`.
    pub fn check_stock(&self) -> Result<(), StockError> {
        if self.available_quantity > self.total_quantity {
            return Err(StockError::Inconsistent {
                component: self.id.clone(),
                available: self.available_quantity,
                total: self.total_quantity,
            });
        }
        Ok(())
    }

    /// Returns this component with `delta` added to its available quantity.
    ///
    /// Negative deltas take stock out, positive ones return it.
    pub fn apply_stock_delta(mut self, delta: i64) -> Result<Self, StockError> {
        self.check_stock()?;
        let available = i64::from(self.available_quantity) + delta;
        if available < 0 {
            return Err(StockError::Insufficient {
                component: self.id,
                available: self.available_quantity,
                requested: delta.unsigned_abs(),
            });
        }
        if available > i64::from(self.total_quantity) {
            return Err(StockError::ExceedsTotal {
                component: self.id,
                total: self.total_quantity,
            });
        }
        // Bounded by total_quantity above.
        self.available_quantity = available as u32;
        Ok(self)
    }
}

/// Change in available stock caused by a request moving from `previous` to `next`.
///
/// Only approved requests hold stock, so approving takes `quantity` out and
/// leaving the approved state (returning, or rejecting after approval) puts
/// it back.
pub fn stock_delta(previous: Option<&BorrowRequest>, next: &BorrowRequest) -> i64 {
    let held = |request: &BorrowRequest| {
        if request.status.holds_stock() {
            i64::from(request.quantity)
        } else {
            0
        }
    };
    previous.map_or(0, held) - held(next)
}
