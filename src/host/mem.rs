//! Scoped memory accounting for host-owned allocations.
//!
//! The host hands out memory in coarse units charged against a shared
//! [`MemoryBudget`]. Every allocation is represented by a [`MemoryGrant`]
//! receipt that returns its units when dropped, so an object owning a grant
//! (a device context, an input device) frees its memory exactly when it is
//! destroyed. A budget reading zero means nothing leaked.
//!
//! Budgets are cheap handles; cloning one shares the underlying accounting.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DriverError;

/// Units charged for one device context.
pub const CONTEXT_UNITS: usize = 1;
/// Units charged for one virtual input device.
pub const DEVICE_UNITS: usize = 1;

#[derive(Debug)]
struct BudgetState {
    limit: Option<usize>,
    in_use: usize,
}

/// Shared allocation budget.
#[derive(Clone, Debug)]
pub struct MemoryBudget {
    inner: Arc<Mutex<BudgetState>>,
}

impl MemoryBudget {
    /// Budget with no limit; charges never fail.
    pub fn unlimited() -> Self {
        Self::with_limit(None)
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BudgetState { limit, in_use: 0 })),
        }
    }

    /// Changes the limit. Units already charged stay charged even if they now
    /// exceed the limit; only new charges are checked.
    pub fn set_limit(&self, limit: Option<usize>) {
        self.inner.lock().limit = limit;
    }

    /// Units currently charged.
    pub fn in_use(&self) -> usize {
        self.inner.lock().in_use
    }

    /// Charges `units`, failing with [`DriverError::OutOfMemory`] when the
    /// limit cannot cover them.
    pub fn charge(&self, units: usize) -> Result<MemoryGrant, DriverError> {
        let mut state = self.inner.lock();
        if let Some(limit) = state.limit {
            if state.in_use + units > limit {
                return Err(DriverError::OutOfMemory);
            }
        }
        state.in_use += units;
        Ok(MemoryGrant {
            inner: Arc::clone(&self.inner),
            units,
        })
    }
}

/// Receipt for charged units; dropping it returns them to the budget.
#[derive(Debug)]
pub struct MemoryGrant {
    inner: Arc<Mutex<BudgetState>>,
    units: usize,
}

impl MemoryGrant {
    pub fn units(&self) -> usize {
        self.units
    }
}

impl Drop for MemoryGrant {
    fn drop(&mut self) {
        self.inner.lock().in_use -= self.units;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_are_returned_on_drop() {
        let budget = MemoryBudget::unlimited();
        let grant = budget.charge(3).unwrap();
        assert_eq!(budget.in_use(), 3);
        drop(grant);
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn limit_is_enforced() {
        let budget = MemoryBudget::with_limit(Some(2));
        let _a = budget.charge(1).unwrap();
        let _b = budget.charge(1).unwrap();
        assert!(matches!(budget.charge(1), Err(DriverError::OutOfMemory)));
        assert_eq!(budget.in_use(), 2);
    }

    #[test]
    fn lowering_the_limit_only_affects_new_charges() {
        let budget = MemoryBudget::unlimited();
        let _grant = budget.charge(2).unwrap();
        budget.set_limit(Some(1));
        assert!(matches!(budget.charge(1), Err(DriverError::OutOfMemory)));
        assert_eq!(budget.in_use(), 2);
    }
}
