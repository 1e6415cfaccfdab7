//! crates/school_core/src/finance.rs
//!
//! Validation and totals for payments and expenses. Amounts are integers in the
//! smallest currency unit.

use crate::domain::{Expense, Payment};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FinanceError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("label must not be empty")]
    EmptyLabel,
}

pub fn validate_entry(amount: i64, label: &str) -> Result<(), FinanceError> {
    if amount <= 0 {
        return Err(FinanceError::NonPositiveAmount(amount));
    }
    if label.trim().is_empty() {
        return Err(FinanceError::EmptyLabel);
    }
    Ok(())
}

/// Money in and out of one school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YearBalance {
    pub paid: i64,
    pub spent: i64,
}

impl YearBalance {
    pub fn compute(payments: &[Payment], expenses: &[Expense]) -> Self {
        Self {
            paid: payments.iter().map(|p| p.amount).sum(),
            spent: expenses.iter().map(|e| e.amount).sum(),
        }
    }

    /// May be negative.
    pub fn net(&self) -> i64 {
        self.paid - self.spent
    }
}
