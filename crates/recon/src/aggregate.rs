use std::fmt;

use serde::Serialize;

use crate::config::CategoryConfig;
use crate::model::{format_cents, Estimate, EventReconciliation};

/// Withdrawn vs needed for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBalance {
    pub category: String,
    pub label: String,
    pub withdrawn_cents: i64,
    pub needed_cents: i64,
    /// `max(0, withdrawn - needed)`.
    pub leftover_cents: i64,
}

impl CategoryBalance {
    /// Signed: positive is a surplus, negative a deficit.
    pub fn balance_cents(&self) -> i64 {
        self.withdrawn_cents - self.needed_cents
    }
}

/// Per-category and overall surplus/deficit of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
    pub target: String,
    pub categories: Vec<CategoryBalance>,
}

impl BalanceReport {
    pub fn withdrawn_cents(&self) -> i64 {
        self.categories.iter().map(|c| c.withdrawn_cents).sum()
    }

    pub fn needed_cents(&self) -> i64 {
        self.categories.iter().map(|c| c.needed_cents).sum()
    }

    pub fn balance_cents(&self) -> i64 {
        self.withdrawn_cents() - self.needed_cents()
    }

    pub fn leftover_cents(&self, category: &str) -> i64 {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map_or(0, |c| c.leftover_cents)
    }
}

/// Floored at zero: a deficit leaves nothing over.
pub fn leftover(withdrawn_cents: i64, needed_cents: i64) -> i64 {
    (withdrawn_cents - needed_cents).max(0)
}

/// Withdrawn residuals per category across all selected events, set against
/// the estimate's needs.
pub fn balance(
    reconciliations: &[EventReconciliation],
    estimate: &Estimate,
    categories: &[CategoryConfig],
) -> BalanceReport {
    let categories = categories
        .iter()
        .map(|c| {
            let withdrawn_cents = reconciliations.iter().map(|r| r.withdrawn_cents(&c.code)).sum();
            let needed_cents = estimate.needed_cents(&c.code);
            CategoryBalance {
                category: c.code.clone(),
                label: c.label.clone(),
                withdrawn_cents,
                needed_cents,
                leftover_cents: leftover(withdrawn_cents, needed_cents),
            }
        })
        .collect();

    BalanceReport { target: estimate.event_name.clone(), categories }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Balance for '{}'", self.target)?;
        for c in &self.categories {
            let balance = c.balance_cents();
            let verdict = match balance {
                b if b > 0 => "surplus",
                b if b < 0 => "deficit",
                _ => "balanced",
            };
            writeln!(
                f,
                "  {:<12} withdrawn {:>14}  needed {:>14}  {} {}",
                c.label,
                format_cents(c.withdrawn_cents),
                format_cents(c.needed_cents),
                verdict,
                format_cents(balance.abs())
            )?;
        }
        let total = self.balance_cents();
        write!(
            f,
            "  {:<12} withdrawn {:>14}  needed {:>14}  {} {}",
            "total",
            format_cents(self.withdrawn_cents()),
            format_cents(self.needed_cents()),
            if total >= 0 { "surplus" } else { "deficit" },
            format_cents(total.abs())
        )
    }
}
