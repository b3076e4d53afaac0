use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use zalyshok_engine::{CellAddress, Column};

use crate::error::ReconError;

/// Subsets are enumerated exhaustively; past this many items it is not attempted.
pub const MAX_SUBSET_ITEMS_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the engine needs to know about the workbooks and the matching
/// policy. Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub calculation: CalculationLayout,
    pub categories: Vec<CategoryConfig>,
    pub estimate: EstimateLayout,
    pub tolerance: ToleranceConfig,
    pub auto: AutoPolicy,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            calculation: CalculationLayout::default(),
            categories: default_categories(),
            estimate: EstimateLayout::default(),
            tolerance: ToleranceConfig::default(),
            auto: AutoPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Calculation workbook
// ---------------------------------------------------------------------------

/// Fixed column contract of the calculation sheet. Per-category columns live
/// on [`CategoryConfig`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculationLayout {
    /// Sheet name; the first sheet when absent.
    pub sheet: Option<String>,
    pub number_col: Column,
    pub name_col: Column,
    pub term_col: Column,
    /// Name of a line item, on the row its planned amount is referenced from.
    pub item_name_col: Column,
}

impl Default for CalculationLayout {
    fn default() -> Self {
        Self {
            sheet: None,
            number_col: Column::new(0), // A
            name_col: Column::new(1),   // B
            term_col: Column::new(2),   // C
            item_name_col: Column::new(7), // H
        }
    }
}

// ---------------------------------------------------------------------------
// Categories (KEKV codes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    pub code: String,
    /// Short label for reports and output headers.
    pub label: String,
    /// Item name of the synthetic leftover row.
    pub leftover_name: String,
    /// Planned total formula, on the event's first row.
    pub planned_col: Column,
    /// Usage aggregate (formula or literal), on the event's first row.
    pub usage_col: Column,
    /// Authoritative remaining amount, on the event's first row.
    pub remainder_col: Column,
}

fn default_categories() -> Vec<CategoryConfig> {
    let category = |code: &str, planned: usize, usage: usize, remainder: usize| CategoryConfig {
        code: code.to_string(),
        label: format!("KEKV {code}"),
        leftover_name: format!("Залишок коштів за КЕКВ {code}"),
        planned_col: Column::new(planned),
        usage_col: Column::new(usage),
        remainder_col: Column::new(remainder),
    };
    vec![
        // apparel / branding: L, P, T
        category("2210", 11, 15, 19),
        // transport: M, Q, U
        category("2240", 12, 16, 20),
        // per-diem: N, R, V
        category("2250", 13, 17, 21),
    ]
}

// ---------------------------------------------------------------------------
// Estimate workbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimateLayout {
    pub sheet: Option<String>,
    /// Cell holding the event name.
    pub name_cell: CellAddress,
    /// First item row, 1-based as shown in a spreadsheet.
    pub first_item_row: usize,
    pub code_col: Column,
    pub name_col: Column,
    pub amount_col: Column,
    /// Case-insensitive phrase in the name column that ends the item list.
    pub total_marker: String,
    /// Case-insensitive phrase marking a non-item row to skip.
    pub award_marker: String,
}

impl Default for EstimateLayout {
    fn default() -> Self {
        Self {
            sheet: None,
            name_cell: CellAddress::new(11, 3), // D12
            first_item_row: 17,
            code_col: Column::new(6),    // G
            name_col: Column::new(7),    // H
            amount_col: Column::new(10), // K
            total_marker: "разом".to_string(),
            award_marker: "нагородна атрибутика".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerances
// ---------------------------------------------------------------------------

/// Matching thresholds, in currency units. The defaults are business-tuned
/// values carried over unchanged; they are configuration, not constants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToleranceConfig {
    /// How far a booked spend may exceed a planned line and still be matched to it.
    pub formula_match: f64,
    /// Subset sums and single-item matches.
    pub subset_sum: f64,
    /// Residual total vs remainder: above this a discrepancy is logged.
    pub verify: f64,
    /// Residual total vs remainder: above this a human decides.
    pub confirm_threshold: f64,
    /// Exhaustive subset search is skipped above this many items.
    pub max_subset_items: usize,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            formula_match: 100.0,
            subset_sum: 0.1,
            verify: 0.01,
            confirm_threshold: 1.0,
            max_subset_items: 12,
        }
    }
}

impl ToleranceConfig {
    pub fn formula_match_cents(&self) -> i64 {
        units_to_cents(self.formula_match)
    }

    pub fn subset_sum_cents(&self) -> i64 {
        units_to_cents(self.subset_sum)
    }

    pub fn verify_cents(&self) -> i64 {
        units_to_cents(self.verify)
    }

    pub fn confirm_threshold_cents(&self) -> i64 {
        units_to_cents(self.confirm_threshold)
    }
}

fn units_to_cents(units: f64) -> i64 {
    (units * 100.0).round() as i64
}

// ---------------------------------------------------------------------------
// Batch policy
// ---------------------------------------------------------------------------

/// Answers given by the non-interactive disambiguator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoPolicy {
    /// Attribute an unmatched remainder to a category's only item.
    pub confirm_single_item: bool,
    /// Keep a category whose residual total misses the remainder by more than
    /// the confirmation threshold.
    pub accept_discrepancy: bool,
}

impl Default for AutoPolicy {
    fn default() -> Self {
        Self {
            confirm_single_item: true,
            accept_discrepancy: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.categories.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one category is required".into(),
            ));
        }

        let mut codes = HashSet::new();
        for category in &self.categories {
            if category.code.trim().is_empty() {
                return Err(ReconError::ConfigValidation("category code must not be empty".into()));
            }
            if !codes.insert(category.code.trim()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate category code '{}'",
                    category.code
                )));
            }
        }

        let t = &self.tolerance;
        for (name, value) in [
            ("formula_match", t.formula_match),
            ("subset_sum", t.subset_sum),
            ("verify", t.verify),
            ("confirm_threshold", t.confirm_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "tolerance.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if t.max_subset_items > MAX_SUBSET_ITEMS_LIMIT {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance.max_subset_items must be at most {MAX_SUBSET_ITEMS_LIMIT}, got {}",
                t.max_subset_items
            )));
        }

        if self.estimate.first_item_row == 0 {
            return Err(ReconError::ConfigValidation(
                "estimate.first_item_row is 1-based and must be at least 1".into(),
            ));
        }
        if self.estimate.total_marker.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "estimate.total_marker must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn category(&self, code: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.code == code)
    }

    pub fn category_codes(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.code.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
