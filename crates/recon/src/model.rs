use serde::Serialize;
use zalyshok_engine::CellAddress;

use crate::aggregate::BalanceReport;

// ---------------------------------------------------------------------------
// Calculation sheet
// ---------------------------------------------------------------------------

/// An event (zahid): one block of rows in the calculation sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub number: i64,
    pub name: String,
    pub term: String,
    /// First row of the block (0-based).
    pub start_row: usize,
    /// Last row of the block (0-based, inclusive).
    pub end_row: usize,
}

impl Event {
    pub fn row_span(&self) -> usize {
        self.end_row - self.start_row + 1
    }
}

/// One planned expenditure row, addressed through a planned-total formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    /// The referenced cell holding the planned amount.
    pub address: CellAddress,
    pub name: String,
    pub category: String,
    pub planned_cents: i64,
}

impl LineItem {
    /// 1-based row as shown in a spreadsheet.
    pub fn source_row(&self) -> usize {
        self.address.row_number()
    }
}

/// What the usage-aggregate cell of a category says.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Usage {
    /// A formula: resolved values of its references plus its bare literals.
    Formula {
        referenced_cents: Vec<i64>,
        literal_cents: Vec<i64>,
    },
    /// A plain number.
    Number { cents: i64 },
    /// Empty cell.
    Missing,
}

impl Usage {
    /// Candidate spends for the formula branch, references first.
    pub fn candidates(&self) -> Vec<i64> {
        match self {
            Usage::Formula { referenced_cents, literal_cents } => referenced_cents
                .iter()
                .chain(literal_cents.iter())
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Input of the residual matcher for one (event, category).
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub event_number: i64,
    pub category: String,
    pub items: Vec<LineItem>,
    /// Resolved value of the planned-total cell.
    pub planned_total_cents: i64,
    pub usage: Usage,
    /// Resolved value of the usage cell.
    pub used_cents: i64,
    /// Zalushok: authoritative remaining amount as read from the sheet.
    pub remainder_cents: i64,
}

// ---------------------------------------------------------------------------
// Matching results
// ---------------------------------------------------------------------------

/// Which branch of the decision procedure classified a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Remainder is zero or negative.
    NoRemainder,
    /// Usage formula: closest booked spend per item.
    FormulaUsage,
    /// Usage number: subset of items summing to planned minus used.
    SubsetSum,
    /// No usage data: one item equals the remainder.
    SingleItem,
    /// No usage data: the only item, attributed by a human.
    Confirmed,
    /// Nothing unique found: every item treated as residual.
    AllResidual,
    /// Nothing found and nothing marked.
    Unmatched,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRemainder => write!(f, "no_remainder"),
            Self::FormulaUsage => write!(f, "formula_usage"),
            Self::SubsetSum => write!(f, "subset_sum"),
            Self::SingleItem => write!(f, "single_item"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::AllResidual => write!(f, "all_residual"),
            Self::Unmatched => write!(f, "unmatched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Residuals may be withdrawn.
    Accepted,
    /// Nothing to withdraw (no remainder).
    Excluded,
    /// A large discrepancy was refused.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Within the verification tolerance.
    Exact,
    /// Off by more than the verification tolerance, below the confirmation threshold.
    Discrepancy,
    /// Off by more than the confirmation threshold, accepted by a human.
    ConfirmedMismatch,
    /// Off by more than the confirmation threshold, refused.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub residual_cents: i64,
    pub remainder_cents: i64,
    /// Absolute difference.
    pub delta_cents: i64,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResidual {
    pub item: LineItem,
    /// Unspent part of the item; 0 when fully used.
    pub residual_cents: i64,
}

/// Per event, per category totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub category: String,
    pub planned_cents: i64,
    pub used_cents: i64,
    pub residual_cents: i64,
    pub remainder_cents: i64,
}

/// Classification of one category of one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOutcome {
    pub event_number: i64,
    pub category: String,
    pub strategy: MatchStrategy,
    pub status: CategoryStatus,
    /// Every planned item, in row order.
    pub items: Vec<ItemResidual>,
    pub planned_total_cents: i64,
    pub used_cents: i64,
    pub remainder_cents: i64,
    pub verification: Option<Verification>,
}

impl CategoryOutcome {
    pub fn residual_items(&self) -> impl Iterator<Item = &ItemResidual> {
        self.items.iter().filter(|i| i.residual_cents > 0)
    }

    pub fn residual_cents(&self) -> i64 {
        self.residual_items().map(|i| i.residual_cents).sum()
    }

    /// Accepted with something to withdraw.
    pub fn is_withdrawable(&self) -> bool {
        self.status == CategoryStatus::Accepted && self.residual_cents() > 0
    }

    pub fn totals(&self) -> CategoryTotals {
        CategoryTotals {
            category: self.category.clone(),
            planned_cents: self.planned_total_cents,
            used_cents: self.used_cents,
            residual_cents: self.residual_cents(),
            remainder_cents: self.remainder_cents,
        }
    }
}

/// The categories an operator chose to withdraw from, for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidualSelection {
    pub event_number: i64,
    /// Empty means the event is skipped.
    pub categories: Vec<String>,
}

impl ResidualSelection {
    pub fn skip(event_number: i64) -> Self {
        Self { event_number, categories: Vec::new() }
    }

    pub fn includes(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventReconciliation {
    pub event: Event,
    pub outcomes: Vec<CategoryOutcome>,
    pub selection: ResidualSelection,
}

impl EventReconciliation {
    /// Outcomes that are both selected and withdrawable, in category order.
    pub fn selected(&self) -> impl Iterator<Item = &CategoryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.is_withdrawable() && self.selection.includes(&o.category))
    }

    pub fn withdrawn_cents(&self, category: &str) -> i64 {
        self.selected()
            .filter(|o| o.category == category)
            .map(CategoryOutcome::residual_cents)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEvent {
    pub number: i64,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Estimate workbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateItem {
    /// 1-based row.
    pub row: usize,
    pub category: String,
    pub name: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateNeed {
    pub category: String,
    pub needed_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub event_name: String,
    pub items: Vec<EstimateItem>,
    /// One entry per configured category, in configuration order.
    pub needs: Vec<EstimateNeed>,
}

impl Estimate {
    pub fn needed_cents(&self, category: &str) -> i64 {
        self.needs
            .iter()
            .find(|n| n.category == category)
            .map_or(0, |n| n.needed_cents)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Item,
    /// Synthetic row for an unclaimed category balance; highlighted.
    Leftover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub name: String,
    pub category: String,
    /// Negative for withdrawals, positive for allocations and leftovers.
    pub amount_cents: i64,
    pub kind: RowKind,
}

/// One event block of the changes workbook: a header row followed by its rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputBlock {
    pub number: Option<i64>,
    pub name: String,
    pub term: String,
    /// Signed totals, one per configured category, in configuration order.
    pub category_totals: Vec<i64>,
    pub total_cents: i64,
    pub rows: Vec<OutputRow>,
}

impl OutputBlock {
    /// Rows occupied in the sheet: the header row plus one per item.
    pub fn height(&self) -> usize {
        1 + self.rows.len()
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub calculation_sheet: String,
    pub estimate_sheet: String,
}

/// Everything a run decided, in the order it was decided.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub estimate: Estimate,
    /// The calculation-sheet event matching the estimate's name, if any.
    pub target: Option<Event>,
    pub events: Vec<EventReconciliation>,
    pub skipped: Vec<SkippedEvent>,
    pub balance: BalanceReport,
    /// Event blocks first, the estimate target last.
    pub blocks: Vec<OutputBlock>,
}

/// Format cents as `1 987.88` for reports and prompts.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let units = (abs / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02}", abs % 100)
}
