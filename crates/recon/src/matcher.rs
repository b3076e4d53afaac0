//! Residual classification for one category of one event.
//!
//! Which branch runs depends on what the usage cell holds:
//!
//! - formula: every planned item is paired with the largest booked spend that
//!   does not exceed it by more than `formula_match`.
//! - positive number: the items whose planned amounts add up to
//!   `planned_total - used` are residual (exhaustive subset search).
//! - nothing: a single item equal to the remainder, or a human decision.
//!
//! The result is always checked against the remainder read from the sheet.

use log::{debug, info, warn};

use crate::config::ToleranceConfig;
use crate::disambiguator::{DiscrepancyQuestion, Disambiguator, SingleItemQuestion};
use crate::model::{
    format_cents, CategoryInput, CategoryOutcome, CategoryStatus, ItemResidual, LineItem,
    MatchStrategy, Usage, Verification, VerificationStatus,
};

pub fn reconcile_category(
    input: &CategoryInput,
    tolerance: &ToleranceConfig,
    disambiguator: &mut dyn Disambiguator,
) -> CategoryOutcome {
    let mut outcome = CategoryOutcome {
        event_number: input.event_number,
        category: input.category.clone(),
        strategy: MatchStrategy::NoRemainder,
        status: CategoryStatus::Excluded,
        items: input
            .items
            .iter()
            .map(|item| ItemResidual { item: item.clone(), residual_cents: 0 })
            .collect(),
        planned_total_cents: input.planned_total_cents,
        used_cents: input.used_cents,
        remainder_cents: input.remainder_cents,
        verification: None,
    };

    if input.remainder_cents <= 0 {
        debug!(
            "event {} category {}: no remainder ({}), excluded",
            input.event_number,
            input.category,
            format_cents(input.remainder_cents)
        );
        return outcome;
    }

    let (strategy, residuals) = match &input.usage {
        Usage::Formula { .. } => (
            MatchStrategy::FormulaUsage,
            match_formula_usage(&input.items, &input.usage.candidates(), tolerance.formula_match_cents()),
        ),
        Usage::Number { cents } if *cents > 0 => match_used_number(input, *cents, tolerance),
        _ => match_without_usage(input, tolerance, disambiguator),
    };

    outcome.strategy = strategy;
    outcome.status = CategoryStatus::Accepted;
    for (slot, residual) in outcome.items.iter_mut().zip(residuals) {
        slot.residual_cents = residual;
    }

    let verification = verify(&outcome, tolerance, disambiguator);
    if verification.status == VerificationStatus::Rejected {
        warn!(
            "event {} category {}: residuals {} do not match remainder {}, category aborted",
            input.event_number,
            input.category,
            format_cents(verification.residual_cents),
            format_cents(verification.remainder_cents)
        );
        outcome.status = CategoryStatus::Aborted;
    }
    outcome.verification = Some(verification);

    info!(
        "event {} category {}: {} -> {} residual of remainder {}",
        input.event_number,
        input.category,
        outcome.strategy,
        format_cents(outcome.residual_cents()),
        format_cents(input.remainder_cents)
    );
    outcome
}

// ---------------------------------------------------------------------------
// Formula usage
// ---------------------------------------------------------------------------

/// Residual per item, in item order. Each item is paired with the largest
/// candidate not above `planned + tolerance`; no candidate leaves it fully
/// residual. Every item searches the whole candidate set.
pub fn match_formula_usage(items: &[LineItem], candidates: &[i64], tolerance_cents: i64) -> Vec<i64> {
    items
        .iter()
        .map(|item| {
            let ceiling = item.planned_cents + tolerance_cents;
            let best = candidates.iter().copied().filter(|&c| c > 0 && c <= ceiling).max();
            match best {
                Some(used) => {
                    debug!("{} '{}': matched spend {}", item.address, item.name, format_cents(used));
                    (item.planned_cents - used).max(0)
                }
                None => {
                    debug!("{} '{}': no booked spend", item.address, item.name);
                    item.planned_cents.max(0)
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Usage as a number: subset sum
// ---------------------------------------------------------------------------

fn match_used_number(
    input: &CategoryInput,
    used_cents: i64,
    tolerance: &ToleranceConfig,
) -> (MatchStrategy, Vec<i64>) {
    let items = &input.items;
    if items.len() > tolerance.max_subset_items {
        warn!(
            "event {} category {}: {} items exceed the subset search limit of {}, treating all as residual",
            input.event_number,
            input.category,
            items.len(),
            tolerance.max_subset_items
        );
        return (MatchStrategy::AllResidual, items.iter().map(|i| i.planned_cents).collect());
    }

    let target = input.planned_total_cents - used_cents;
    let amounts: Vec<i64> = items.iter().map(|i| i.planned_cents).collect();
    match find_subset(&amounts, target, tolerance.subset_sum_cents()) {
        Some(subset) => {
            let residuals = amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| if subset.contains(&i) { a } else { 0 })
                .collect();
            (MatchStrategy::SubsetSum, residuals)
        }
        None => {
            warn!(
                "event {} category {}: no combination of {} items sums to {}, nothing marked residual",
                input.event_number,
                input.category,
                items.len(),
                format_cents(target)
            );
            (MatchStrategy::Unmatched, vec![0; items.len()])
        }
    }
}

/// First subset (by size, then lexicographic index order) whose sum is within
/// `tolerance_cents` of `target_cents`.
pub fn find_subset(amounts: &[i64], target_cents: i64, tolerance_cents: i64) -> Option<Vec<usize>> {
    let mut found = None;
    for size in 1..=amounts.len() {
        let stopped = for_each_combination(amounts.len(), size, |indices| {
            let sum: i64 = indices.iter().map(|&i| amounts[i]).sum();
            if (sum - target_cents).abs() <= tolerance_cents {
                found = Some(indices.to_vec());
                true
            } else {
                false
            }
        });
        if stopped {
            break;
        }
    }
    found
}

/// Visit `size`-element index combinations of `0..n` in lexicographic order.
/// Stops early when `visit` returns true; returns whether it stopped.
pub(crate) fn for_each_combination<F>(n: usize, size: usize, mut visit: F) -> bool
where
    F: FnMut(&[usize]) -> bool,
{
    if size == 0 || size > n {
        return false;
    }
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        if visit(&indices) {
            return true;
        }
        // rightmost index that can still move
        let Some(i) = (0..size).rev().find(|&i| indices[i] != i + n - size) else {
            return false;
        };
        indices[i] += 1;
        for j in i + 1..size {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

// ---------------------------------------------------------------------------
// No usage information
// ---------------------------------------------------------------------------

fn match_without_usage(
    input: &CategoryInput,
    tolerance: &ToleranceConfig,
    disambiguator: &mut dyn Disambiguator,
) -> (MatchStrategy, Vec<i64>) {
    let items = &input.items;
    let remainder = input.remainder_cents;
    let tol = tolerance.subset_sum_cents();

    if let Some(hit) = items.iter().position(|i| (i.planned_cents - remainder).abs() <= tol) {
        let residuals = items
            .iter()
            .enumerate()
            .map(|(i, item)| if i == hit { item.planned_cents } else { 0 })
            .collect();
        return (MatchStrategy::SingleItem, residuals);
    }

    match items.as_slice() {
        [] => {
            warn!(
                "event {} category {}: remainder {} but no planned items",
                input.event_number,
                input.category,
                format_cents(remainder)
            );
            (MatchStrategy::Unmatched, Vec::new())
        }
        [item] => {
            let question = SingleItemQuestion {
                event_number: input.event_number,
                category: input.category.clone(),
                item: item.clone(),
                remainder_cents: remainder,
            };
            if disambiguator.confirm_single_item(&question) {
                (MatchStrategy::Confirmed, vec![remainder])
            } else {
                info!(
                    "event {} category {}: remainder {} not attributed to '{}'",
                    input.event_number,
                    input.category,
                    format_cents(remainder),
                    item.name
                );
                (MatchStrategy::Unmatched, vec![0])
            }
        }
        _ => {
            warn!(
                "event {} category {}: no single item equals remainder {}, treating all {} items as residual",
                input.event_number,
                input.category,
                format_cents(remainder),
                items.len()
            );
            (MatchStrategy::AllResidual, items.iter().map(|i| i.planned_cents).collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

fn verify(
    outcome: &CategoryOutcome,
    tolerance: &ToleranceConfig,
    disambiguator: &mut dyn Disambiguator,
) -> Verification {
    let residual_cents = outcome.residual_cents();
    let remainder_cents = outcome.remainder_cents;
    let delta_cents = (residual_cents - remainder_cents).abs();

    let status = if delta_cents <= tolerance.verify_cents() {
        VerificationStatus::Exact
    } else if delta_cents <= tolerance.confirm_threshold_cents() {
        warn!(
            "event {} category {}: residuals {} differ from remainder {} by {}",
            outcome.event_number,
            outcome.category,
            format_cents(residual_cents),
            format_cents(remainder_cents),
            format_cents(delta_cents)
        );
        VerificationStatus::Discrepancy
    } else {
        let question = DiscrepancyQuestion {
            event_number: outcome.event_number,
            category: outcome.category.clone(),
            residual_cents,
            remainder_cents,
            delta_cents,
        };
        if disambiguator.accept_discrepancy(&question) {
            warn!(
                "event {} category {}: discrepancy of {} accepted",
                outcome.event_number,
                outcome.category,
                format_cents(delta_cents)
            );
            VerificationStatus::ConfirmedMismatch
        } else {
            VerificationStatus::Rejected
        }
    };

    Verification { residual_cents, remainder_cents, delta_cents, status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, ResidualSelection};
    use proptest::prelude::*;
    use zalyshok_engine::CellAddress;

    /// Scripted answers; records what was asked.
    #[derive(Default)]
    struct Scripted {
        confirm: bool,
        accept: bool,
        single_items: Vec<SingleItemQuestion>,
        discrepancies: Vec<DiscrepancyQuestion>,
    }

    impl Disambiguator for Scripted {
        fn select_categories(&mut self, event: &Event, _: &[CategoryOutcome]) -> ResidualSelection {
            ResidualSelection::skip(event.number)
        }

        fn confirm_single_item(&mut self, question: &SingleItemQuestion) -> bool {
            self.single_items.push(question.clone());
            self.confirm
        }

        fn accept_discrepancy(&mut self, question: &DiscrepancyQuestion) -> bool {
            self.discrepancies.push(question.clone());
            self.accept
        }
    }

    fn item(row: usize, name: &str, planned_cents: i64) -> LineItem {
        LineItem {
            address: CellAddress::new(row, 10),
            name: name.into(),
            category: "2210".into(),
            planned_cents,
        }
    }

    fn input(items: Vec<LineItem>, usage: Usage, remainder_cents: i64) -> CategoryInput {
        let planned_total_cents: i64 = items.iter().map(|i| i.planned_cents).sum();
        let used_cents = match &usage {
            Usage::Formula { referenced_cents, literal_cents } => {
                referenced_cents.iter().chain(literal_cents).sum::<i64>()
            }
            Usage::Number { cents } => *cents,
            Usage::Missing => 0,
        };
        CategoryInput {
            event_number: 1,
            category: "2210".into(),
            items,
            planned_total_cents,
            usage,
            used_cents,
            remainder_cents,
        }
    }

    fn residuals(outcome: &CategoryOutcome) -> Vec<i64> {
        outcome.items.iter().map(|i| i.residual_cents).collect()
    }

    #[test]
    fn no_remainder_is_excluded() {
        let mut d = Scripted::default();
        let out = reconcile_category(
            &input(vec![item(4, "a", 1_000)], Usage::Missing, 0),
            &ToleranceConfig::default(),
            &mut d,
        );
        assert_eq!(out.status, CategoryStatus::Excluded);
        assert_eq!(out.strategy, MatchStrategy::NoRemainder);
        assert!(out.verification.is_none());
        assert!(d.single_items.is_empty());
    }

    #[test]
    fn formula_usage_takes_closest_spend_below_ceiling() {
        let items = vec![item(4, "Футболки", 200_000), item(5, "Кепки", 50_000)];
        // 2050.00 fits under 2000.00 + 100.00, 480.00 goes to the caps
        let usage = Usage::Formula { referenced_cents: vec![48_000, 205_000], literal_cents: vec![] };
        let mut d = Scripted::default();
        let out = reconcile_category(&input(items, usage, 2_000), &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::FormulaUsage);
        assert_eq!(residuals(&out), vec![0, 2_000]);
        assert_eq!(out.status, CategoryStatus::Accepted);
        assert_eq!(out.verification.as_ref().map(|v| v.status), Some(VerificationStatus::Exact));
    }

    #[test]
    fn formula_spend_matches_every_item() {
        // one booked 900.00 spend pairs with both 1000.00 lines
        let items = vec![item(4, "a", 100_000), item(5, "b", 100_000)];
        let residual = match_formula_usage(&items, &[90_000], 10_000);
        assert_eq!(residual, vec![10_000, 10_000]);
    }

    #[test]
    fn formula_literals_are_candidates() {
        let items = vec![item(4, "a", 150_000)];
        let usage = Usage::Formula { referenced_cents: vec![], literal_cents: vec![120_000] };
        assert_eq!(match_formula_usage(&items, &usage.candidates(), 10_000), vec![30_000]);
    }

    #[test]
    fn used_number_finds_residual_subset() {
        // planned total 4000.00, used 1987.88: the 2012.12 line is left over
        let mut data = input(
            vec![item(4, "Футболки", 200_000), item(5, "Кепки", 201_212)],
            Usage::Number { cents: 198_788 },
            198_788,
        );
        data.planned_total_cents = 400_000;
        data.used_cents = 198_788;
        let mut d = Scripted { accept: true, ..Default::default() };
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::SubsetSum);
        assert_eq!(residuals(&out), vec![0, 201_212]);
        // 2012.12 vs remainder 1987.88 is well past the confirmation threshold
        assert_eq!(d.discrepancies.len(), 1);
        assert_eq!(d.discrepancies[0].delta_cents, 2_424);
        assert_eq!(out.status, CategoryStatus::Accepted);
    }

    #[test]
    fn used_number_without_subset_marks_nothing() {
        let data = input(
            vec![item(4, "a", 100_000), item(5, "b", 70_000)],
            Usage::Number { cents: 50_000 },
            120_000,
        );
        let mut d = Scripted::default();
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::Unmatched);
        assert_eq!(residuals(&out), vec![0, 0]);
        // nothing marked, the remainder is unaccounted: refused -> aborted
        assert_eq!(out.status, CategoryStatus::Aborted);
        assert_eq!(
            out.verification.map(|v| v.status),
            Some(VerificationStatus::Rejected)
        );
    }

    #[test]
    fn used_number_above_item_limit_marks_everything() {
        let items: Vec<_> = (0..5).map(|r| item(r, "x", 1_000)).collect();
        let data = input(items, Usage::Number { cents: 1_000 }, 4_000);
        let tolerance = ToleranceConfig { max_subset_items: 4, ..Default::default() };
        let mut d = Scripted { accept: true, ..Default::default() };
        let out = reconcile_category(&data, &tolerance, &mut d);
        assert_eq!(out.strategy, MatchStrategy::AllResidual);
        assert_eq!(out.residual_cents(), 5_000);
        assert_eq!(out.verification.map(|v| v.delta_cents), Some(1_000));
    }

    #[test]
    fn missing_usage_single_item_equal_to_remainder() {
        let data = input(
            vec![item(4, "a", 50_000), item(5, "b", 30_005)],
            Usage::Missing,
            30_000,
        );
        let mut d = Scripted::default();
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::SingleItem);
        assert_eq!(residuals(&out), vec![0, 30_005]);
        assert_eq!(out.verification.map(|v| v.status), Some(VerificationStatus::Discrepancy));
        assert!(d.single_items.is_empty());
    }

    #[test]
    fn lone_item_with_different_amount_asks_first() {
        let data = input(vec![item(4, "Медалі", 150_000)], Usage::Missing, 98_000);
        let mut d = Scripted { confirm: true, ..Default::default() };
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(d.single_items.len(), 1);
        assert_eq!(d.single_items[0].item.name, "Медалі");
        assert_eq!(out.strategy, MatchStrategy::Confirmed);
        assert_eq!(residuals(&out), vec![98_000]);
        assert_eq!(out.verification.map(|v| v.status), Some(VerificationStatus::Exact));

        let mut d = Scripted { confirm: false, accept: false, ..Default::default() };
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::Unmatched);
        assert_eq!(out.residual_cents(), 0);
        assert_eq!(out.status, CategoryStatus::Aborted);
    }

    #[test]
    fn non_positive_usage_number_counts_as_missing() {
        let data = input(
            vec![item(4, "a", 10_000), item(5, "b", 20_000)],
            Usage::Number { cents: 0 },
            25_000,
        );
        let mut d = Scripted { accept: true, ..Default::default() };
        let out = reconcile_category(&data, &ToleranceConfig::default(), &mut d);
        assert_eq!(out.strategy, MatchStrategy::AllResidual);
        assert_eq!(residuals(&out), vec![10_000, 20_000]);
        assert_eq!(out.verification.map(|v| v.status), Some(VerificationStatus::ConfirmedMismatch));
    }

    #[test]
    fn subset_search_prefers_small_then_lexicographic() {
        assert_eq!(find_subset(&[300, 100, 200], 300, 0), Some(vec![0]));
        assert_eq!(find_subset(&[100, 200, 50, 250], 300, 0), Some(vec![0, 1]));
        assert_eq!(find_subset(&[100, 200], 305, 5), Some(vec![0, 1]));
        assert_eq!(find_subset(&[100, 200], 1_000, 10), None);
        assert_eq!(find_subset(&[], 0, 10), None);
    }

    proptest! {
        #[test]
        fn formula_residual_never_exceeds_planned(
            planned in proptest::collection::vec(0i64..1_000_000, 1..8),
            spends in proptest::collection::vec(-10_000i64..1_000_000, 0..8),
            tol in 0i64..20_000,
        ) {
            let items: Vec<_> = planned.iter().enumerate().map(|(r, &p)| item(r, "x", p)).collect();
            let residual = match_formula_usage(&items, &spends, tol);
            prop_assert_eq!(residual.len(), items.len());
            for (r, p) in residual.iter().zip(&planned) {
                prop_assert!(*r >= 0 && r <= p);
                let best = spends.iter().copied().filter(|&c| c > 0 && c <= p + tol).max();
                let expected = best.map_or(*p, |c| (p - c).max(0));
                prop_assert_eq!(*r, expected);
            }
        }

        #[test]
        fn subset_is_within_tolerance_and_deterministic(
            amounts in proptest::collection::vec(1i64..100_000, 0..9),
            target in 0i64..400_000,
            tol in 0i64..50,
        ) {
            let first = find_subset(&amounts, target, tol);
            if let Some(subset) = &first {
                let sum: i64 = subset.iter().map(|&i| amounts[i]).sum();
                prop_assert!((sum - target).abs() <= tol);
                prop_assert!(subset.windows(2).all(|w| w[0] < w[1]));
            }
            prop_assert_eq!(first, find_subset(&amounts, target, tol));
        }
    }
}
