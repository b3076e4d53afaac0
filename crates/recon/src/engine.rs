use log::{info, warn};
use zalyshok_engine::{Resolver, Sheet};

use crate::aggregate::{balance, BalanceReport};
use crate::config::ReconConfig;
use crate::disambiguator::Disambiguator;
use crate::error::ReconError;
use crate::estimate::read_estimate;
use crate::locator::{find_by_name, find_by_number, list_events, NameMatch};
use crate::mapper::category_input;
use crate::matcher::reconcile_category;
use crate::model::{
    CategoryOutcome, Estimate, Event, EventReconciliation, OutputBlock, OutputRow,
    ResidualSelection, RowKind, RunMeta, RunReport, SkippedEvent,
};

/// Reconcile the requested events of the calculation sheet against the
/// estimate. Inputs are read-only; decisions go through `disambiguator`.
pub fn run(
    config: &ReconConfig,
    calculation: &Sheet,
    estimate_sheet: &Sheet,
    event_numbers: &[i64],
    disambiguator: &mut dyn Disambiguator,
) -> Result<RunReport, ReconError> {
    config.validate()?;

    let estimate = read_estimate(estimate_sheet, &config.estimate, &config.categories)?;
    let events = list_events(calculation, &config.calculation);
    let target = locate_target(&events, &estimate.event_name);

    let mut resolver = Resolver::new(calculation);
    let mut reconciliations = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = Vec::new();

    for &number in event_numbers {
        if seen.contains(&number) {
            continue;
        }
        seen.push(number);

        let Some(event) = find_by_number(&events, number) else {
            warn!("event {number} not found in sheet '{}', skipped", calculation.name);
            skipped.push(SkippedEvent {
                number,
                reason: "not found in the calculation sheet".into(),
            });
            continue;
        };

        let outcomes: Vec<CategoryOutcome> = config
            .categories
            .iter()
            .map(|category| {
                let input = category_input(&mut resolver, &config.calculation, event, category);
                reconcile_category(&input, &config.tolerance, disambiguator)
            })
            .collect();

        let selection = if outcomes.iter().any(CategoryOutcome::is_withdrawable) {
            checked_selection(disambiguator.select_categories(event, &outcomes), &outcomes)
        } else {
            info!("event {}: no withdrawable residual", event.number);
            ResidualSelection::skip(event.number)
        };
        if selection.categories.is_empty() {
            info!("event {}: nothing selected", event.number);
        }

        reconciliations.push(EventReconciliation { event: event.clone(), outcomes, selection });
    }

    let balance = balance(&reconciliations, &estimate, &config.categories);
    let mut blocks: Vec<OutputBlock> = reconciliations
        .iter()
        .filter_map(|r| event_block(r, config))
        .collect();
    blocks.push(target_block(&estimate, target.as_ref(), &balance, config));

    Ok(RunReport {
        meta: RunMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            calculation_sheet: calculation.name.clone(),
            estimate_sheet: estimate_sheet.name.clone(),
        },
        estimate,
        target,
        events: reconciliations,
        skipped,
        balance,
        blocks,
    })
}

fn locate_target(events: &[Event], name: &str) -> Option<Event> {
    match find_by_name(events, name) {
        NameMatch::Exact(event) => Some(event.clone()),
        NameMatch::Fuzzy { event, score } => {
            info!("estimate '{}' matched event {} '{}' ({} shared words)", name, event.number, event.name, score);
            Some(event.clone())
        }
        NameMatch::Ambiguous { score, candidates } => {
            let numbers: Vec<String> = candidates.iter().map(|e| e.number.to_string()).collect();
            warn!(
                "estimate '{}' matches events {} equally ({} shared words), target left unnumbered",
                name,
                numbers.join(", "),
                score
            );
            None
        }
        NameMatch::NotFound => {
            warn!("estimate '{}' not found in the calculation sheet, target left unnumbered", name);
            None
        }
    }
}

/// Drop chosen categories that cannot be withdrawn from.
fn checked_selection(selection: ResidualSelection, outcomes: &[CategoryOutcome]) -> ResidualSelection {
    let mut categories = Vec::new();
    for code in selection.categories {
        let withdrawable = outcomes.iter().any(|o| o.category == code && o.is_withdrawable());
        if !withdrawable {
            warn!("event {}: category {} has nothing to withdraw, ignored", selection.event_number, code);
        } else if !categories.contains(&code) {
            categories.push(code);
        }
    }
    ResidualSelection { event_number: selection.event_number, categories }
}

// ---------------------------------------------------------------------------
// Output blocks
// ---------------------------------------------------------------------------

fn event_block(rec: &EventReconciliation, config: &ReconConfig) -> Option<OutputBlock> {
    let rows: Vec<OutputRow> = rec
        .selected()
        .flat_map(|outcome| {
            outcome.residual_items().map(|r| OutputRow {
                name: r.item.name.clone(),
                category: outcome.category.clone(),
                amount_cents: -r.residual_cents,
                kind: RowKind::Item,
            })
        })
        .collect();
    if rows.is_empty() {
        return None;
    }

    let category_totals: Vec<i64> = config
        .categories
        .iter()
        .map(|c| -rec.withdrawn_cents(&c.code))
        .collect();
    Some(OutputBlock {
        number: Some(rec.event.number),
        name: rec.event.name.clone(),
        term: rec.event.term.clone(),
        total_cents: category_totals.iter().sum(),
        category_totals,
        rows,
    })
}

fn target_block(
    estimate: &Estimate,
    target: Option<&Event>,
    balance: &BalanceReport,
    config: &ReconConfig,
) -> OutputBlock {
    let mut rows: Vec<OutputRow> = estimate
        .items
        .iter()
        .filter(|i| i.amount_cents > 0)
        .map(|i| OutputRow {
            name: i.name.clone(),
            category: i.category.clone(),
            amount_cents: i.amount_cents,
            kind: RowKind::Item,
        })
        .collect();

    for category in &config.categories {
        let leftover = balance.leftover_cents(&category.code);
        if leftover > 0 {
            rows.push(OutputRow {
                name: category.leftover_name.clone(),
                category: category.code.clone(),
                amount_cents: leftover,
                kind: RowKind::Leftover,
            });
        }
    }

    let category_totals: Vec<i64> = config
        .categories
        .iter()
        .map(|c| {
            rows.iter()
                .filter(|r| r.category == c.code)
                .map(|r| r.amount_cents)
                .sum()
        })
        .collect();

    OutputBlock {
        number: target.map(|e| e.number),
        name: estimate.event_name.clone(),
        term: target.map(|e| e.term.clone()).unwrap_or_default(),
        total_cents: category_totals.iter().sum(),
        category_totals,
        rows,
    }
}
