//! Decisions the matcher cannot make on its own.
//!
//! The engine asks a [`Disambiguator`] whenever a human would otherwise have to
//! look at the sheet: which categories of an event to withdraw from, whether
//! an unmatched remainder belongs to a category's only item, and whether to
//! keep a category whose residuals miss the remainder by a wide margin.
//! [`AutoDisambiguator`] answers from an [`AutoPolicy`] for batch runs; the
//! CLI provides an interactive console implementation.

use log::info;

use crate::config::AutoPolicy;
use crate::matcher::for_each_combination;
use crate::model::{CategoryOutcome, Event, LineItem, ResidualSelection};

/// Asked when one planned item exists and its amount differs from the remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleItemQuestion {
    pub event_number: i64,
    pub category: String,
    pub item: LineItem,
    pub remainder_cents: i64,
}

/// Asked when the residual total misses the remainder by more than the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscrepancyQuestion {
    pub event_number: i64,
    pub category: String,
    pub residual_cents: i64,
    pub remainder_cents: i64,
    pub delta_cents: i64,
}

pub trait Disambiguator {
    /// Categories to withdraw from. `outcomes` holds every category of the
    /// event; only withdrawable ones are meaningful choices.
    fn select_categories(&mut self, event: &Event, outcomes: &[CategoryOutcome]) -> ResidualSelection;

    fn confirm_single_item(&mut self, question: &SingleItemQuestion) -> bool;

    fn accept_discrepancy(&mut self, question: &DiscrepancyQuestion) -> bool;
}

/// Non-interactive answers: withdraw from every withdrawable category and
/// answer yes/no questions from the policy.
#[derive(Debug, Clone, Default)]
pub struct AutoDisambiguator {
    policy: AutoPolicy,
}

impl AutoDisambiguator {
    pub fn new(policy: AutoPolicy) -> Self {
        Self { policy }
    }
}

impl Disambiguator for AutoDisambiguator {
    fn select_categories(&mut self, event: &Event, outcomes: &[CategoryOutcome]) -> ResidualSelection {
        let categories: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_withdrawable())
            .map(|o| o.category.clone())
            .collect();
        info!("event {}: auto-selected categories [{}]", event.number, categories.join(", "));
        ResidualSelection { event_number: event.number, categories }
    }

    fn confirm_single_item(&mut self, question: &SingleItemQuestion) -> bool {
        info!(
            "event {} category {}: auto-{} remainder for '{}'",
            question.event_number,
            question.category,
            if self.policy.confirm_single_item { "confirming" } else { "declining" },
            question.item.name
        );
        self.policy.confirm_single_item
    }

    fn accept_discrepancy(&mut self, question: &DiscrepancyQuestion) -> bool {
        info!(
            "event {} category {}: auto-{} discrepancy of {} cents",
            question.event_number,
            question.category,
            if self.policy.accept_discrepancy { "accepting" } else { "rejecting" },
            question.delta_cents
        );
        self.policy.accept_discrepancy
    }
}

/// Every non-empty combination of `codes`, smallest first, then in code order.
/// This is the menu offered per event (plus "skip").
pub fn category_combinations(codes: &[String]) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    for size in 1..=codes.len() {
        for_each_combination(codes.len(), size, |indices| {
            out.push(indices.iter().map(|&i| codes[i].clone()).collect());
            false
        });
    }
    out
}
