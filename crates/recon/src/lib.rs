//! `zalyshok-recon`: budget residual reconciliation.
//!
//! Pure engine crate: receives loaded sheets, returns a run report.
//! No CLI or IO dependencies.

pub mod aggregate;
pub mod config;
pub mod disambiguator;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod locator;
pub mod mapper;
pub mod matcher;
pub mod model;

pub use aggregate::BalanceReport;
pub use config::ReconConfig;
pub use disambiguator::{AutoDisambiguator, Disambiguator, DiscrepancyQuestion, SingleItemQuestion};
pub use engine::run;
pub use error::ReconError;
pub use model::{format_cents, OutputBlock, OutputRow, RowKind, RunReport};
