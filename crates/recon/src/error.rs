use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("estimate sheet '{sheet}' has no event name in {cell}")]
    EstimateNameMissing { sheet: String, cell: String },
}
