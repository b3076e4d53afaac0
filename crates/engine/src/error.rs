use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// Text that is not an A1 cell address.
    #[error("invalid cell address: '{0}'")]
    InvalidAddress(String),
    /// Text that is not a column in letter form.
    #[error("invalid column: '{0}'")]
    InvalidColumn(String),
}
