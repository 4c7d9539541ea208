use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no result file found for '{base}' (tried extensions {tried:?})")]
    FileNotFound { base: String, tried: Vec<String> },

    #[error("schema mismatch across plate tables: {details}")]
    SchemaMismatch {
        /// Indices of the offending input tables.
        tables: Vec<usize>,
        details: String,
    },

    #[error("replicated analyses left unresolved for plate barcodes {0:?}")]
    DuplicateAnalysisUnresolved(Vec<String>),

    #[error("unsupported reduction operator '{0}'")]
    UnsupportedReduction(String),

    #[error("aggregation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("format error: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, PlateError>;
