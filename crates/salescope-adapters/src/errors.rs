use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{adapter} schema mismatch: {reason}")]
    SchemaMismatch {
        adapter: &'static str,
        reason: String,
    },

    #[error("{adapter} CSV error: {source}")]
    Csv {
        adapter: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{adapter} data row {line_index} invalid: {message}")]
    DataRow {
        adapter: &'static str,
        line_index: usize,
        message: String,
    },

    #[error("{adapter} validation error: {message}")]
    Validation {
        adapter: &'static str,
        message: String,
    },

    #[error("{adapter} file did not contain any data rows")]
    EmptyData { adapter: &'static str },
}
