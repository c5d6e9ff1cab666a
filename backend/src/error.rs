// =============================================================================
// Domain errors — returned by the store, the synthesizer and the API layer
// =============================================================================
//
// Infrastructure code (HTTP client, config IO, startup) keeps using
// `anyhow::Result`; everything a dashboard user can trigger returns
// `DeskError` so the REST layer can map it to a status code.
// =============================================================================

use thiserror::Error;

use crate::types::Dataset;

/// Errors surfaced by portfolio operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeskError {
    /// Bad interval, range, snapshot or currency code.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Symbol is not held in any bucket the operation searched.
    #[error("symbol '{symbol}' not found")]
    NotFound { symbol: String },

    /// The dataset the operation needs has not finished loading.
    #[error("{dataset} data is not loaded yet")]
    Uninitialized { dataset: Dataset },
}

impl DeskError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(symbol: impl Into<String>) -> Self {
        Self::NotFound {
            symbol: symbol.into(),
        }
    }
}

pub type DeskResult<T> = std::result::Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        assert_eq!(
            DeskError::not_found("MSFT").to_string(),
            "symbol 'MSFT' not found"
        );
        assert_eq!(
            DeskError::Uninitialized {
                dataset: Dataset::Heatmap
            }
            .to_string(),
            "heatmap data is not loaded yet"
        );
        assert!(DeskError::invalid("interval must be positive")
            .to_string()
            .contains("interval must be positive"));
    }
}
