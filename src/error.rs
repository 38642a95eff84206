use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the configuration edges of the crate.
///
/// The tidy pipeline itself never fails: every variant here is converted into an
/// [`INVALID_OPTION`](crate::warning::WarningCode::InvalidOption) warning when it occurs
/// inside [`tidy`](crate::tidy).
#[derive(Debug, Error)]
pub enum Error {
    /// The options document is not valid JSON or does not match [`TidyOptions`](crate::TidyOptions).
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// A key template contains a `[` without a matching `]`.
    #[error("unclosed marker starting at byte {position} in key template")]
    UnclosedMarker { position: usize },

    /// A key template marker has no name, e.g. `[]` or `[:lower]`.
    #[error("empty marker at byte {position} in key template")]
    EmptyMarker { position: usize },

    /// A key template marker uses an unknown modifier.
    #[error("unknown modifier '{modifier}' on marker '{marker}'")]
    UnknownModifier { marker: String, modifier: String },

    /// A sort key cannot name a field.
    #[error("invalid sort key '{0}'")]
    InvalidSortKey(String),
}
