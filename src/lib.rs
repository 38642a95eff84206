//! Parse, normalize and re-serialize BibTeX bibliographies.
//!
//! The entry point is [`tidy`], which parses a document, runs the passes selected by a
//! [`TidyOptions`] and renders the result. With every option off the output is identical
//! to the input, byte for byte.
//!
//! ```
//! use bibtidy::{TidyOptions, tidy};
//!
//! let input = "@article{k, title = {1998}, year = {1998}}";
//! assert_eq!(tidy(input, &TidyOptions::default()).bibtex, input);
//!
//! let options = TidyOptions::from_json(r#"{"numeric": true, "lowercase": true}"#).unwrap();
//! assert_eq!(
//!     tidy(input, &options).bibtex,
//!     "@article{k,\n  title = 1998,\n  year = 1998\n}\n"
//! );
//! ```

/// The document tree.
pub mod value;

/// Error types for configuration.
pub mod error;

pub mod warning;

/// Month macros.
pub mod macros;

/// Tolerant parsing of BibTeX text.
pub mod parse;

pub mod resolve;

/// Author list handling.
pub mod names;

pub mod normalize;

pub mod dedupe;

pub mod sort;

pub mod keygen;

/// Rendering documents back to text.
pub mod ser;

pub mod options;

pub mod pipeline;

#[cfg(feature = "syntax")]
#[cfg_attr(docsrs, doc(cfg(feature = "syntax")))]
pub mod syntax;

// re-exports
pub use error::{Error, Result};
pub use options::TidyOptions;
pub use parse::parse;
pub use pipeline::{Pipeline, TidyResult, tidy};
pub use value::{Document, NodeId};
pub use warning::{Warning, WarningCode};
