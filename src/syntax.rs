//! # Description of the accepted syntax
//! This module gives an explicit description of the well-formed documents understood by
//! [`parse`](crate::parse::parse), as a [pest](https://pest.rs) grammar. The hand-written
//! parser accepts everything described here and additionally recovers from input which does
//! not match it; the recovery rules are listed at the end.
//!
//! ## Structure of a document
//! ### Whitespace and free text
//! 1. Whitespace is any ASCII whitespace character.
//!    ```ignore
//!    ws = _{ (" " | "\t" | "\n" | "\r" | "\x0C")+ }
//!    ```
//! 2. Free text is anything which does not start a block. It is kept verbatim, so an `@`
//!    which is not followed by a command and an opening delimiter, as in an e-mail
//!    address, is free text. `%` has no special meaning.
//!    ```ignore
//!    text = _{ (!block ~ ANY)* }
//!    ```
//!
//! ### Identifiers
//! 1. A command is a non-empty run of ASCII alphanumerics and `_-:.`.
//!    ```ignore
//!    command = @{ (ASCII_ALPHANUMERIC | "_" | "-" | ":" | ".")+ }
//!    ```
//! 2. Citation keys and field names are runs of characters other than whitespace and
//!    `,{}()="#%`.
//!    ```ignore
//!    entry_key = @{ key_char+ }
//!    field_name = @{ key_char+ }
//!    ```
//!
//! ### Field values
//! 1. A braced segment is delimited by `{` and `}` and may contain nested balanced braces.
//!    ```ignore
//!    braced = @{ "{" ~ balanced* ~ "}" }
//!    ```
//! 2. A quoted segment is delimited by `"`. A `"` preceded by a backslash or nested in braces
//!    does not close it.
//!    ```ignore
//!    quoted = @{ "\"" ~ quoted_char* ~ "\"" }
//!    ```
//! 3. A literal segment is a bare token such as `2020` or `jan`.
//! 4. A value is a possibly empty sequence of segments joined with `#`.
//!    ```ignore
//!    value = { (segment ~ (ign ~ "#" ~ ign ~ segment)*)? }
//!    ```
//!
//! ### Raw blocks
//! `@comment`, `@preamble` and `@string` blocks, with a case-insensitive command, are not
//! parsed further: their payload is any text with balanced delimiters.
//! ```ignore
//! raw = { "@" ~ raw_command ~ ign ~ ("{" ~ balanced* ~ "}" | "(" ~ round* ~ ")") }
//! ```
//!
//! ### Entries
//! An entry has an optional citation key followed by fields separated by commas. A token
//! followed by `=` is a field name rather than a key. Extra commas are ignored.
//! ```ignore
//! entry_body = _{ ign ~ (entry_key ~ ign ~ !"=" ~ ("," ~ fields)? | ","? ~ fields) ~ ign }
//! entry = { "@" ~ command ~ ign ~ ("{" ~ entry_body ~ "}" | "(" ~ entry_body ~ ")") }
//! ```
//!
//! ### Document
//! ```ignore
//! bib = _{ SOI ~ text ~ (block ~ text)* ~ EOI }
//! ```
//!
//! ## Recovery
//! 1. A block which reaches the end of the input inside a value or payload is kept with
//!    everything read so far and reported as `UNTERMINATED_BLOCK`.
//! 2. An entry whose structure is broken is kept verbatim, up to its balanced closing
//!    delimiter, else up to the next `@` at the start of a line, and reported as
//!    `MALFORMED_BLOCK`.
//! 3. An entry with fields but no key is reported as `MISSING_KEY`.
use pest_derive::Parser;

/// A parser derived from the reference grammar.
#[derive(Parser)]
#[grammar = "syntax/bibtex.pest"] // relative to src
pub struct BibtexParser;
