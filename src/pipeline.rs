//! The ordered list of passes run by [`tidy`].
//!
//! Passes run in a fixed order regardless of how options are written: comment passes,
//! field removal, value rewrites, duplicate handling, sorting, then key generation. The
//! resolved [`FieldIndex`] is built once after parsing and refreshed for every entry a
//! pass changes.
use serde::Serialize;

use crate::dedupe::{check_keys, detect, merge};
use crate::keygen::generate_keys_with;
use crate::normalize::{
    ValueStep, apply_value_steps, omit_fields, remove_duplicate_fields, remove_empty_fields,
    strip_comments, tidy_comments,
};
use crate::options::{DuplicateRule, MergeStrategy, TidyOptions};
use crate::parse::parse;
use crate::resolve::FieldIndex;
use crate::ser::{self, RenderOptions};
use crate::sort::{sort_entries, sort_fields, sort_keys};
use crate::value::{Document, NodeId};
use crate::warning::{Warning, Warnings};

/// The outcome of a tidy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TidyResult {
    /// The rendered bibliography.
    pub bibtex: String,
    pub warnings: Vec<Warning>,
    /// Number of entries in the input.
    pub count: usize,
}

/// One step of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pass {
    StripComments,
    TidyComments,
    Omit(Vec<String>),
    RemoveEmptyFields,
    RemoveDuplicateFields,
    /// Value rewrites, in [`ValueStep::rank`] order.
    Values(Vec<ValueStep>),
    /// Warn about reused citation keys.
    CheckKeys,
    Duplicates {
        rules: Vec<DuplicateRule>,
        merge: Option<MergeStrategy>,
    },
    SortEntries(Vec<String>),
    SortFields(Vec<String>),
    GenerateKeys(String),
}

/// The passes selected by a set of options, together with how the result is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<Pass>,
    render: RenderOptions,
}

impl Pipeline {
    pub fn from_options(options: &TidyOptions) -> Self {
        let mut passes = Vec::new();

        if options.strip_comments {
            passes.push(Pass::StripComments);
        }
        if options.tidy_comments {
            passes.push(Pass::TidyComments);
        }
        if !options.omit.is_empty() {
            passes.push(Pass::Omit(options.omit.clone()));
        }
        if options.remove_empty_fields {
            passes.push(Pass::RemoveEmptyFields);
        }
        if options.remove_duplicate_fields {
            passes.push(Pass::RemoveDuplicateFields);
        }

        let steps = value_steps(options);
        if !steps.is_empty() {
            passes.push(Pass::Values(steps));
        }

        passes.push(Pass::CheckKeys);

        if let Some(rules) = options.duplicate_rules().filter(|rules| !rules.is_empty()) {
            passes.push(Pass::Duplicates {
                rules,
                merge: options.merge_strategy(),
            });
        }
        if let Some(keys) = options.sort_keys() {
            passes.push(Pass::SortEntries(keys));
        }
        if let Some(order) = options.field_order() {
            passes.push(Pass::SortFields(order));
        }
        if let Some(template) = options.key_template() {
            passes.push(Pass::GenerateKeys(template));
        }

        Self {
            passes,
            render: RenderOptions::from_options(options),
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Parse `input`, run every pass and render the result.
    pub fn run(&self, input: &str) -> TidyResult {
        let (mut document, mut warnings) = parse(input);
        let count = document.entry_count();
        let mut index = FieldIndex::build(&document);

        for pass in &self.passes {
            run_pass(pass, &mut document, &mut index, &mut warnings);
        }

        let bibtex = ser::to_string(&document, &self.render);
        tracing::debug!(entries = count, warnings = warnings.iter().count(), "tidied");
        TidyResult {
            bibtex,
            warnings: warnings.into_vec(),
            count,
        }
    }
}

fn value_steps(options: &TidyOptions) -> Vec<ValueStep> {
    let mut steps = Vec::new();
    if options.curly {
        steps.push(ValueStep::Curly);
    }
    if options.strip_enclosing_braces {
        steps.push(ValueStep::StripEnclosingBraces);
    }
    if options.numeric {
        steps.push(ValueStep::Numeric);
    }
    if options.drop_all_caps {
        steps.push(ValueStep::DropAllCaps);
    }
    if options.escape {
        steps.push(ValueStep::Escape);
    }
    if options.encode_urls {
        steps.push(ValueStep::EncodeUrls);
    }
    if let Some(max) = options.max_authors.filter(|&max| max > 0) {
        steps.push(ValueStep::MaxAuthors(max));
    }
    if let Some(fields) = options.enclosed_fields() {
        steps.push(ValueStep::EnclosingBraces(fields));
    }
    steps.sort_by_key(ValueStep::rank);
    steps
}

fn refresh(index: &mut FieldIndex, document: &Document, changed: &[NodeId]) {
    for &id in changed {
        index.refresh(document, id);
    }
}

fn run_pass(pass: &Pass, document: &mut Document, index: &mut FieldIndex, warnings: &mut Warnings) {
    match pass {
        Pass::StripComments => {
            let removed = strip_comments(document);
            tracing::debug!(removed, "stripped comments");
        }
        Pass::TidyComments => {
            let changed = tidy_comments(document);
            tracing::debug!(changed, "tidied comments");
        }
        Pass::Omit(names) => {
            let changed = omit_fields(document, names);
            tracing::debug!(changed = changed.len(), "omitted fields");
            refresh(index, document, &changed);
        }
        Pass::RemoveEmptyFields => {
            let changed = remove_empty_fields(document);
            tracing::debug!(changed = changed.len(), "removed empty fields");
            refresh(index, document, &changed);
        }
        Pass::RemoveDuplicateFields => {
            let changed = remove_duplicate_fields(document);
            tracing::debug!(changed = changed.len(), "removed duplicate fields");
            refresh(index, document, &changed);
        }
        Pass::Values(steps) => {
            let changed = apply_value_steps(document, steps);
            tracing::debug!(steps = steps.len(), changed = changed.len(), "rewrote values");
            refresh(index, document, &changed);
        }
        Pass::CheckKeys => {
            let found = check_keys(document, warnings);
            tracing::debug!(found, "checked keys");
        }
        Pass::Duplicates { rules, merge: strategy } => {
            let clusters = detect(document, index, rules, warnings);
            if let Some(strategy) = strategy {
                let merged = merge(document, &clusters, *strategy);
                refresh(index, document, &merged.changed);
            }
        }
        Pass::SortEntries(specs) => {
            let keys = sort_keys(specs, warnings);
            sort_entries(document, index, &keys, warnings);
        }
        Pass::SortFields(order) => {
            let changed = sort_fields(document, order);
            tracing::debug!(changed = changed.len(), "sorted fields");
        }
        Pass::GenerateKeys(template) => {
            generate_keys_with(document, index, template, warnings);
        }
    }
}

/// Tidy a BibTeX document.
///
/// ```
/// use bibtidy::{TidyOptions, tidy};
///
/// let options = TidyOptions {
///     curly: true,
///     ..TidyOptions::default()
/// };
/// let result = tidy("@misc{k, title = \"T\"}", &options);
/// assert_eq!(result.bibtex, "@misc{k,\n  title = {T}\n}");
/// assert_eq!(result.count, 1);
/// ```
pub fn tidy(input: &str, options: &TidyOptions) -> TidyResult {
    Pipeline::from_options(options).run(input)
}
