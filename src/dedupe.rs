//! Duplicate detection and merging.
//!
//! Entries are compared in document order and the first entry seen wins: each later entry
//! matching it by one of the [`DuplicateRule`]s joins its cluster. Matches through a
//! duplicate lead back to the root of its cluster, so clusters are transitive.
use std::collections::HashMap;

use unicase::UniCase;

use crate::names::{split_authors, surname};
use crate::options::{DuplicateRule, MergeStrategy};
use crate::resolve::FieldIndex;
use crate::value::{Document, Field, NodeId};
use crate::warning::{EntryRef, Warning, WarningCode, Warnings};

/// Rules in the order in which they are tried.
const RULE_ORDER: [DuplicateRule; 4] = [
    DuplicateRule::Key,
    DuplicateRule::Doi,
    DuplicateRule::Abstract,
    DuplicateRule::Citation,
];

/// A first-seen entry together with its later duplicates, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub root: NodeId,
    pub members: Vec<NodeId>,
}

fn entry_ref(document: &Document, id: NodeId) -> EntryRef {
    EntryRef::new(id, document.entry(id).and_then(|e| e.key.as_deref()))
}

fn display_key(document: &Document, id: NodeId) -> String {
    document
        .entry(id)
        .and_then(|e| e.key.clone())
        .unwrap_or_else(|| format!("#{}", id.index()))
}

/// Warn about every entry which reuses the citation key of an earlier entry.
pub fn check_keys(document: &Document, warnings: &mut Warnings) -> usize {
    let mut seen: HashMap<UniCase<String>, NodeId> = HashMap::new();
    let mut found = 0;

    for (id, entry) in document.entries() {
        let Some(key) = &entry.key else { continue };
        match seen.get(&UniCase::new(key.clone())) {
            Some(&first) => {
                found += 1;
                warnings.push(
                    Warning::new(
                        WarningCode::DuplicateKey,
                        format!("Duplicate key {key}"),
                    )
                    .with_entry(entry_ref(document, id))
                    .with_duplicate_of(entry_ref(document, first)),
                );
            }
            None => {
                seen.insert(UniCase::new(key.clone()), id);
            }
        }
    }
    found
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn alphanumeric_lowercase(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The value compared by `rule`, or `None` if the entry cannot match by it.
fn signature(document: &Document, index: &FieldIndex, id: NodeId, rule: DuplicateRule) -> Option<String> {
    let sig = match rule {
        DuplicateRule::Key => document.entry(id)?.key.as_ref()?.to_lowercase(),
        DuplicateRule::Doi => index
            .value(id, "doi")?
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect(),
        DuplicateRule::Abstract => normalize_whitespace(index.value(id, "abstract")?),
        DuplicateRule::Citation => {
            let title = alphanumeric_lowercase(index.value(id, "title")?);
            if title.is_empty() {
                return None;
            }
            let mut surnames: Vec<String> = index
                .value(id, "author")
                .map(split_authors)
                .unwrap_or_default()
                .into_iter()
                .map(|name| alphanumeric_lowercase(surname(name)))
                .filter(|s| !s.is_empty())
                .collect();
            surnames.sort();
            surnames.dedup();
            format!("{}:{}", surnames.join(","), title)
        }
    };
    (!sig.is_empty()).then_some(sig)
}

/// Find duplicate entries by the given rules. Each duplicate is annotated with the root
/// of its cluster and reported as `DUPLICATE_ENTRY`.
pub fn detect(
    document: &mut Document,
    index: &FieldIndex,
    rules: &[DuplicateRule],
    warnings: &mut Warnings,
) -> Vec<Cluster> {
    let rules: Vec<DuplicateRule> = RULE_ORDER.into_iter().filter(|r| rules.contains(r)).collect();
    let mut registered: HashMap<(DuplicateRule, String), NodeId> = HashMap::new();
    let mut root_of: HashMap<NodeId, NodeId> = HashMap::new();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut cluster_of_root: HashMap<NodeId, usize> = HashMap::new();

    for id in document.entry_ids() {
        let signatures: Vec<(DuplicateRule, String)> = rules
            .iter()
            .filter_map(|&rule| signature(document, index, id, rule).map(|sig| (rule, sig)))
            .collect();

        let matched = signatures
            .iter()
            .find_map(|sig| registered.get(sig).map(|&first| (sig.0, first)));

        if let Some((rule, first)) = matched {
            let root = root_of.get(&first).copied().unwrap_or(first);
            root_of.insert(id, root);
            document.mark_duplicate(id, root);

            let slot = *cluster_of_root.entry(root).or_insert_with(|| {
                clusters.push(Cluster {
                    root,
                    members: Vec::new(),
                });
                clusters.len() - 1
            });
            clusters[slot].members.push(id);

            warnings.push(
                Warning::new(
                    WarningCode::DuplicateEntry,
                    format!(
                        "Entry {} is a duplicate of {} (same {})",
                        display_key(document, id),
                        display_key(document, root),
                        rule_name(rule)
                    ),
                )
                .with_entry(entry_ref(document, id))
                .with_duplicate_of(entry_ref(document, root)),
            );
        }

        for sig in signatures {
            registered.entry(sig).or_insert(id);
        }
    }

    tracing::debug!(clusters = clusters.len(), "detected duplicates");
    clusters
}

fn rule_name(rule: DuplicateRule) -> &'static str {
    match rule {
        DuplicateRule::Key => "key",
        DuplicateRule::Doi => "doi",
        DuplicateRule::Abstract => "abstract",
        DuplicateRule::Citation => "citation",
    }
}

/// Entries removed and entries whose fields changed while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Merged {
    pub removed: Vec<NodeId>,
    pub changed: Vec<NodeId>,
}

/// Collapse each cluster to a single entry.
pub fn merge(document: &mut Document, clusters: &[Cluster], strategy: MergeStrategy) -> Merged {
    let mut merged = Merged::default();

    for cluster in clusters {
        match strategy {
            MergeStrategy::First => merged.removed.extend(cluster.members.iter().copied()),
            MergeStrategy::Last => {
                if let Some((_, earlier)) = cluster.members.split_last() {
                    merged.removed.push(cluster.root);
                    merged.removed.extend(earlier.iter().copied());
                }
            }
            MergeStrategy::Combine | MergeStrategy::Overwrite => {
                let incoming: Vec<Field> = cluster
                    .members
                    .iter()
                    .filter_map(|&id| document.entry(id))
                    .flat_map(|entry| entry.fields.iter().cloned())
                    .collect();

                let overwrite = strategy == MergeStrategy::Overwrite;
                let changed = document.edit_entry(cluster.root, |root| {
                    let mut changed = false;
                    for field in incoming {
                        match root.field_mut(&field.name) {
                            Some(existing) if overwrite => {
                                if existing.value != field.value {
                                    existing.value = field.value;
                                    changed = true;
                                }
                            }
                            Some(_) => {}
                            None => {
                                root.fields.push(field);
                                changed = true;
                            }
                        }
                    }
                    changed
                });
                if changed {
                    merged.changed.push(cluster.root);
                }
                merged.removed.extend(cluster.members.iter().copied());
            }
        }
    }

    for &id in &merged.removed {
        document.remove(id);
    }
    tracing::debug!(removed = merged.removed.len(), ?strategy, "merged duplicates");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn detect_in(input: &str, rules: &[DuplicateRule]) -> (Document, Vec<Cluster>, Warnings) {
        let (mut doc, _) = parse(input);
        let index = FieldIndex::build(&doc);
        let mut warnings = Warnings::default();
        let clusters = detect(&mut doc, &index, rules, &mut warnings);
        (doc, clusters, warnings)
    }

    fn keys(doc: &Document) -> Vec<String> {
        doc.entries()
            .map(|(_, e)| e.key.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_check_keys() {
        let (doc, _) = parse("@a{x,} @b{X,} @c{y,} @d{x,}");
        let mut warnings = Warnings::default();
        assert_eq!(check_keys(&doc, &mut warnings), 2);
        assert_eq!(warnings.count(WarningCode::DuplicateKey), 2);
    }

    #[test]
    fn test_doi_ignores_case_and_whitespace() {
        let (doc, clusters, warnings) = detect_in(
            "@a{a, doi = {10.1/ABC}} @b{b, doi = {10.1/ abc }} @c{c, doi = {10.1/abd}}",
            &[DuplicateRule::Doi],
        );
        assert_eq!(clusters, vec![Cluster { root: NodeId(0), members: vec![NodeId(2)] }]);
        assert_eq!(warnings.count(WarningCode::DuplicateEntry), 1);
        assert_eq!(doc.entry(NodeId(2)).unwrap().duplicate_of, Some(NodeId(0)));
        // the annotation keeps the source text
        assert!(doc.block(NodeId(2)).unwrap().source().is_some());
    }

    #[test]
    fn test_citation() {
        let input = "@a{a, author = {Smith, J. and Doe, A.}, title = {On Things}}\n\
                     @b{b, author = {A. Doe and J. Smith}, title = {On things!}}\n\
                     @c{c, author = {J. Smith}, title = {On things}}\n\
                     @d{d, author = {Smith, J. and Doe, A.}}";
        let (_, clusters, _) = detect_in(input, &[DuplicateRule::Citation]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].root, NodeId(0));
        assert_eq!(clusters[0].members, vec![NodeId(2)]);
    }

    #[test]
    fn test_clusters_are_transitive() {
        // b matches a by doi, c matches b by abstract
        let input = "@a{a, doi = {1}} @b{b, doi = {1}, abstract = {Same  text}} @c{c, abstract = {same text}}";
        let (doc, clusters, _) = detect_in(input, &[DuplicateRule::Doi, DuplicateRule::Abstract]);
        assert_eq!(
            clusters,
            vec![Cluster { root: NodeId(0), members: vec![NodeId(2), NodeId(4)] }]
        );
        assert_eq!(doc.entry(NodeId(4)).unwrap().duplicate_of, Some(NodeId(0)));
    }

    #[test]
    fn test_merge_strategies() {
        let input = "@a{A, title = {X}, year = 2000} @b{B, title = {Y}, doi = {10.1/x}} @c{C, title = {Z}, note = {n}}";
        let rules = [DuplicateRule::Key];
        let run = |strategy| {
            let (mut doc, _) = parse(&input.replace("{B,", "{A,").replace("{C,", "{a,"));
            let index = FieldIndex::build(&doc);
            let clusters = detect(&mut doc, &index, &rules, &mut Warnings::default());
            let merged = merge(&mut doc, &clusters, strategy);
            (doc, merged)
        };

        let (doc, merged) = run(MergeStrategy::First);
        assert_eq!(merged.removed.len(), 2);
        assert_eq!(doc.entry_count(), 1);

        let (doc, _) = run(MergeStrategy::Last);
        assert_eq!(keys(&doc), vec!["a"]);

        let (doc, merged) = run(MergeStrategy::Combine);
        assert_eq!(merged.changed, vec![NodeId(0)]);
        let root = doc.entry(NodeId(0)).unwrap();
        let fields: Vec<String> = root.fields.iter().map(ToString::to_string).collect();
        assert_eq!(
            fields,
            vec!["title = {X}", "year = 2000", "doi = {10.1/x}", "note = {n}"]
        );

        let (doc, _) = run(MergeStrategy::Overwrite);
        let root = doc.entry(NodeId(0)).unwrap();
        assert_eq!(root.field("title").unwrap().value.plain(), "Z");
        assert_eq!(root.fields.len(), 4);
    }
}
