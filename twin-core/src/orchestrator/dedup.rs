//! Deduplication of artifacts returned by overlapping sources.
//!
//! Two independent merges, both deterministic and independent of input
//! order:
//!
//! - [`merge_publications`] folds secondary-index publications into the
//!   matching primary-index record by title similarity.
//! - [`group_dataset_fragments`] collapses dataset-repository items that are
//!   parts of one parent work (supplementary figures, tables, files) into a
//!   single representative.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Artifact, Reuse, SourceKind};

use super::title::{candidate_similarity, normalize_title};

/// Minimum title similarity for two publications to be the same work.
pub const MERGE_THRESHOLD: f64 = 0.85;

/// Dataset-repository item types that are usually parts of a larger work.
pub const FRAGMENT_ITEM_TYPES: &[&str] = &["figure", "media", "fileset"];

/// Words that may join a fragment label to its parent title.
const CONNECTORS: &[&str] = &["from", "for", "of", "to", "in"];

/// Second words after "supplementary"/"supplemental"/"supporting".
const SUPPLEMENT_NOUNS: &[&str] = &[
    "material",
    "materials",
    "data",
    "dataset",
    "file",
    "files",
    "figure",
    "figures",
    "table",
    "tables",
    "information",
    "video",
    "movie",
    "methods",
];

/// Single-word fragment labels that must be followed by a number or letter.
const NUMBERED_LABELS: &[&str] = &["figure", "fig", "table", "movie", "video", "image"];

/// Stable ordering key: smallest identifier, then title.
fn sort_key(a: &Artifact) -> (String, String) {
    (a.primary_identifier().to_string(), a.title.clone())
}

fn is_primary(a: &Artifact) -> bool {
    a.sources.contains(&SourceKind::SemanticScholar)
}

fn citations(a: &Artifact) -> u64 {
    match a.reuse {
        Reuse::Publication { citations } => citations,
        _ => 0,
    }
}

/// Merge publications reported by both publication indices.
///
/// Records seen by the primary index are the merge targets. Every other
/// record is folded into the primary record whose normalised title is most
/// similar, if that similarity reaches [`MERGE_THRESHOLD`]; on a tie the
/// primary record with the smallest identifier wins. Several secondary
/// records may fold into one primary. Unmatched records stay standalone.
///
/// A merged record keeps the primary title, unions identifiers and sources,
/// and takes the maximum citation count. Authors come from whichever record
/// lists more names, the primary on a tie; venue, year, url and DOI come
/// from the primary when present.
///
/// Running the merge on its own output changes nothing: merged records are
/// primary records with unchanged titles, and leftovers already failed to
/// match them.
pub fn merge_publications(publications: Vec<Artifact>) -> Vec<Artifact> {
    let mut sorted = publications;
    sorted.sort_by_key(sort_key);

    let (mut primaries, secondaries): (Vec<Artifact>, Vec<Artifact>) =
        sorted.into_iter().partition(is_primary);
    let primary_titles: Vec<String> = primaries.iter().map(|p| normalize_title(&p.title)).collect();

    let mut standalone = Vec::new();
    for secondary in secondaries {
        let title = normalize_title(&secondary.title);
        let mut best: Option<(usize, f64)> = None;
        for (idx, primary_title) in primary_titles.iter().enumerate() {
            let Some(sim) = candidate_similarity(&title, primary_title) else {
                continue;
            };
            if sim >= MERGE_THRESHOLD && best.is_none_or(|(_, b)| sim > b) {
                best = Some((idx, sim));
            }
        }
        match best {
            Some((idx, sim)) => {
                tracing::trace!(similarity = sim, title = %secondary.title, "merging publication");
                absorb(&mut primaries[idx], secondary);
            }
            None => standalone.push(secondary),
        }
    }

    let mut merged = primaries;
    merged.extend(standalone);
    merged.sort_by(|a, b| {
        citations(b)
            .cmp(&citations(a))
            .then_with(|| sort_key(a).cmp(&sort_key(b)))
    });
    merged
}

/// Fold `other` into `target` (the primary record).
fn absorb(target: &mut Artifact, other: Artifact) {
    let best_citations = citations(target).max(citations(&other));
    target.reuse = Reuse::Publication {
        citations: best_citations,
    };
    target.identifiers.extend(other.identifiers);
    target.sources.extend(other.sources);
    target.institutions.extend(other.institutions);
    if other.authors.len() > target.authors.len() {
        target.authors = other.authors;
    }
    if target.venue.is_none() {
        target.venue = other.venue;
    }
    if target.year.is_none() {
        target.year = other.year;
    }
    if target.url.is_none() {
        target.url = other.url;
    }
    if target.persistent_id.is_none() {
        target.persistent_id = other.persistent_id;
    }
    target.is_public |= other.is_public;
    target.has_license |= other.has_license;
    target.has_documentation |= other.has_documentation;
    target.structured_format |= other.structured_format;
}

/// How a dataset item is grouped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    /// Normalised parent title.
    Parent(String),
    /// Sorted, normalised author list.
    Authors(String),
}

impl GroupKey {
    /// Tag stored in [`Artifact::fragment_group`].
    fn tag(&self) -> String {
        match self {
            Self::Parent(title) => format!("parent:{title}"),
            Self::Authors(fingerprint) => format!("authors:{fingerprint}"),
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        if let Some(title) = tag.strip_prefix("parent:") {
            return Some(Self::Parent(title.to_owned()));
        }
        tag.strip_prefix("authors:").map(|a| Self::Authors(a.to_owned()))
    }
}

/// If `title` reads like "Figure 2 from: Parent Title", return the
/// normalised parent title.
///
/// Recognised labels: "figure N", "fig N", "table N", "movie N", "video N",
/// "image N", "supplementary/supplemental/supporting <noun> [N]",
/// "additional file [N]", "appendix [N]". The label must be followed by one
/// of "from", "for", "of", "to", "in" and a non-empty parent title.
pub fn fragment_parent_title(title: &str) -> Option<String> {
    let normalized = normalize_title(title);
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    let label_len = fragment_label_len(&tokens)?;
    let connector = tokens.get(label_len)?;
    if !CONNECTORS.contains(connector) {
        return None;
    }
    let parent = tokens.get(label_len + 1..)?.join(" ");
    (!parent.is_empty()).then_some(parent)
}

/// Number of leading tokens forming a fragment label, if any.
fn fragment_label_len(tokens: &[&str]) -> Option<usize> {
    let first = *tokens.first()?;
    let second = tokens.get(1).copied();
    let is_label = |t: Option<&&str>| t.is_some_and(|t| is_item_number(t));

    if NUMBERED_LABELS.contains(&first) {
        return is_item_number(second?).then_some(2);
    }
    if matches!(first, "supplementary" | "supplemental" | "supporting") {
        if !SUPPLEMENT_NOUNS.contains(&second?) {
            return None;
        }
        return Some(if is_label(tokens.get(2)) { 3 } else { 2 });
    }
    if first == "additional" && second == Some("file") {
        return Some(if is_label(tokens.get(2)) { 3 } else { 2 });
    }
    if first == "appendix" {
        return Some(if is_label(tokens.get(1)) { 2 } else { 1 });
    }
    None
}

/// "2", "s1", "3b", "a": short tokens that number an item.
fn is_item_number(token: &str) -> bool {
    let len = token.chars().count();
    (len == 1 && token.chars().all(char::is_alphanumeric))
        || (len <= 4 && token.chars().any(|c| c.is_ascii_digit()))
}

fn is_fragment_type(item: &Artifact) -> bool {
    item.item_type
        .as_deref()
        .is_some_and(|t| FRAGMENT_ITEM_TYPES.contains(&t.to_lowercase().as_str()))
}

fn author_fingerprint(item: &Artifact) -> Option<String> {
    let authors: BTreeSet<String> = item
        .authors
        .iter()
        .map(|a| normalize_title(a))
        .filter(|a| !a.is_empty())
        .collect();
    if authors.is_empty() {
        return None;
    }
    Some(authors.into_iter().collect::<Vec<_>>().join(";"))
}

/// Collapse dataset fragments into one representative per parent work.
///
/// Grouping, in order of precedence:
///
/// 1. Items whose title matches [`fragment_parent_title`] group under the
///    parent title. An item whose own normalised title equals such a parent
///    title joins that group.
/// 2. Fragment-typed items ([`FRAGMENT_ITEM_TYPES`]) without a title match
///    group by their sorted, normalised author list.
///
/// Items with empty titles, and items matching neither rule, stay
/// standalone. Each group keeps the member with the highest
/// downloads + views (smallest identifier on a tie); the others are dropped
/// and their counts are not added to the representative.
///
/// The representative records its group in [`Artifact::fragment_group`],
/// and an item that already carries a group keeps it. Regrouping the output
/// therefore does not depend on the dropped members.
pub fn group_dataset_fragments(datasets: Vec<Artifact>) -> Vec<Artifact> {
    let mut sorted = datasets;
    sorted.sort_by_key(sort_key);

    let parents: Vec<Option<String>> = sorted
        .iter()
        .map(|d| fragment_parent_title(&d.title))
        .collect();
    let parent_set: BTreeSet<&str> = parents.iter().flatten().map(String::as_str).collect();

    let mut groups: BTreeMap<GroupKey, Vec<Artifact>> = BTreeMap::new();
    let mut standalone = Vec::new();

    for (item, parent) in sorted.iter().zip(parents.iter()) {
        let own_title = normalize_title(&item.title);
        if own_title.is_empty() {
            standalone.push(item.clone());
            continue;
        }
        let stored = item.fragment_group.as_deref().and_then(GroupKey::from_tag);
        let key = match parent {
            _ if stored.is_some() => stored,
            Some(p) => Some(GroupKey::Parent(p.clone())),
            None if parent_set.contains(own_title.as_str()) => Some(GroupKey::Parent(own_title)),
            None if is_fragment_type(item) => author_fingerprint(item).map(GroupKey::Authors),
            None => None,
        };
        match key {
            Some(k) => groups.entry(k).or_default().push(item.clone()),
            None => standalone.push(item.clone()),
        }
    }

    let mut out = standalone;
    for (key, members) in groups {
        let total = members.len();
        let representative = members.into_iter().reduce(|best, next| {
            let (b, n) = (best.reuse.total(), next.reuse.total());
            if n > b || (n == b && next.primary_identifier() < best.primary_identifier()) {
                next
            } else {
                best
            }
        });
        if let Some(mut rep) = representative {
            rep.fragment_group = Some(key.tag());
            if total > 1 {
                tracing::trace!(group = ?key, members = total, kept = %rep.title, "grouped dataset fragments");
            }
            out.push(rep);
        }
    }

    out.sort_by_key(sort_key);
    out
}
