//! Identity-keyed merge of paper batches.

use std::collections::{HashMap, HashSet};

use curator_shared::Paper;

/// Counts describing what a merge did, for logging and run outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Incoming ids not present before.
    pub added: usize,
    /// Incoming ids that replaced an existing record.
    pub replaced: usize,
    /// Size of the merged collection.
    pub total: usize,
}

/// Overlay `incoming` on `existing` by `id`.
///
/// A record whose id is already present is replaced wholesale, in place.
/// The result is sorted by `published_date` descending with a stable sort, so
/// equal dates keep their overlay order.
pub fn merge(existing: &[Paper], incoming: &[Paper]) -> Vec<Paper> {
    let mut merged: Vec<Paper> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for paper in existing.iter().chain(incoming) {
        match index.get(&paper.id) {
            Some(&slot) => merged[slot] = paper.clone(),
            None => {
                index.insert(paper.id.clone(), merged.len());
                merged.push(paper.clone());
            }
        }
    }

    merged.sort_by(|a, b| b.published_date.cmp(&a.published_date));
    merged
}

/// What [`merge`] would do with these inputs.
pub fn merge_stats(existing: &[Paper], incoming: &[Paper]) -> MergeStats {
    let before: HashSet<&str> = existing.iter().map(|p| p.id.as_str()).collect();
    let arriving: HashSet<&str> = incoming.iter().map(|p| p.id.as_str()).collect();

    let replaced = arriving.intersection(&before).count();
    let added = arriving.len() - replaced;
    MergeStats {
        added,
        replaced,
        total: before.len() + added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::paper;

    fn ids(papers: &[Paper]) -> Vec<&str> {
        papers.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn merge_with_self_is_sort() {
        let x = vec![
            paper("a", "t", "2024-01-01", 10),
            paper("b", "t", "2024-03-01", 20),
            paper("c", "t", "2024-02-01", 30),
        ];
        let mut sorted = x.clone();
        sorted.sort_by(|a, b| b.published_date.cmp(&a.published_date));
        assert_eq!(merge(&x, &x), sorted);
    }

    #[test]
    fn replaces_instead_of_appending() {
        let p = paper("same", "t", "2024-01-01", 10);
        let mut p2 = paper("same", "t", "2024-01-01", 90);
        p2.title = "Revised title".into();
        p2.citation_count = None;

        let merged = merge(&[p], &[p2.clone()]);
        assert_eq!(merged, vec![p2]);
    }

    #[test]
    fn union_on_identity() {
        let a = vec![
            paper("1", "t", "2024-01-01", 1),
            paper("2", "t", "2024-01-02", 1),
        ];
        let b = vec![
            paper("2", "t", "2024-01-05", 1),
            paper("3", "t", "2024-01-03", 1),
        ];
        let merged = merge(&a, &b);
        assert_eq!(merged.len(), 3);
        assert_eq!(ids(&merged), vec!["2", "3", "1"]);
    }

    #[test]
    fn later_duplicates_in_batch_win() {
        let first = paper("dup", "t", "2024-01-01", 10);
        let second = paper("dup", "t", "2024-01-01", 70);
        let merged = merge(&[], &[first, second.clone()]);
        assert_eq!(merged, vec![second]);
    }

    #[test]
    fn equal_dates_keep_overlay_order() {
        let existing = vec![paper("x", "t", "2024-01-01", 1), paper("y", "t", "2024-01-01", 1)];
        let incoming = vec![paper("z", "t", "2024-01-01", 1)];
        assert_eq!(ids(&merge(&existing, &incoming)), vec!["x", "y", "z"]);
    }

    #[test]
    fn stats_count_added_and_replaced() {
        let existing = vec![paper("1", "t", "2024-01-01", 1), paper("2", "t", "2024-01-01", 1)];
        let incoming = vec![
            paper("2", "t", "2024-01-01", 1),
            paper("3", "t", "2024-01-01", 1),
            paper("3", "t", "2024-01-01", 1),
        ];
        let stats = merge_stats(&existing, &incoming);
        assert_eq!(
            stats,
            MergeStats {
                added: 1,
                replaced: 1,
                total: 3
            }
        );
        assert_eq!(stats.total, merge(&existing, &incoming).len());
    }
}
