//! Merge policies for composited operations
//!
//! Every operation a view exposes is declared with one policy. The policy
//! decides how the per-trait outputs, visited in priority order, collapse
//! into the single value the caller sees.

use std::collections::BTreeMap;

/// How the outputs of several traits combine into one result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Stop at the first non-empty output
    FirstNonEmpty,
    /// Concatenate every output, dropping duplicates, first-seen order wins
    UnionUnique,
    /// Merge maps; keys claimed by a higher-priority trait are never overwritten
    ShallowMergeMap,
}

/// Operations a view composites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Label,
    Icon,
    MandatoryTags,
    Functionality,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Label,
        Operation::Icon,
        Operation::MandatoryTags,
        Operation::Functionality,
    ];

    /// The merge-policy table
    pub fn policy(self) -> MergePolicy {
        match self {
            Operation::Label | Operation::Icon => MergePolicy::FirstNonEmpty,
            Operation::MandatoryTags => MergePolicy::UnionUnique,
            Operation::Functionality => MergePolicy::ShallowMergeMap,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Label => "label",
            Operation::Icon => "icon",
            Operation::MandatoryTags => "mandatory_tags",
            Operation::Functionality => "functionality",
        }
    }
}

/// Per-key output of a map-returning operation.
///
/// `Skip` lets a trait mention a key without claiming it, so a
/// lower-priority trait can still fill it in.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution<T> {
    Value(T),
    Skip,
}

impl<T> From<T> for Contribution<T> {
    fn from(value: T) -> Self {
        Contribution::Value(value)
    }
}

/// Values that can be "empty" for the first-non-empty policy
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for &str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Blank for BTreeMap<K, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// First output that is present and non-empty.
///
/// Lazy: outputs after the winner are never pulled from the iterator.
pub fn first_non_empty<T, I>(outputs: I) -> Option<T>
where
    T: Blank,
    I: IntoIterator<Item = Option<T>>,
{
    outputs
        .into_iter()
        .flatten()
        .find(|value| !value.is_blank())
}

/// Concatenation of all outputs without duplicates, first-seen order.
pub fn union_unique<T, I>(outputs: I) -> Vec<T>
where
    T: PartialEq,
    I: IntoIterator<Item = Vec<T>>,
{
    let mut merged: Vec<T> = Vec::new();
    for output in outputs {
        for item in output {
            if !merged.contains(&item) {
                merged.push(item);
            }
        }
    }
    merged
}

/// Merge maps given in priority order; the first trait to claim a key keeps it.
pub fn shallow_merge<K, V, I>(outputs: I) -> BTreeMap<K, V>
where
    K: Ord,
    I: IntoIterator<Item = BTreeMap<K, Contribution<V>>>,
{
    let mut merged = BTreeMap::new();
    for output in outputs {
        for (key, contribution) in output {
            if let Contribution::Value(value) = contribution {
                merged.entry(key).or_insert(value);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Contribution<i32>)]) -> BTreeMap<String, Contribution<i32>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_first_non_empty_skips_none() {
        assert_eq!(
            first_non_empty(vec![None, Some("x".to_string())]),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_first_non_empty_skips_blank_strings() {
        let outputs = vec![Some(String::new()), Some("raptor".to_string()), Some("rex".to_string())];
        assert_eq!(first_non_empty(outputs), Some("raptor".to_string()));
    }

    #[test]
    fn test_first_non_empty_all_empty() {
        let outputs: Vec<Option<String>> = vec![None, Some(String::new())];
        assert_eq!(first_non_empty(outputs), None);
    }

    #[test]
    fn test_first_non_empty_is_lazy() {
        let mut pulled = 0;
        let outputs = (0..3).map(|i| {
            pulled += 1;
            Some(format!("v{}", i))
        });
        assert_eq!(first_non_empty(outputs), Some("v0".to_string()));
        assert_eq!(pulled, 1);
    }

    #[test]
    fn test_union_unique_preserves_first_seen_order() {
        let merged = union_unique(vec![vec!["a", "b"], vec!["b", "c"]]);
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_union_unique_drops_duplicates_within_one_output() {
        let merged = union_unique(vec![vec!["meat", "meat"], vec![]]);
        assert_eq!(merged, vec!["meat"]);
    }

    #[test]
    fn test_shallow_merge_higher_priority_wins() {
        let merged = shallow_merge(vec![
            map(&[("x", Contribution::Value(1))]),
            map(&[("x", Contribution::Value(2)), ("y", Contribution::Value(3))]),
        ]);
        assert_eq!(merged.get("x"), Some(&1));
        assert_eq!(merged.get("y"), Some(&3));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_shallow_merge_skip_leaves_key_open() {
        let merged = shallow_merge(vec![
            map(&[("x", Contribution::Skip)]),
            map(&[("x", Contribution::Value(2))]),
        ]);
        assert_eq!(merged.get("x"), Some(&2));
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(Operation::Label.policy(), MergePolicy::FirstNonEmpty);
        assert_eq!(Operation::Icon.policy(), MergePolicy::FirstNonEmpty);
        assert_eq!(Operation::MandatoryTags.policy(), MergePolicy::UnionUnique);
        assert_eq!(Operation::Functionality.policy(), MergePolicy::ShallowMergeMap);
    }
}
