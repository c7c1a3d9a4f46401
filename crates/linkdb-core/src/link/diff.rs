//! Added/removed computation between two link cell values.

use std::collections::HashSet;

use super::value::LinkValue;

/// Difference between a new and an old link cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDiff {
    /// Ids in the new value but not the old one, in new-value order.
    pub added: Vec<String>,
    /// Ids in the old value but not the new one, in old-value order.
    pub removed: Vec<String>,
}

impl LinkDiff {
    /// Check if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Rows whose relation to the edited row changed: `added ∪ removed`.
    pub fn affected(&self) -> Vec<String> {
        self.added.iter().chain(&self.removed).cloned().collect()
    }
}

/// Compute which ids were added and removed going from `old` to `new`.
///
/// Set semantics: order is irrelevant to membership. An absent side counts as
/// empty, so `diff(None, old)` removes everything in `old` and
/// `diff(new, None)` adds everything in `new`.
pub fn diff(new: Option<&LinkValue>, old: Option<&LinkValue>) -> LinkDiff {
    let new_ids: HashSet<&str> = new.into_iter().flatten().map(String::as_str).collect();
    let old_ids: HashSet<&str> = old.into_iter().flatten().map(String::as_str).collect();

    let added = new
        .into_iter()
        .flatten()
        .filter(|id| !old_ids.contains(id.as_str()))
        .cloned()
        .collect();
    let removed = old
        .into_iter()
        .flatten()
        .filter(|id| !new_ids.contains(id.as_str()))
        .cloned()
        .collect();

    LinkDiff { added, removed }
}

/// [`diff`] over stored string forms.
pub fn diff_stored(new: Option<&str>, old: Option<&str>) -> LinkDiff {
    let new = new.map(|raw| LinkValue::parse(Some(raw)));
    let old = old.map(|raw| LinkValue::parse(Some(raw)));
    diff(new.as_ref(), old.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(new: Option<&str>, old: Option<&str>, added: &[&str], removed: &[&str]) {
        let d = diff_stored(new, old);
        assert_eq!(d.added, added, "added for {new:?} <- {old:?}");
        assert_eq!(d.removed, removed, "removed for {new:?} <- {old:?}");
    }

    #[test]
    fn test_diff_cases() {
        check(Some("1,2,3"), Some("1,2,3,4"), &[], &["4"]);
        check(Some("1,2,3,4"), Some("1,3"), &["2", "4"], &[]);
        check(Some("1,2,3,4"), Some("1,2,3,4"), &[], &[]);
        check(None, Some("1,2,3,4"), &[], &["1", "2", "3", "4"]);
        check(Some("1,2,3,4"), None, &["1", "2", "3", "4"], &[]);
        check(Some("1,3,4,5"), Some("1,2,3,4"), &["5"], &["2"]);
        check(Some("1"), Some("2"), &["1"], &["2"]);
        check(None, None, &[], &[]);
    }

    #[test]
    fn test_order_insensitive() {
        assert!(diff_stored(Some("3,2,1"), Some("1,2,3")).is_empty());
    }

    #[test]
    fn test_scenario_edit() {
        let d = diff_stored(Some("3,4"), Some("2,3"));
        assert_eq!(d.added, ["4"]);
        assert_eq!(d.removed, ["2"]);
        assert_eq!(d.affected(), ["4", "2"]);
    }

    #[test]
    fn test_reconstructs_new_from_old() {
        let samples = [
            None,
            Some(""),
            Some("1"),
            Some("1,2"),
            Some("2,3"),
            Some("3,4,5"),
            Some("5,1,9,2"),
            Some("x,y"),
        ];
        for new in samples {
            for old in samples {
                let d = diff_stored(new, old);
                let added: HashSet<_> = d.added.iter().cloned().collect();
                let removed: HashSet<_> = d.removed.iter().cloned().collect();
                assert!(added.is_disjoint(&removed));

                let old_set: HashSet<String> =
                    LinkValue::parse(old).iter().cloned().collect();
                let new_set: HashSet<String> =
                    LinkValue::parse(new).iter().cloned().collect();
                let rebuilt: HashSet<String> = old_set
                    .difference(&removed)
                    .cloned()
                    .chain(added.iter().cloned())
                    .collect();
                assert_eq!(rebuilt, new_set, "{new:?} <- {old:?}");
            }
        }
    }
}
