/// Separator between member ids in a group key. Lesson ids never contain it.
pub const GROUP_KEY_SEPARATOR: &str = "|";

/// Stable identity of a duplicate group, derived only from its member set.
///
/// Members are sorted by natural string order and joined with
/// [`GROUP_KEY_SEPARATOR`], so the key survives any reordering of the input and
/// any re-run of the upstream analysis that reports the same members under a
/// new transient group id.
pub fn group_key<S: AsRef<str>>(member_ids: &[S]) -> String {
    let mut ids: Vec<&str> = member_ids.iter().map(|id| id.as_ref()).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join(GROUP_KEY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_sorted_join() {
        assert_eq!(group_key(&["C", "A", "B"]), "A|B|C");
    }

    #[test]
    fn test_key_invariant_under_permutation() {
        let orders = [
            ["A", "B", "C"],
            ["A", "C", "B"],
            ["B", "A", "C"],
            ["B", "C", "A"],
            ["C", "A", "B"],
            ["C", "B", "A"],
        ];
        for order in orders {
            assert_eq!(group_key(&order), "A|B|C");
        }
    }

    #[test]
    fn test_natural_string_order_not_numeric() {
        assert_eq!(group_key(&["lesson-10", "lesson-9"]), "lesson-10|lesson-9");
    }

    #[test]
    fn test_repeated_member_collapses() {
        assert_eq!(group_key(&["B", "A", "B"]), group_key(&["A", "B"]));
    }
}
