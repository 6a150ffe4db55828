use std::collections::HashSet;

use crate::model::ArticleRecord;

/// Append `page` to `accumulated`, skipping rows whose identity was already seen.
///
/// First-seen order is preserved. Rows without an identity are always kept.
/// For identified rows, merging the same page twice gives the same result as
/// merging it once.
pub fn merge_dedup(accumulated: &[ArticleRecord], page: &[ArticleRecord]) -> Vec<ArticleRecord> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(accumulated.len() + page.len());
    let mut merged = Vec::with_capacity(accumulated.len() + page.len());

    for record in accumulated.iter().chain(page) {
        match record.identity() {
            Some(key) if !seen.insert(key) => {}
            _ => merged.push(record.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn linked(link: &str) -> ArticleRecord {
        ArticleRecord {
            link: link.to_string(),
            title: link.to_uppercase(),
            ..Default::default()
        }
    }

    fn anonymous(title: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_overlap_keeps_first_seen() {
        let acc = vec![linked("a"), linked("b")];
        let mut dup_b = linked("b");
        dup_b.title = "later copy".into();
        let merged = merge_dedup(&acc, &[dup_b, linked("c")]);

        let links: Vec<&str> = merged.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["a", "b", "c"]);
        assert_eq!(merged[1].title, "B");
    }

    #[test]
    fn test_legacy_id_identity() {
        let a = ArticleRecord {
            id: "7".into(),
            ..Default::default()
        };
        let merged = merge_dedup(&[a.clone()], &[a]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_rows_without_identity_never_collapse() {
        let merged = merge_dedup(&[anonymous("x")], &[anonymous("x"), anonymous("y")]);
        assert_eq!(merged.len(), 3);
    }

    fn record_strategy() -> impl Strategy<Value = ArticleRecord> {
        prop_oneof![
            4 => "[a-e]".prop_map(|l| linked(&l)),
            1 => "[x-z]".prop_map(|t| anonymous(&t)),
        ]
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(
            acc in prop::collection::vec(record_strategy(), 0..12),
            page in prop::collection::vec(record_strategy(), 0..12),
        ) {
            let once = merge_dedup(&acc, &page);
            let identified: Vec<ArticleRecord> =
                page.iter().filter(|r| r.identity().is_some()).cloned().collect();
            let twice = merge_dedup(&once, &identified);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_has_unique_identities(
            acc in prop::collection::vec(record_strategy(), 0..12),
            page in prop::collection::vec(record_strategy(), 0..12),
        ) {
            let merged = merge_dedup(&acc, &page);
            let keys: Vec<&str> = merged.iter().filter_map(|r| r.identity()).collect();
            let unique: HashSet<&str> = keys.iter().copied().collect();
            prop_assert_eq!(keys.len(), unique.len());
        }
    }
}
