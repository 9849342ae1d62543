//! Media resolution for a single listing.

use std::collections::HashSet;

use crate::models::MediaItem;

/// Deduplicate media by `order`, keeping the first occurrence of each value.
///
/// The upstream already sorts by `order`, so this preserves received order
/// rather than re-sorting.
pub fn resolve_media(items: &[MediaItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.order))
        .map(|item| item.url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn keeps_first_occurrence_per_order_in_received_order() {
        let items = vec![
            MediaItem::new(3, "a"),
            MediaItem::new(1, "b"),
            MediaItem::new(3, "c"),
            MediaItem::new(2, "d"),
            MediaItem::new(1, "e"),
        ];
        assert_eq!(resolve_media(&items), vec!["a", "b", "d"]);
    }

    #[test]
    fn items_without_order_share_one_slot() {
        let items = vec![
            MediaItem {
                order: None,
                url: "first".to_string(),
            },
            MediaItem::new(0, "zero"),
            MediaItem {
                order: None,
                url: "second".to_string(),
            },
        ];
        assert_eq!(resolve_media(&items), vec!["first", "zero"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(resolve_media(&[]).is_empty());
    }
}
