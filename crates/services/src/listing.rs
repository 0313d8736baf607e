use chrono::NaiveDate;

use spaced_core::model::Deck;

/// Default number of decks per page in list views.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Orders decks for display: due decks first, then upcoming ones, each
/// ascending by next review date. Ties keep id order.
#[must_use]
pub fn list_due(mut decks: Vec<Deck>, as_of: NaiveDate) -> Vec<Deck> {
    // Due decks are exactly those dated on or before `as_of`, so one
    // date-ascending sort already puts them ahead of the rest.
    decks.sort_by_key(|d| (d.next_review_date(), d.id()));
    debug_assert!(decks.windows(2).all(|w| w[0].is_due(as_of) || !w[1].is_due(as_of)));
    decks
}

/// The leading run of `sorted` that is due on `as_of`.
///
/// `sorted` must come from [`list_due`] with the same `as_of`.
#[must_use]
pub fn due_subset(sorted: &[Deck], as_of: NaiveDate) -> &[Deck] {
    &sorted[..sorted.partition_point(|d| d.is_due(as_of))]
}

/// One page of `items`. Pages are 1-indexed; page 0, a zero page size, or a
/// page past the end yields an empty slice.
#[must_use]
pub fn page<T>(items: &[T], page_number: usize, page_size: usize) -> &[T] {
    if page_number == 0 || page_size == 0 {
        return &[];
    }
    let start = (page_number - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Number of pages needed for `len` items; at least one.
#[must_use]
pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spaced_core::model::DeckId;
    use spaced_core::time::{add_days, fixed_clock, fixed_now};

    fn deck(id: u64, name: &str, next: NaiveDate) -> Deck {
        Deck::from_persisted(
            DeckId::new(id),
            name.into(),
            0,
            0,
            None,
            next,
            fixed_now(),
            fixed_now(),
            0,
            0,
        )
        .unwrap()
    }

    #[test]
    fn due_decks_come_first_in_date_order() {
        let today = fixed_clock().today();
        let yesterday = today.pred_opt().unwrap();
        let decks = vec![
            deck(1, "tomorrow", add_days(today, 1)),
            deck(2, "today", today),
            deck(3, "yesterday", yesterday),
        ];

        let ordered = list_due(decks, today);
        let names: Vec<_> = ordered.iter().map(Deck::name).collect();
        assert_eq!(names, ["yesterday", "today", "tomorrow"]);
        assert!(ordered[0].is_due(today));
        assert!(ordered[1].is_due(today));
        assert!(!ordered[2].is_due(today));
    }

    #[test]
    fn due_subset_stops_before_tomorrow() {
        let today = fixed_clock().today();
        let decks = vec![
            deck(1, "tomorrow", add_days(today, 1)),
            deck(2, "today", today),
            deck(3, "yesterday", today.pred_opt().unwrap()),
        ];
        let ordered = list_due(decks, today);

        let names: Vec<_> = due_subset(&ordered, today).iter().map(Deck::name).collect();
        assert_eq!(names, ["yesterday", "today"]);
        assert_eq!(due_subset(&ordered, add_days(today, 1)).len(), 3);
        assert!(due_subset(&ordered, today.pred_opt().unwrap().pred_opt().unwrap()).is_empty());
        assert!(due_subset(&[], today).is_empty());
    }

    #[test]
    fn pages_are_one_indexed() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(page(&items, 1, 10), &items[..10]);
        assert_eq!(page(&items, 3, 10), &[21, 22, 23]);
        assert!(page(&items, 4, 10).is_empty());
        assert!(page(&items, 0, 10).is_empty());
        assert!(page(&items, 1, 0).is_empty());
        assert_eq!(page_count(items.len(), 10), 3);
        assert_eq!(page_count(0, 10), 1);
    }
}
