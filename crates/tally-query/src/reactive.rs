//! # Reactive View State
//!
//! Keeps a pager consistent with the view it pages over. [`PageState`]
//! remembers the inputs the current page was computed from and jumps back
//! to page 1 whenever the filter, sort, page size or underlying data
//! changes. [`Memo`] caches one derived value per key so a view is only
//! recomputed when its inputs actually differ.
//!
//! Invariant: after [`PageState::page`] the stored page number always lies
//! in `[1, max(1, total_pages)]`.

use tally_core::{FilterSpec, SortSpec};

use crate::paginate::{clamp_page, paginate, Page, DEFAULT_PAGE_SIZE};

/// Everything a view depends on. `source_version` is bumped by the owner
/// whenever the record collection itself changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewKey {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub page_size: usize,
    pub source_version: u64,
}

#[derive(Debug, Clone)]
pub struct PageState {
    page_number: usize,
    page_size: usize,
    total_pages: usize,
    observed: Option<(FilterSpec, SortSpec, u64)>,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_number: 1,
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
            total_pages: 0,
            observed: None,
        }
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Total pages as of the last [`PageState::page`] call.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Record the inputs of the next view. Returns `true` (and resets to
    /// page 1) when any of them differ from the previous call.
    pub fn observe(&mut self, filter: &FilterSpec, sort: &SortSpec, source_version: u64) -> bool {
        let unchanged = matches!(
            &self.observed,
            Some((f, s, v)) if f == filter && s == sort && *v == source_version
        );
        if unchanged {
            return false;
        }
        tracing::debug!(from = self.page_number, "view inputs changed, resetting to page 1");
        self.observed = Some((filter.clone(), sort.clone(), source_version));
        self.page_number = 1;
        true
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        if page_size != self.page_size {
            self.page_size = page_size;
            self.page_number = 1;
        }
    }

    /// Jump to `page_number`, clamped against the last known page count.
    pub fn go_to(&mut self, page_number: i64) {
        self.page_number = clamp_page(page_number, self.total_pages);
    }

    pub fn next(&mut self) {
        if self.page_number < self.total_pages {
            self.page_number += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.page_number > 1 {
            self.page_number -= 1;
        }
    }

    /// Cut the current page out of `view`, clamping the stored page number
    /// to the view's page count.
    pub fn page<T: Clone>(&mut self, view: &[T]) -> Page<T> {
        let page = paginate(view, self.page_number as i64, self.page_size);
        self.page_number = page.page_number;
        self.total_pages = page.total_pages;
        page
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

// =============================================================================
// Memo
// =============================================================================

/// A single-entry cache keyed by equality.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    entry: Option<(K, V)>,
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self { entry: None }
    }

    /// The cached value for `key`, computing it first if the key changed.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
        if !self.is_cached(&key) {
            self.entry = None;
        }
        let (_, value) = self.entry.get_or_insert_with(|| {
            let value = compute(&key);
            (key, value)
        });
        value
    }

    pub fn is_cached(&self, key: &K) -> bool {
        matches!(&self.entry, Some((cached, _)) if cached == key)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

impl<K: PartialEq, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::run_query;
    use crate::schema::Schema;
    use tally_core::{access, SortDirection, SortKey};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: usize,
        tag: &'static str,
    }

    fn items() -> Vec<Item> {
        (1..=50)
            .map(|id| Item {
                id,
                tag: if id % 4 == 0 { "rare" } else { "common" },
            })
            .collect()
    }

    fn schema() -> Schema<Item> {
        Schema::new().discrete("tag", |i: &Item| Some(i.tag))
    }

    #[test]
    fn test_first_observe_reports_change() {
        let mut state = PageState::new(10);
        assert!(state.observe(&FilterSpec::new(), &SortSpec::unsorted(), 0));
        assert!(!state.observe(&FilterSpec::new(), &SortSpec::unsorted(), 0));
    }

    #[test]
    fn test_filter_change_resets_to_first_page() {
        let items = items();
        let schema = schema();
        let mut state = PageState::new(10);

        let all = FilterSpec::new();
        state.observe(&all, &SortSpec::unsorted(), 0);
        let view = run_query(&items, &schema, &all, &SortSpec::unsorted());
        state.page(view.as_slice());
        state.go_to(5);
        assert_eq!(state.page(view.as_slice()).page_number, 5);

        let rare = FilterSpec::new().discrete("tag", "rare");
        assert!(state.observe(&rare, &SortSpec::unsorted(), 0));
        let narrowed = run_query(&items, &schema, &rare, &SortSpec::unsorted());
        let page = state.page(narrowed.as_slice());
        assert_eq!(narrowed.len(), 12);
        assert_eq!(page.page_number, 1);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.first().map(|i| i.id), Some(4));
    }

    #[test]
    fn test_source_version_change_resets() {
        let mut state = PageState::new(10);
        state.observe(&FilterSpec::new(), &SortSpec::unsorted(), 0);
        state.page(&items());
        state.next();
        assert_eq!(state.page_number(), 2);
        assert!(state.observe(&FilterSpec::new(), &SortSpec::unsorted(), 1));
        assert_eq!(state.page_number(), 1);
    }

    #[test]
    fn test_sort_change_resets() {
        let items = items();
        let by_id = SortKey::Number(access::number(|i: &Item| Some(i.id as f64)));
        let schema = schema().sort_key("id", by_id);
        let filter = FilterSpec::new();
        let mut state = PageState::new(10);

        let ascending = SortSpec::by("id", SortDirection::Asc);
        state.observe(&filter, &ascending, 0);
        let view = run_query(&items, &schema, &filter, &ascending);
        state.page(view.as_slice());
        state.go_to(4);
        assert_eq!(state.page(view.as_slice()).page_number, 4);

        assert!(!state.observe(&filter, &ascending, 0));
        assert_eq!(state.page_number(), 4);

        let descending = SortSpec::by("id", SortDirection::Desc);
        assert!(state.observe(&filter, &descending, 0));
        let resorted = run_query(&items, &schema, &filter, &descending);
        let page = state.page(resorted.as_slice());
        assert_eq!(page.page_number, 1);
        assert_eq!(page.items.first().map(|i| i.id), Some(50));
    }

    #[test]
    fn test_page_size_change_resets() {
        let mut state = PageState::new(10);
        state.page(&items());
        state.go_to(3);
        state.set_page_size(10);
        assert_eq!(state.page_number(), 3);
        state.set_page_size(25);
        assert_eq!(state.page_number(), 1);
        assert_eq!(state.page(&items()).total_pages, 2);
    }

    #[test]
    fn test_navigation_stays_in_range() {
        let mut state = PageState::new(20);
        state.page(&items());
        state.prev();
        assert_eq!(state.page_number(), 1);
        state.go_to(99);
        assert_eq!(state.page_number(), 3);
        state.next();
        assert_eq!(state.page_number(), 3);
        state.go_to(-4);
        assert_eq!(state.page_number(), 1);
    }

    #[test]
    fn test_shrinking_view_clamps_stored_page() {
        let mut state = PageState::new(10);
        state.page(&items());
        state.go_to(5);
        let page = state.page(&items()[..15]);
        assert_eq!(page.page_number, 2);
        assert_eq!(state.page_number(), 2);
    }

    #[test]
    fn test_memo_recomputes_only_on_key_change() {
        let mut memo: Memo<ViewKey, usize> = Memo::new();
        let mut runs = 0;
        let key = ViewKey {
            page_size: 10,
            ..ViewKey::default()
        };

        assert_eq!(*memo.get_or_compute(key.clone(), |_| { runs += 1; 7 }), 7);
        assert_eq!(*memo.get_or_compute(key.clone(), |_| { runs += 1; 8 }), 7);
        assert_eq!(runs, 1);

        let changed = ViewKey {
            source_version: 1,
            ..key.clone()
        };
        assert_eq!(*memo.get_or_compute(changed.clone(), |_| { runs += 1; 9 }), 9);
        assert_eq!(runs, 2);
        assert!(memo.is_cached(&changed));

        memo.invalidate();
        assert!(!memo.is_cached(&changed));
    }

    #[test]
    fn test_memo_alternating_keys() {
        let mut memo: Memo<u64, String> = Memo::default();
        let mut runs = 0;
        for key in [1, 1, 2, 2, 1, 3, 3, 3] {
            let value = memo.get_or_compute(key, |k| {
                runs += 1;
                format!("view-{}", k)
            });
            assert_eq!(value, &format!("view-{}", key));
        }
        assert_eq!(runs, 4);
        assert!(memo.is_cached(&3));
        assert!(!memo.is_cached(&1));
    }
}
