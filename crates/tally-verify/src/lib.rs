//! # tally-verify: The "Law" of TALLY
//!
//! Kani harnesses for the paginator. Each proof covers every input up to a
//! small bound, so the properties below hold for all view lengths, page
//! sizes and requested page numbers in range, not just sampled ones.
//!
//! # Proof: Clamping
//!
//! Whatever page number the UI sends, the page served lies in
//! `[1, max(1, total_pages)]` and its items are a contiguous slice of the
//! view starting at `(page - 1) * page_size`.
//!
//! # Proof: Window shape
//!
//! The pager always lists page 1, the last page and the current page, and
//! never places two ellipses side by side.

extern crate tally_query;

#[cfg(kani)]
use tally_query::{page_window, paginate, PageLink};

#[cfg(kani)]
mod proofs {
    use super::*;

    const MAX_ITEMS: usize = 8;

    fn view() -> [u8; MAX_ITEMS] {
        [0, 1, 2, 3, 4, 5, 6, 7]
    }

    /// **Proof: Clamped page number and slice position**
    #[kani::proof]
    #[kani::unwind(10)]
    fn verify_page_is_clamped() {
        let len: usize = kani::any_where(|n: &usize| *n <= MAX_ITEMS);
        let size: usize = kani::any_where(|s: &usize| *s >= 1 && *s <= MAX_ITEMS);
        let requested: i64 = kani::any();
        let data = view();

        let page = paginate(&data[..len], requested, size);

        assert!(page.page_number >= 1);
        assert!(page.page_number <= page.total_pages.max(1));
        assert!(page.items.len() <= size);
        if let Some(first) = page.items.first() {
            assert_eq!(*first as usize, (page.page_number - 1) * size);
            assert_eq!(page.start_item, (page.page_number - 1) * size + 1);
            assert_eq!(page.end_item, page.start_item + page.items.len() - 1);
        }
    }

    /// **Proof: Every item lands on exactly one page**
    ///
    /// Page `p` starts where page `p - 1` ended, and the last page ends at
    /// the view's length.
    #[kani::proof]
    #[kani::unwind(10)]
    fn verify_pages_partition_view() {
        let len: usize = kani::any_where(|n: &usize| *n >= 1 && *n <= MAX_ITEMS);
        let size: usize = kani::any_where(|s: &usize| *s >= 1 && *s <= MAX_ITEMS);
        let data = view();
        let slice = &data[..len];

        let total = paginate(slice, 1, size).total_pages;
        let p: usize = kani::any_where(|p: &usize| *p >= 1 && *p <= total);

        let page = paginate(slice, p as i64, size);
        assert_eq!(page.start_item, (p - 1) * size + 1);
        if p == total {
            assert_eq!(page.end_item, len);
        } else {
            assert_eq!(page.end_item, p * size);
            assert_eq!(paginate(slice, p as i64 + 1, size).start_item, page.end_item + 1);
        }
    }

    /// **Proof: Window anchors and ellipsis placement**
    #[kani::proof]
    #[kani::unwind(16)]
    fn verify_window_shape() {
        let total: usize = kani::any_where(|t: &usize| *t >= 1 && *t <= 12);
        let current: usize = kani::any_where(|c: &usize| *c >= 1 && *c <= total);

        let links = page_window(total, current);

        assert_eq!(links.first(), Some(&PageLink::Page(1)));
        assert_eq!(links.last(), Some(&PageLink::Page(total)));
        assert!(links.contains(&PageLink::Page(current)));
        for pair in links.windows(2) {
            assert!(!(pair[0] == PageLink::Ellipsis && pair[1] == PageLink::Ellipsis));
        }
    }
}

// Compile-time assertion that the proof module exists when building with Kani.
#[cfg(not(kani))]
pub fn _proof_placeholder() {
    // Kani proofs are compiled only under cfg(kani).
    // Run `cargo kani --package tally-verify` to execute proofs.
}
