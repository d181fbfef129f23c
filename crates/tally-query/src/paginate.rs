//! # Paginator
//!
//! Slices a view into pages and computes the numbers a pager shows:
//! totals, the visible `start..=end` item range and a windowed page list.
//!
//! Out-of-range requests never fail. The page number is clamped to
//! `[1, max(1, total_pages)]` and a zero page size falls back to
//! [`DEFAULT_PAGE_SIZE`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Page counts up to this are listed in full, without ellipses.
pub const FULL_WINDOW_PAGES: usize = 5;

/// Contiguous pages shown at an edge when the current page is near it.
const EDGE_BLOCK: usize = 4;

pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    /// 1-based index of the first item on this page; `0` for an empty view.
    pub start_item: usize,
    /// 1-based index of the last item on this page; `0` for an empty view.
    pub end_item: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_prev(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }

    /// Pager links for this page.
    pub fn window(&self) -> Vec<PageLink> {
        page_window(self.total_pages, self.page_number)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            start_item: self.start_item,
            end_item: self.end_item,
        }
    }
}

/// `ceil(total_items / page_size)`, `0` for an empty view.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(effective_page_size(page_size))
}

/// Clamp a requested page to `[1, max(1, total_pages)]`.
pub fn clamp_page(page_number: i64, total_pages: usize) -> usize {
    let last = i64::try_from(total_pages.max(1)).unwrap_or(i64::MAX);
    page_number.clamp(1, last) as usize
}

fn effective_page_size(page_size: usize) -> usize {
    if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

/// Convert a raw (possibly fractional or garbage) page size from the UI.
pub fn sanitize_page_size(raw: f64) -> usize {
    if !raw.is_finite() || raw < 1.0 {
        DEFAULT_PAGE_SIZE
    } else {
        raw.floor() as usize
    }
}

/// Cut page `page_number` of `page_size` items out of `view`.
pub fn paginate<T: Clone>(view: &[T], page_number: i64, page_size: usize) -> Page<T> {
    let page_size = effective_page_size(page_size);
    let total_items = view.len();
    let total_pages = total_pages(total_items, page_size);
    let page = clamp_page(page_number, total_pages);
    if i64::try_from(page).ok() != Some(page_number) {
        tracing::debug!(
            requested = page_number,
            effective = page,
            total_pages,
            "clamped page number"
        );
    }

    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = page.saturating_mul(page_size).min(total_items);

    Page {
        items: view[start..end].to_vec(),
        page_number: page,
        page_size,
        total_items,
        total_pages,
        start_item: if total_items > 0 { start + 1 } else { 0 },
        end_item: end,
    }
}

// =============================================================================
// Page window
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Page(usize),
    Ellipsis,
}

impl fmt::Display for PageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{}", n),
            Self::Ellipsis => f.write_str(ELLIPSIS),
        }
    }
}

/// Serialized as a bare number or the literal `"..."`.
impl Serialize for PageLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Page(n) => serializer.serialize_u64(*n as u64),
            Self::Ellipsis => serializer.serialize_str(ELLIPSIS),
        }
    }
}

/// Page numbers and ellipses for a pager.
///
/// Up to [`FULL_WINDOW_PAGES`] every page is listed. Beyond that the first
/// and last pages are always present, plus either an edge block of four
/// pages (when the current page is within two of an edge) or the current
/// page with one neighbour on each side. An ellipsis only ever replaces
/// two or more hidden pages; a single hidden page is shown instead.
pub fn page_window(total_pages: usize, current_page: usize) -> Vec<PageLink> {
    if total_pages <= FULL_WINDOW_PAGES {
        return (1..=total_pages).map(PageLink::Page).collect();
    }

    let current = current_page.clamp(1, total_pages);
    let mut anchors = BTreeSet::from([1, total_pages]);
    if current <= 3 {
        anchors.extend(1..=EDGE_BLOCK);
    } else if current >= total_pages - 2 {
        anchors.extend(total_pages + 1 - EDGE_BLOCK..=total_pages);
    } else {
        anchors.extend(current - 1..=current + 1);
    }

    let mut links = Vec::with_capacity(anchors.len() + 2);
    let mut prev: Option<usize> = None;
    for page in anchors {
        if let Some(p) = prev {
            match page - p {
                1 => {}
                2 => links.push(PageLink::Page(p + 1)),
                _ => links.push(PageLink::Ellipsis),
            }
        }
        links.push(PageLink::Page(page));
        prev = Some(page);
    }
    links
}
