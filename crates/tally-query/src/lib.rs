//! # tally-query: The "Engine" of TALLY
//!
//! Turns a collection of records plus the operator's [`FilterSpec`] and
//! [`SortSpec`] into a [`View`], then cuts that view into [`Page`]s.
//!
//! ```text
//! records ──► search ──► discrete ──► range ──► date ──► stable sort ──► View
//!                                                                        │
//!                                      PageState ◄── reset on change ────┤
//!                                                                        ▼
//!                                                                    paginate ──► Page
//! ```
//!
//! The source collection is never mutated and the view borrows from it.
//!
//! [`FilterSpec`]: tally_core::FilterSpec
//! [`SortSpec`]: tally_core::SortSpec

pub mod paginate;
pub mod pipeline;
pub mod reactive;
pub mod schema;

pub use paginate::{
    clamp_page, page_window, paginate, sanitize_page_size, total_pages, Page, PageLink,
    DEFAULT_PAGE_SIZE,
};
pub use pipeline::{build_comparator, facet_counts, run_query, FilterPlan, View};
pub use reactive::{Memo, PageState, ViewKey};
pub use schema::Schema;
