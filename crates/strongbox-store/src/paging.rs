//! Paging for due-record queries.

use tracing::debug;

use crate::RetryRecord;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT_PAGING: usize = 10;

/// Largest page a store will return.
pub const MAX_LIMIT_PAGING: usize = 100;

/// A cleaned offset/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT_PAGING,
        }
    }
}

impl PageRequest {
    /// Clean raw paging values.
    ///
    /// Negative offsets become 0. A missing or zero limit becomes
    /// [`DEFAULT_LIMIT_PAGING`]; a negative limit becomes 1; anything above
    /// [`MAX_LIMIT_PAGING`] is capped.
    pub fn clean(offset: Option<i64>, limit: Option<i64>) -> Self {
        let offset = offset.filter(|o| *o > 0).map_or(0, |o| o as usize);

        let limit = match limit {
            None | Some(0) => DEFAULT_LIMIT_PAGING,
            Some(l) if l < 1 => 1,
            Some(l) => (l as u64).min(MAX_LIMIT_PAGING as u64) as usize,
        };

        debug!(offset, limit, "cleaned paging values");
        Self { offset, limit }
    }

    /// The first page of `limit` records (cleaned).
    pub fn first(limit: usize) -> Self {
        Self::clean(None, Some(limit.min(i64::MAX as usize) as i64))
    }
}

/// One page of due records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuePage {
    /// Records on this page, oldest first.
    pub records: Vec<RetryRecord>,
    /// Whether more due records exist past this page.
    pub has_more: bool,
    /// Offset of the next page, when there is one.
    pub next_offset: Option<usize>,
    /// Number of due records across all pages.
    pub total_count: usize,
}

impl DuePage {
    /// A page with no records and a total count of zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cut one page out of the full due set, which must already be sorted
    /// oldest first.
    pub fn from_sorted(due: Vec<RetryRecord>, page: PageRequest) -> Self {
        let total_count = due.len();
        let records: Vec<RetryRecord> = due
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();

        let end = page.offset.saturating_add(records.len());
        let has_more = end < total_count;

        debug!(
            offset = page.offset,
            retrieved = records.len(),
            total = total_count,
            "retrieved due retry records"
        );

        Self {
            records,
            has_more,
            next_offset: has_more.then_some(end),
            total_count,
        }
    }
}

/// Result of a due-record query.
///
/// Transient unavailability (the store is not warmed yet) is a value here
/// rather than an error, so callers handle it separately from real failures.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Fetched {
    /// The query ran.
    Due(DuePage),
    /// The store cannot answer yet.
    Unavailable { reason: String },
}

impl Fetched {
    /// Treat unavailability as an empty page with a total count of zero.
    pub fn or_empty(self) -> DuePage {
        match self {
            Fetched::Due(page) => page,
            Fetched::Unavailable { .. } => DuePage::empty(),
        }
    }

    /// Check if the store reported itself unavailable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Fetched::Unavailable { .. })
    }
}
