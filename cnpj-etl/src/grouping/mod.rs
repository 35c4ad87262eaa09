//! Grouping child tables by company key.
//!
//! [`GroupedTable`] indexes a whole child table in memory before the parent pass.
//! [`SortedGroupCursor`] walks a child table sorted by key alongside a parent table sorted
//! the same way and keeps only one look-ahead row. Both answer [`GroupLookup::group`].

mod hash;
mod merge;

use std::borrow::Cow;

pub use hash::{GroupedTable, read_grouped};
pub use merge::SortedGroupCursor;

use crate::error::EtlResult;
use crate::types::{GroupKey, SourceRow};

/// Access to the child rows of one parent key.
pub trait GroupLookup {
    /// Rows whose key column equals `key`, in source order. Unknown keys yield no rows.
    fn group(&mut self, key: &GroupKey) -> EtlResult<Cow<'_, [SourceRow]>>;
}
