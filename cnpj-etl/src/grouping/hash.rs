use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::EtlResult;
use crate::grouping::GroupLookup;
use crate::types::{GroupKey, SourceRow};

/// A child table indexed by the value of its key column.
///
/// Rows keep their source order within a group. Rows with a null key cannot be joined and
/// are only counted.
#[derive(Debug, Clone)]
pub struct GroupedTable {
    key_column: usize,
    groups: HashMap<GroupKey, Vec<SourceRow>>,
    rows: u64,
    ungrouped_rows: u64,
}

impl GroupedTable {
    pub fn new(key_column: usize) -> GroupedTable {
        GroupedTable {
            key_column,
            groups: HashMap::new(),
            rows: 0,
            ungrouped_rows: 0,
        }
    }

    /// Appends a batch of rows to their groups.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = SourceRow>) {
        for row in batch {
            self.rows += 1;
            match row.key(self.key_column) {
                Some(key) => self.groups.entry(key).or_default().push(row),
                None => self.ungrouped_rows += 1,
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[SourceRow]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rows read, grouped or not.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn ungrouped_rows(&self) -> u64 {
        self.ungrouped_rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &[SourceRow])> {
        self.groups.iter().map(|(key, rows)| (key, rows.as_slice()))
    }
}

impl GroupLookup for GroupedTable {
    fn group(&mut self, key: &GroupKey) -> EtlResult<Cow<'_, [SourceRow]>> {
        Ok(Cow::Borrowed(self.get(key.as_str()).unwrap_or_default()))
    }
}

/// Builds a [`GroupedTable`] from a sequence of batches in one pass.
pub fn read_grouped<I>(batches: I, key_column: usize) -> GroupedTable
where
    I: IntoIterator<Item = Vec<SourceRow>>,
{
    let mut table = GroupedTable::new(key_column);
    for batch in batches {
        table.extend(batch);
    }
    table
}
