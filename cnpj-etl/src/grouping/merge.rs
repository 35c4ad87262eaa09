use std::borrow::Cow;
use std::cmp::Ordering;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::grouping::GroupLookup;
use crate::types::{GroupKey, SourceRow};

/// Merge join cursor over a child table sorted ascending by its key column.
///
/// Requests must come in non-decreasing key order, which holds when the parent table is
/// sorted the same way. Child rows with a key below the requested one have no parent and
/// are counted as orphans. The first row above the requested key is held back for the next
/// request, so memory is bounded by the largest group.
pub struct SortedGroupCursor<I> {
    rows: I,
    key_column: usize,
    peeked: Option<(GroupKey, SourceRow)>,
    last_source_key: Option<GroupKey>,
    last_request: Option<GroupKey>,
    group: Vec<SourceRow>,
    rows_read: u64,
    orphan_rows: u64,
    ungrouped_rows: u64,
}

impl<I> SortedGroupCursor<I>
where
    I: Iterator<Item = EtlResult<SourceRow>>,
{
    pub fn new(rows: I, key_column: usize) -> SortedGroupCursor<I> {
        SortedGroupCursor {
            rows,
            key_column,
            peeked: None,
            last_source_key: None,
            last_request: None,
            group: Vec::new(),
            rows_read: 0,
            orphan_rows: 0,
            ungrouped_rows: 0,
        }
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Child rows skipped because no parent requested their key.
    pub fn orphan_rows(&self) -> u64 {
        self.orphan_rows
    }

    pub fn ungrouped_rows(&self) -> u64 {
        self.ungrouped_rows
    }

    pub fn into_inner(self) -> I {
        self.rows
    }

    /// Reads the rest of the child table, counting it as orphaned.
    pub fn finish(&mut self) -> EtlResult<()> {
        while self.next_keyed()?.is_some() {
            self.orphan_rows += 1;
        }

        Ok(())
    }

    fn next_keyed(&mut self) -> EtlResult<Option<(GroupKey, SourceRow)>> {
        if let Some(peeked) = self.peeked.take() {
            return Ok(Some(peeked));
        }

        for row in self.rows.by_ref() {
            let row = row?;
            self.rows_read += 1;

            let Some(key) = row.key(self.key_column) else {
                self.ungrouped_rows += 1;
                continue;
            };

            if let Some(previous) = &self.last_source_key {
                if key < *previous {
                    bail!(
                        ErrorKind::InvalidData,
                        "Child rows are not sorted by key",
                        format!("key {key} follows {previous}")
                    );
                }
            }
            self.last_source_key = Some(key.clone());

            return Ok(Some((key, row)));
        }

        Ok(None)
    }
}

impl<I> GroupLookup for SortedGroupCursor<I>
where
    I: Iterator<Item = EtlResult<SourceRow>>,
{
    fn group(&mut self, key: &GroupKey) -> EtlResult<Cow<'_, [SourceRow]>> {
        match self.last_request.as_ref().map(|previous| key.cmp(previous)) {
            Some(Ordering::Less) => {
                let previous = self.last_request.as_ref().map(GroupKey::as_str);
                bail!(
                    ErrorKind::InvalidData,
                    "Parent keys are not sorted",
                    format!("key {key} requested after {}", previous.unwrap_or_default())
                );
            }
            // A repeated parent key sees the same children again.
            Some(Ordering::Equal) => return Ok(Cow::Borrowed(&self.group)),
            Some(Ordering::Greater) | None => {}
        }

        self.last_request = Some(key.clone());
        self.group.clear();

        while let Some((row_key, row)) = self.next_keyed()? {
            match row_key.cmp(key) {
                Ordering::Less => self.orphan_rows += 1,
                Ordering::Equal => self.group.push(row),
                Ordering::Greater => {
                    self.peeked = Some((row_key, row));
                    break;
                }
            }
        }

        Ok(Cow::Borrowed(&self.group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::read_grouped;

    fn rows(keys: &[&str]) -> Vec<SourceRow> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| SourceRow::from_fields([key.to_string(), i.to_string()]))
            .collect()
    }

    fn cursor(keys: &[&str]) -> SortedGroupCursor<impl Iterator<Item = EtlResult<SourceRow>>> {
        SortedGroupCursor::new(rows(keys).into_iter().map(Ok), 0)
    }

    fn keys_of(rows: &[SourceRow]) -> Vec<&str> {
        rows.iter().filter_map(|row| row.get(1)).collect()
    }

    #[test]
    fn returns_equal_rows_and_skips_orphans() {
        let mut cursor = cursor(&["1", "2", "2", "4", "5"]);

        assert_eq!(keys_of(&cursor.group(&"2".into()).unwrap()), vec!["1", "2"]);
        assert!(cursor.group(&"3".into()).unwrap().is_empty());
        assert_eq!(keys_of(&cursor.group(&"4".into()).unwrap()), vec!["3"]);
        cursor.finish().unwrap();

        assert_eq!(cursor.orphan_rows(), 2);
        assert_eq!(cursor.rows_read(), 5);
    }

    #[test]
    fn repeated_parent_key_sees_the_same_group() {
        let mut cursor = cursor(&["1", "1", "2"]);

        assert_eq!(cursor.group(&"1".into()).unwrap().len(), 2);
        assert_eq!(cursor.group(&"1".into()).unwrap().len(), 2);
        assert_eq!(cursor.group(&"2".into()).unwrap().len(), 1);
    }

    #[test]
    fn unsorted_child_rows_are_invalid_data() {
        let mut cursor = cursor(&["1", "3", "2"]);

        let err = cursor.group(&"3".into()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn decreasing_requests_are_invalid_data() {
        let mut cursor = cursor(&["1", "2"]);
        cursor.group(&"2".into()).unwrap();

        let err = cursor.group(&"1".into()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn matches_hash_grouping_on_sorted_input() {
        let keys = ["00000001", "00000001", "00000002", "00000004", "00000004", "00000004"];
        let mut hashed = read_grouped(vec![rows(&keys)], 0);
        let mut merged = cursor(&keys);

        for parent in ["00000001", "00000002", "00000003", "00000004"] {
            let key = GroupKey::from(parent);
            let expected = hashed.group(&key).unwrap().into_owned();
            assert_eq!(merged.group(&key).unwrap().into_owned(), expected);
        }
    }
}
