use std::borrow::Borrow;
use std::fmt;

/// One record of a source table, positionally bound to the table's column schema.
///
/// Every value is an optional string at this layer. Empty source fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRow {
    values: Vec<Option<String>>,
}

impl SourceRow {
    pub fn new(values: Vec<Option<String>>) -> SourceRow {
        Self { values }
    }

    /// Builds a row from string fields, mapping empty strings to `None`.
    pub fn from_fields<I, S>(fields: I) -> SourceRow
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = fields
            .into_iter()
            .map(Into::into)
            .map(|field: String| if field.is_empty() { None } else { Some(field) })
            .collect();

        Self { values }
    }

    /// Value at `index`, `None` when null or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|value| value.as_deref())
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Join key held in `column`, if present.
    pub fn key(&self, column: usize) -> Option<GroupKey> {
        self.get(column).map(GroupKey::from)
    }
}

/// Foreign key value joining a child table to its parent.
///
/// Always text: identifiers such as `"00012345"` keep their leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for GroupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_become_null() {
        let row = SourceRow::from_fields(["12345678", "", "ACME"]);

        assert_eq!(row.get(0), Some("12345678"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), Some("ACME"));
        assert_eq!(row.get(3), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn group_keys_keep_leading_zeros() {
        let row = SourceRow::from_fields(["00012345"]);

        assert_eq!(row.key(0).unwrap().as_str(), "00012345");
        assert!(GroupKey::from("00012345") < GroupKey::from("00012346"));
    }
}
