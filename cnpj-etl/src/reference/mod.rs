//! Small code to description tables used to enrich assembled documents.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::bail;
use crate::conversions::code::pad_code;
use crate::error::{ErrorKind, EtlResult};
use crate::source::{CsvDialect, scan_file};

/// The reference tables of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Cnaes,
    Municipios,
    Naturezas,
    Qualificacoes,
    Paises,
    Motivos,
}

impl LookupKind {
    pub const ALL: [LookupKind; 6] = [
        LookupKind::Cnaes,
        LookupKind::Municipios,
        LookupKind::Naturezas,
        LookupKind::Qualificacoes,
        LookupKind::Paises,
        LookupKind::Motivos,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            LookupKind::Cnaes => "cnaes",
            LookupKind::Municipios => "municipios",
            LookupKind::Naturezas => "naturezas",
            LookupKind::Qualificacoes => "qualificacoes",
            LookupKind::Paises => "paises",
            LookupKind::Motivos => "motivos",
        }
    }

    /// Width codes are zero padded to, both when loading and when querying.
    pub fn code_width(&self) -> Option<usize> {
        match self {
            LookupKind::Naturezas => Some(4),
            LookupKind::Qualificacoes | LookupKind::Motivos => Some(2),
            LookupKind::Cnaes | LookupKind::Municipios | LookupKind::Paises => None,
        }
    }

    pub fn normalize_code<'a>(&self, code: &'a str) -> std::borrow::Cow<'a, str> {
        match self.code_width() {
            Some(width) => pad_code(code, width),
            None => std::borrow::Cow::Borrowed(code),
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Immutable code to description map of one reference table.
#[derive(Debug, Clone)]
pub struct Lookup {
    kind: LookupKind,
    entries: HashMap<String, String>,
}

impl Lookup {
    pub fn new(kind: LookupKind) -> Lookup {
        Lookup {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn from_entries<I, C, D>(kind: LookupKind, entries: I) -> Lookup
    where
        I: IntoIterator<Item = (C, D)>,
        C: AsRef<str>,
        D: Into<String>,
    {
        let mut lookup = Lookup::new(kind);
        for (code, description) in entries {
            lookup.insert(code.as_ref(), description.into());
        }
        lookup
    }

    fn insert(&mut self, code: &str, description: String) {
        let code = self.kind.normalize_code(code).into_owned();
        self.entries.insert(code, description);
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    /// Description of `code`, padded the same way codes were padded when loaded.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .get(self.kind.normalize_code(code).as_ref())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every reference table available to the assembler. Missing tables answer `None`.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    tables: HashMap<LookupKind, Lookup>,
}

impl Lookups {
    pub fn new() -> Lookups {
        Lookups::default()
    }

    pub fn insert(&mut self, lookup: Lookup) {
        self.tables.insert(lookup.kind(), lookup);
    }

    pub fn with(mut self, lookup: Lookup) -> Lookups {
        self.insert(lookup);
        self
    }

    pub fn get(&self, kind: LookupKind, code: &str) -> Option<&str> {
        self.tables.get(&kind).and_then(|lookup| lookup.get(code))
    }

    pub fn contains(&self, kind: LookupKind) -> bool {
        self.tables.contains_key(&kind)
    }
}

/// Loads a reference table from its source files. Column 0 is the code, column 1 the
/// description.
///
/// Rows without a code are ignored and a later row wins over an earlier one with the same
/// code. Fails with [`ErrorKind::MissingReference`] when `files` is empty.
pub fn load_lookup(kind: LookupKind, files: &[PathBuf], dialect: CsvDialect) -> EtlResult<Lookup> {
    if files.is_empty() {
        bail!(
            ErrorKind::MissingReference,
            "Reference table has no source files",
            kind
        );
    }

    let mut lookup = Lookup::new(kind);
    for path in files {
        scan_file(path, 2, dialect, |row| {
            let mut values = row.into_values().into_iter();
            if let (Some(Some(code)), Some(description)) = (values.next(), values.next()) {
                lookup.insert(&code, description.unwrap_or_default());
            }
            Ok(())
        })?;
    }

    Ok(lookup)
}
