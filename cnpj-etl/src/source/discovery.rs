use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Lists the source files in `directory` whose name starts with `prefix`, sorted by name.
///
/// Only `.zip` archives and plain delimited extracts are listed, so partial downloads
/// and notes lying next to the extracts are ignored.
///
/// A missing directory is reported as [`ErrorKind::MissingSource`].
pub fn discover_files(directory: &Path, prefix: &str) -> EtlResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory).map_err(|err| {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::MissingSource
        } else {
            ErrorKind::SourceIoError
        };
        etl_error!(
            kind,
            "Listing source directory failed",
            directory.display(),
            source: err
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if matches && is_source_file(&entry.path()) {
            files.push(entry.path());
        }
    }

    files.sort();

    Ok(files)
}

fn is_source_file(path: &Path) -> bool {
    let Some(extension) = path.extension().and_then(|extension| extension.to_str()) else {
        return false;
    };
    let extension = extension.to_ascii_lowercase();

    // Unpacked registry extracts end in `CSV` (`EMPRECSV`, `SOCIOCSV`) except `ESTABELE`.
    extension == "zip" || extension.ends_with("csv") || extension == "estabele"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_matched_by_prefix_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Socios1.zip", "Empresas0.zip", "Socios0.zip", "Simples.zip"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("Socios_extracted")).unwrap();

        let files = discover_files(dir.path(), "Socios").unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Socios0.zip", "Socios1.zip"]);
    }

    #[test]
    fn only_archives_and_extracts_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Empresas0.zip",
            "Empresas0.zip.crdownload",
            "Empresas_notes.txt",
            "Empresas1.ZIP",
            "Empresas2.csv",
            "Empresas3.K03200Y0.D40210.EMPRECSV",
            "Empresas",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = discover_files(dir.path(), "Empresas").unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "Empresas0.zip",
                "Empresas1.ZIP",
                "Empresas2.csv",
                "Empresas3.K03200Y0.D40210.EMPRECSV",
            ]
        );
    }

    #[test]
    fn missing_directory_is_a_missing_source() {
        let dir = tempfile::tempdir().unwrap();

        let err = discover_files(&dir.path().join("nope"), "Empresas").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingSource);
    }
}
