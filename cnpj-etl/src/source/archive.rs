use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::error::{ErrorKind, EtlResult};
use crate::{bail, etl_error};

/// Opens a source file and hands its delimited content to `read`.
///
/// Files with a `.zip` extension must hold exactly one regular entry, which is read in
/// place without extracting it to disk. Anything else is read as a plain delimited file.
pub fn open_source_file<T, F>(path: &Path, read: F) -> EtlResult<T>
where
    F: FnOnce(&mut dyn Read) -> EtlResult<T>,
{
    let file = File::open(path).map_err(|err| {
        etl_error!(
            ErrorKind::SourceIoError,
            "Opening source file failed",
            path.display(),
            source: err
        )
    })?;

    if !is_zip(path) {
        let mut reader = BufReader::new(file);
        return read(&mut reader);
    }

    let mut archive = ZipArchive::new(BufReader::new(file))?;
    if archive.len() != 1 {
        bail!(
            ErrorKind::ArchiveFormat,
            "Source archive must contain exactly one file",
            format!("{} holds {} entries", path.display(), archive.len())
        );
    }

    let mut entry = archive.by_index(0)?;
    if entry.is_dir() {
        bail!(
            ErrorKind::ArchiveFormat,
            "Source archive entry is a directory",
            format!("{}: {}", path.display(), entry.name())
        );
    }

    read(&mut entry)
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn read_all(path: &Path) -> EtlResult<String> {
        open_source_file(path, |reader| {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            Ok(content)
        })
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn single_entry_archive_is_read_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Paises.zip");
        write_zip(&path, &[("F.K03200$Z.D50913.PAISCSV", "105;BRASIL\n")]);

        assert_eq!(read_all(&path).unwrap(), "105;BRASIL\n");
    }

    #[test]
    fn archive_with_two_entries_is_an_archive_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Paises.zip");
        write_zip(&path, &[("a.csv", "1;A\n"), ("b.csv", "2;B\n")]);

        let err = read_all(&path).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ArchiveFormat);
    }

    #[test]
    fn truncated_archive_is_an_archive_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Paises.zip");
        let mut junk = b"PK\x03\x04".to_vec();
        junk.extend(std::iter::repeat_n(b'x', 256));
        std::fs::write(&path, junk).unwrap();

        let err = read_all(&path).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ArchiveFormat);
    }

    #[test]
    fn plain_files_are_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Paises.csv");
        std::fs::write(&path, "105;BRASIL\n").unwrap();

        assert_eq!(read_all(&path).unwrap(), "105;BRASIL\n");
    }
}
