use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Renders rows the way the registry publishes them: every field quoted, `;` separated,
/// Latin-1 encoded and `\n` terminated.
pub fn registry_lines<R, F>(rows: R) -> Vec<u8>
where
    R: IntoIterator<Item = F>,
    F: AsRef<[&'static str]>,
{
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.as_ref().iter().map(|field| field.to_string()).collect())
        .collect();

    registry_lines_owned(&rows)
}

/// Same as [`registry_lines`] for rows built at runtime.
pub fn registry_lines_owned(rows: &[Vec<String>]) -> Vec<u8> {
    let mut text = String::new();
    for row in rows {
        let fields: Vec<String> = row
            .iter()
            .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
            .collect();
        text.push_str(&fields.join(";"));
        text.push('\n');
    }

    let (encoded, _, had_errors) = WINDOWS_1252.encode(&text);
    assert!(!had_errors, "fixture text is not representable in Latin-1");
    encoded.into_owned()
}

/// Writes `contents` as the single entry of a zip archive at `dir/archive_name`.
pub fn write_zip(dir: &Path, archive_name: &str, contents: &[u8]) -> PathBuf {
    let entry_name = format!("{}.CSV", archive_name.trim_end_matches(".zip"));
    write_zip_entries(dir, archive_name, &[(entry_name.as_str(), contents)])
}

/// Writes a zip archive with arbitrary entries, including invalid layouts.
pub fn write_zip_entries(dir: &Path, archive_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(archive_name);
    let file = File::create(&path).expect("failed to create fixture archive");
    let mut writer = ZipWriter::new(file);

    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("failed to start archive entry");
        writer
            .write_all(contents)
            .expect("failed to write archive entry");
    }

    writer.finish().expect("failed to finish fixture archive");
    path
}

pub fn write_plain(dir: &Path, file_name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).expect("failed to write fixture file");
    path
}

/// An `estabelecimentos` row with the given identity and every other field empty, apart
/// from a few commonly asserted ones.
pub fn establishment_row(base: &str, order: &str, dv: &str, headquarters: bool) -> Vec<String> {
    let mut row = vec![String::new(); 30];
    row[0] = base.to_string();
    row[1] = order.to_string();
    row[2] = dv.to_string();
    row[3] = if headquarters { "1" } else { "2" }.to_string();
    row[5] = "02".to_string();
    row[10] = "20150101".to_string();
    row
}
