//! Tabular export of normalized records.

use std::path::Path;

use courier_core::write_bytes_atomic;
use tracing::info;

use crate::{ArchiveError, NormalizedRecord};

pub const CSV_HEADER: [&str; 4] = ["timestamp", "author", "text", "attachments"];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Prefix the file with a UTF-8 byte-order mark so spreadsheet tools detect the encoding.
    pub byte_order_mark: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            byte_order_mark: true,
        }
    }
}

/// Serializes `records` as a header row plus one row per record.
pub fn render_csv(records: &[NormalizedRecord], options: CsvOptions) -> Result<Vec<u8>, ArchiveError> {
    let mut buffer = Vec::new();
    if options.byte_order_mark {
        buffer.extend_from_slice(UTF8_BOM);
    }
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(buffer);
    writer.write_record(CSV_HEADER)?;
    for record in records {
        let attachments = record
            .attachments
            .iter()
            .map(|attachment| attachment.link_url.as_str())
            .filter(|url| !url.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_record([
            record.csv_timestamp.as_str(),
            record.author.as_str(),
            record.text.as_str(),
            attachments.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|error| ArchiveError::io("failed to flush csv export", error.into_error()))
}

/// Writes the CSV export to `path` atomically and returns the number of bytes written.
pub fn write_csv(
    path: &Path,
    records: &[NormalizedRecord],
    options: CsvOptions,
) -> Result<u64, ArchiveError> {
    let bytes = render_csv(records, options)?;
    write_bytes_atomic(path, &bytes).map_err(ArchiveError::Storage)?;
    info!(
        path = %path.display(),
        rows = records.len(),
        bytes = bytes.len(),
        "wrote csv export"
    );
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{render_csv, write_csv, CsvOptions, CSV_HEADER};
    use crate::{AttachmentRecord, NormalizedRecord, RecordKind};

    fn record(sequence: usize, text: &str, links: &[&str]) -> NormalizedRecord {
        NormalizedRecord {
            sequence,
            ts: format!("{sequence}.0"),
            csv_timestamp: format!("2024-01-0{sequence} 09:00AM"),
            display_timestamp: format!("01/0{sequence}/2024 at 09:00 AM"),
            author: "Ada Lovelace".to_string(),
            kind: RecordKind::Message,
            text: text.to_string(),
            attachments: links
                .iter()
                .enumerate()
                .map(|(index, link)| AttachmentRecord {
                    filename: format!("file{index}.txt"),
                    mimetype: Some("text/plain".to_string()),
                    link_url: link.to_string(),
                    download_url: None,
                    is_image: false,
                })
                .collect(),
        }
    }

    fn read_rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(body)
            .records()
            .map(|row| {
                row.expect("csv row")
                    .iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn functional_render_csv_emits_header_and_one_row_per_record() {
        let records = vec![
            record(1, "first line\nsecond line", &[]),
            record(2, "quote \"this\", please", &["https://a", "https://b"]),
            record(3, "", &["https://c"]),
        ];
        let bytes = render_csv(&records, CsvOptions::default()).expect("render");
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));

        let rows = read_rows(&bytes);
        assert_eq!(rows.len(), records.len() + 1);
        assert_eq!(rows[0], CSV_HEADER.map(str::to_string).to_vec());
        assert_eq!(rows[1][2], "first line\nsecond line");
        assert_eq!(rows[2][2], "quote \"this\", please");
        assert_eq!(rows[2][3], "https://a https://b");
        assert_eq!(rows[3][0], "2024-01-03 09:00AM");
    }

    #[test]
    fn unit_render_csv_without_records_is_header_only() {
        let bytes = render_csv(
            &[],
            CsvOptions {
                byte_order_mark: false,
            },
        )
        .expect("render");
        assert_eq!(bytes, b"timestamp,author,text,attachments\r\n");
    }

    #[test]
    fn regression_write_csv_is_byte_identical_across_runs() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("general.csv");
        let records = vec![record(1, "hello", &["https://a"])];

        let first_len = write_csv(&path, &records, CsvOptions::default()).expect("first");
        let first = std::fs::read(&path).expect("read first");
        let second_len = write_csv(&path, &records, CsvOptions::default()).expect("second");
        let second = std::fs::read(&path).expect("read second");
        assert_eq!(first, second);
        assert_eq!(first_len, second_len);
        assert_eq!(first_len, first.len() as u64);

        let leftovers = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
