use crate::normalize::normalize_value;
use crate::record::AttributeRecord;
use anyhow::{Context, Result};
use csv::Writer;
use log::{error, info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        path: PathBuf,
        rows_written: usize,
        rows_skipped: usize,
    },
    /// Nothing was fetched; no directory or file was created.
    NoData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStats {
    pub rows_written: usize,
    pub rows_skipped: usize,
}

/// Writes the fetched dataset as a single CSV file in schema column order.
pub struct DatasetWriter {
    output_dir: PathBuf,
    file_name: String,
}

impl DatasetWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P, file_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            file_name: file_name.into(),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Fails only when the destination cannot be created or flushed. Rows that
    /// cannot be written are logged and skipped.
    pub fn write(&self, records: &[AttributeRecord], columns: &[&str]) -> Result<WriteOutcome> {
        if records.is_empty() {
            warn!("No data was retrieved from the API.");
            return Ok(WriteOutcome::NoData);
        }

        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory: {}", self.output_dir.display()))?;

        let file_path = self.file_path();
        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create output file: {}", file_path.display()))?;

        let mut sink = BufWriter::new(file);
        let header = encode_row(columns)
            .with_context(|| format!("Failed to encode header for: {}", file_path.display()))?;
        sink.write_all(&header)
            .with_context(|| format!("Failed to write header to: {}", file_path.display()))?;

        let stats = write_rows(&mut sink, records, columns);

        sink
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", file_path.display()))?;

        info!("Data saved to {} ({} rows)", file_path.display(), stats.rows_written);
        if stats.rows_skipped > 0 {
            warn!("{} rows could not be written and were skipped", stats.rows_skipped);
        }

        Ok(WriteOutcome::Written {
            path: file_path,
            rows_written: stats.rows_written,
            rows_skipped: stats.rows_skipped,
        })
    }
}

/// One cell per column, in column order.
pub fn format_row(record: &AttributeRecord, columns: &[&str]) -> Vec<String> {
    columns
        .iter()
        .map(|column| normalize_value(column, record.get(column)))
        .collect()
}

/// Encodes a single CSV line, quoting fields as needed.
fn encode_row<I, T>(fields: I) -> csv::Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut encoder = Writer::from_writer(Vec::new());
    encoder.write_record(fields)?;
    encoder.into_inner().map_err(|e| e.into_error().into())
}

/// Writes one row per record. Each row is encoded on its own and handed to
/// `sink` in a single `write_all`; a failed row is logged and the rest continue.
pub fn write_rows<W: Write>(sink: &mut W, records: &[AttributeRecord], columns: &[&str]) -> RowStats {
    let mut stats = RowStats::default();
    for record in records {
        let row = format_row(record, columns);
        let result = encode_row(&row).and_then(|line| sink.write_all(&line).map_err(csv::Error::from));
        match result {
            Ok(()) => stats.rows_written += 1,
            Err(e) => {
                error!("Error writing record to CSV: {}", e);
                stats.rows_skipped += 1;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CANONICAL_COLUMNS;
    use crate::record::AttributeValue;
    use std::io;

    fn record(fields: &[(&str, AttributeValue)]) -> AttributeRecord {
        fields.iter().cloned().collect()
    }

    fn read_back(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn empty_dataset_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("data");
        let writer = DatasetWriter::new(&output_dir, "out.csv");

        let outcome = writer.write(&[], &CANONICAL_COLUMNS).unwrap();
        assert_eq!(outcome, WriteOutcome::NoData);
        assert!(!output_dir.exists());
    }

    #[test]
    fn header_is_schema_regardless_of_record_keys() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path().join("nested/data"), "out.csv");
        let records = vec![
            record(&[("Extra", AttributeValue::Text("x".into()))]),
            record(&[("Zip", AttributeValue::Number(40203.0)), ("Dir", AttributeValue::Text("N".into()))]),
        ];

        let outcome = writer.write(&records, &CANONICAL_COLUMNS).unwrap();
        let path = match outcome {
            WriteOutcome::Written { path, rows_written, rows_skipped } => {
                assert_eq!(rows_written, 2);
                assert_eq!(rows_skipped, 0);
                path
            }
            WriteOutcome::NoData => panic!("expected a file"),
        };

        let rows = read_back(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        for row in &rows {
            assert_eq!(row.len(), CANONICAL_COLUMNS.len());
        }
        assert!(rows[1].iter().all(String::is_empty));
        assert_eq!(rows[2][1], "N");
        assert_eq!(rows[2][5], "40203");
    }

    #[test]
    fn rewriting_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path(), "out.csv");
        let records = vec![record(&[("ObjectId", AttributeValue::Number(1.0))])];

        writer.write(&records, &["ObjectId"]).unwrap();
        writer.write(&records, &["ObjectId"]).unwrap();

        assert_eq!(read_back(&writer.file_path()), vec![vec!["ObjectId".to_string()], vec!["1".to_string()]]);
    }

    #[test]
    fn embedded_delimiters_are_quoted() {
        let records = vec![record(&[
            ("Case_Style", AttributeValue::Text("BANK, N.A. VS SMITH".into())),
            ("Purchaser", AttributeValue::Text("say \"hi\"".into())),
        ])];
        let mut sink = Vec::new();
        write_rows(&mut sink, &records, &["Case_Style", "Purchaser"]);
        let output = String::from_utf8(sink).unwrap();
        assert_eq!(output, "\"BANK, N.A. VS SMITH\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let writer = DatasetWriter::new(blocker.join("data"), "out.csv");
        let records = vec![record(&[("ObjectId", AttributeValue::Number(1.0))])];
        assert!(writer.write(&records, &["ObjectId"]).is_err());
    }

    /// Fails exactly one `write` call (1-based); every other call is kept.
    struct FailOnCall {
        fail_on: usize,
        calls: usize,
        written: Vec<u8>,
    }

    impl Write for FailOnCall {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_row_is_skipped_without_corrupting_later_rows() {
        let columns = ["Case_Style", "Purchaser", "ObjectId"];
        let records: Vec<AttributeRecord> = (0..4)
            .map(|i| {
                record(&[
                    ("Case_Style", AttributeValue::Text("x".repeat(5_000))),
                    ("Purchaser", AttributeValue::Text(format!("BUYER {i}"))),
                    ("ObjectId", AttributeValue::Number(f64::from(i))),
                ])
            })
            .collect();

        let mut sink = FailOnCall { fail_on: 2, calls: 0, written: Vec::new() };
        let stats = write_rows(&mut sink, &records, &columns);
        assert_eq!(stats, RowStats { rows_written: 3, rows_skipped: 1 });

        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(sink.written.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == columns.len()));
        let ids: Vec<&str> = rows.iter().map(|row| &row[2]).collect();
        assert_eq!(ids, vec!["0", "2", "3"]);
    }

    #[test]
    fn format_row_applies_normalizer_per_column() {
        let r = record(&[
            ("Sale_Date", AttributeValue::Number(1_615_766_400_000.0)),
            ("Action_Filed", AttributeValue::Number(0.0)),
            ("Purchaser", AttributeValue::Text("<nil>".into())),
            ("Sale_Price", AttributeValue::Number(125000.0)),
        ]);
        let row = format_row(&r, &["Sale_Date", "Action_Filed", "Purchaser", "Sale_Price", "Zip"]);
        assert_eq!(row, vec!["2021/03/15 00:00:00+00", "", "", "125000", ""]);
    }
}
