//! CSV ingestion: bytes on disk (or stdin) into a [`RawTable`].
//!
//! - **Delimiter resolution**: `.tsv` → tab, otherwise comma, unless overridden.
//! - **Encoding**: fields are decoded with `encoding_rs`, defaulting to UTF-8.
//!   A leading byte-order mark is stripped from the first header.
//! - **stdin**: the `-` path convention reads from standard input.
//! - **Shape**: rows must all have as many fields as the header row.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    data::RawTable,
    error::{DashboardError, Result},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| DashboardError::Ingestion(format!("unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(DashboardError::Ingestion(format!(
            "text is not valid {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, encoding)?;
    if let Some(first) = decoded.first_mut()
        && let Some(stripped) = first.strip_prefix('\u{feff}')
    {
        *first = stripped.to_string();
    }
    Ok(decoded)
}

/// Materializes a whole CSV stream. Ragged rows are rejected by [`RawTable::new`].
pub fn read_raw_table<R>(reader: R, delimiter: u8, encoding: &'static Encoding) -> Result<RawTable>
where
    R: Read,
{
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            DashboardError::Ingestion(format!("reading row {}: {err}", row_idx + 2))
        })?;
        rows.push(decode_record(&record, encoding)?);
    }
    debug!("Read {} row(s) under {} header(s)", rows.len(), headers.len());
    RawTable::new(headers, rows)
}

pub fn read_raw_table_from_path(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable> {
    if is_dash(path) {
        read_raw_table(std::io::stdin().lock(), delimiter, encoding)
    } else {
        let file = File::open(path).map_err(|err| {
            DashboardError::Ingestion(format!("opening input file {path:?}: {err}"))
        })?;
        read_raw_table(BufReader::new(file), delimiter, encoding)
    }
}
