//! Content extraction for scan targets.
//!
//! Readers turn a target into one blob of text for the term matcher. A
//! reader failure is an ordinary [`ReadError`] value: the scanner records it
//! on the file's row and moves on.

use std::{collections::HashMap, path::Path};

use calamine::{Data, Range, Reader as _};

use crate::walker::TargetType;

/// Pages of a PDF read before the rest is ignored.
pub const MAX_PDF_PAGES: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Excel(#[from] calamine::Error),

    #[error("{0}")]
    Pdf(#[from] lopdf::Error),

    #[error("malformed {format} file: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },
}

/// Limits shared by every reader.
#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub max_rows: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self { max_rows: 100_000 }
    }
}

pub trait Reader: Send + Sync {
    fn read(&self, path: &Path, limits: ReadLimits) -> Result<String, ReadError>;
}

/// Target type -> reader lookup.
pub struct ReaderRegistry {
    readers: HashMap<TargetType, Box<dyn Reader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ReaderRegistry {
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registry with a reader for every file format the walker yields.
    /// Geodatabases have no reader and match on their path only.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(TargetType::Csv, CsvReader);
        registry.register(TargetType::Excel, ExcelReader);
        registry.register(TargetType::Pdf, PdfReader);
        registry.register(TargetType::Gpx, TextReader);
        registry.register(TargetType::Shapefile, DbfReader);
        registry
    }

    pub fn register(&mut self, target_type: TargetType, reader: impl Reader + 'static) {
        self.readers.insert(target_type, Box::new(reader));
    }

    pub fn get(&self, target_type: TargetType) -> Option<&dyn Reader> {
        self.readers.get(&target_type).map(|r| r.as_ref())
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.readers.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("ReaderRegistry").field("types", &types).finish()
    }
}

/// Whole file as text; invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone, Copy)]
pub struct TextReader;

impl Reader for TextReader {
    fn read(&self, path: &Path, _limits: ReadLimits) -> Result<String, ReadError> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Delimited table: column names followed by the values of every text
/// column. Columns whose non-empty cells are all numeric contribute only
/// their name.
#[derive(Debug, Clone, Copy)]
pub struct CsvReader;

impl Reader for CsvReader {
    fn read(&self, path: &Path, limits: ReadLimits) -> Result<String, ReadError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut rows = 0;
        for record in reader.byte_records() {
            if rows >= limits.max_rows {
                break;
            }
            // Unparseable lines are dropped, the rest of the table survives.
            let Ok(record) = record else {
                continue;
            };
            rows += 1;
            for (idx, field) in record.iter().enumerate().take(headers.len()) {
                let value = String::from_utf8_lossy(field).trim().to_string();
                if !value.is_empty() {
                    columns[idx].push(value);
                }
            }
        }

        Ok(table_text(&headers, &columns))
    }
}

/// Spreadsheet workbook (xlsx or xls). Every sheet contributes its name, its
/// column names and the values of its text columns. A sheet that cannot be
/// read is skipped.
#[derive(Debug, Clone, Copy)]
pub struct ExcelReader;

impl Reader for ExcelReader {
    fn read(&self, path: &Path, limits: ReadLimits) -> Result<String, ReadError> {
        let mut workbook = calamine::open_workbook_auto(path)?;
        let mut parts = Vec::new();
        for name in workbook.sheet_names() {
            match workbook.worksheet_range(&name) {
                Ok(range) => parts.push(sheet_text(&name, &range, limits)),
                Err(e) => tracing::debug!("skipping sheet {name} of {}: {e}", path.display()),
            }
        }
        Ok(parts.join(" "))
    }
}

/// First row holds the column names; at most `max_rows` data rows follow.
fn sheet_text(name: &str, range: &Range<Data>, limits: ReadLimits) -> String {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for row in rows.take(limits.max_rows) {
        for (idx, cell) in row.iter().enumerate().take(headers.len()) {
            let value = cell.to_string().trim().to_string();
            if !value.is_empty() {
                columns[idx].push(value);
            }
        }
    }

    let table = table_text(&headers, &columns);
    if table.is_empty() {
        name.to_string()
    } else {
        format!("{name} {table}")
    }
}

/// Text of the first [`MAX_PDF_PAGES`] pages. Pages without extractable
/// text are skipped; a file that does not parse as PDF is a read error.
#[derive(Debug, Clone, Copy)]
pub struct PdfReader;

impl Reader for PdfReader {
    fn read(&self, path: &Path, _limits: ReadLimits) -> Result<String, ReadError> {
        let document = lopdf::Document::load(path)?;
        let mut parts = Vec::new();
        for &page in document.get_pages().keys().take(MAX_PDF_PAGES as usize) {
            match document.extract_text(&[page]) {
                Ok(text) if !text.trim().is_empty() => parts.push(text),
                Ok(_) => {}
                Err(e) => tracing::debug!("no text on page {page} of {}: {e}", path.display()),
            }
        }
        Ok(parts.join(" "))
    }
}

/// Shapefile attribute table, read from the `.dbf` sidecar next to the
/// `.shp`. Only character fields contribute values.
#[derive(Debug, Clone, Copy)]
pub struct DbfReader;

const DBF_HEADER_LEN: usize = 32;
const DBF_FIELD_DESCRIPTOR_LEN: usize = 32;
const DBF_DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const DBF_DELETED_FLAG: u8 = b'*';

struct DbfField {
    name: String,
    kind: u8,
    len: usize,
}

impl Reader for DbfReader {
    fn read(&self, path: &Path, limits: ReadLimits) -> Result<String, ReadError> {
        let dbf_path = sidecar_path(path, "dbf").ok_or_else(|| {
            ReadError::Malformed {
                format: "shapefile",
                reason: "no .dbf attribute table next to the .shp".into(),
            }
        })?;
        let bytes = std::fs::read(dbf_path)?;
        parse_dbf(&bytes, limits)
    }
}

/// Find `<stem>.<ext>` beside `path`, accepting either letter case.
fn sidecar_path(path: &Path, ext: &str) -> Option<std::path::PathBuf> {
    [ext.to_lowercase(), ext.to_uppercase()]
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

fn parse_dbf(bytes: &[u8], limits: ReadLimits) -> Result<String, ReadError> {
    let malformed = |reason: &str| ReadError::Malformed {
        format: "dbf",
        reason: reason.to_string(),
    };

    if bytes.len() < DBF_HEADER_LEN {
        return Err(malformed("truncated header"));
    }
    let record_count =
        u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

    let mut fields = Vec::new();
    let mut offset = DBF_HEADER_LEN;
    while offset < header_len.min(bytes.len())
        && bytes[offset] != DBF_DESCRIPTOR_TERMINATOR
    {
        let Some(desc) = bytes.get(offset..offset + DBF_FIELD_DESCRIPTOR_LEN)
        else {
            return Err(malformed("truncated field descriptor"));
        };
        let name_end = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
        fields.push(DbfField {
            name: String::from_utf8_lossy(&desc[..name_end]).trim().to_string(),
            kind: desc[11],
            len: desc[16] as usize,
        });
        offset += DBF_FIELD_DESCRIPTOR_LEN;
    }

    let expected_len = 1 + fields.iter().map(|f| f.len).sum::<usize>();
    if record_len < expected_len {
        return Err(malformed("record length shorter than its fields"));
    }

    let headers: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); fields.len()];

    let mut rows = 0;
    for idx in 0..record_count {
        if rows >= limits.max_rows {
            break;
        }
        let start = header_len + idx * record_len;
        let Some(record) = bytes.get(start..start + record_len) else {
            break;
        };
        if record[0] == DBF_DELETED_FLAG {
            continue;
        }
        rows += 1;

        let mut pos = 1;
        for (col, field) in fields.iter().enumerate() {
            let raw = &record[pos..pos + field.len];
            pos += field.len;
            if field.kind != b'C' {
                continue;
            }
            let value = String::from_utf8_lossy(raw).trim().to_string();
            if !value.is_empty() {
                columns[col].push(value);
            }
        }
    }

    // Non-character columns were never collected, so every column is
    // emitted as "text" and numeric ones contribute their name only.
    Ok(table_text(&headers, &columns))
}

/// Join column names and text column values into one space-separated blob.
fn table_text(headers: &[String], columns: &[Vec<String>]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for (header, values) in headers.iter().zip(columns) {
        parts.push(header);
        if values.iter().all(|v| v.parse::<f64>().is_ok()) {
            continue;
        }
        parts.extend(values.iter().map(String::as_str));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbf_bytes(fields: &[(&str, u8, u8)], rows: &[(&[u8], bool)]) -> Vec<u8> {
        let header_len = DBF_HEADER_LEN + fields.len() * DBF_FIELD_DESCRIPTOR_LEN + 1;
        let record_len = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

        let mut out = vec![0u8; DBF_HEADER_LEN];
        out[0] = 0x03;
        out[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
        out[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        out[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

        for (name, kind, len) in fields {
            let mut desc = [0u8; DBF_FIELD_DESCRIPTOR_LEN];
            desc[..name.len()].copy_from_slice(name.as_bytes());
            desc[11] = *kind;
            desc[16] = *len;
            out.extend_from_slice(&desc);
        }
        out.push(DBF_DESCRIPTOR_TERMINATOR);

        for (data, deleted) in rows {
            out.push(if *deleted { DBF_DELETED_FLAG } else { b' ' });
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn csv_reader_keeps_text_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sightings.csv");
        std::fs::write(
            &path,
            "Species,Count,Site\nDugong,3,Sharma\nTurtle,1,\n",
        )
        .unwrap();

        let text = CsvReader.read(&path, ReadLimits::default()).unwrap();
        assert_eq!(text, "Species Dugong Turtle Count Site Sharma");
    }

    #[test]
    fn csv_reader_respects_row_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.csv");
        std::fs::write(&path, "name\nfirst\nsecond\nthird\n").unwrap();

        let text = CsvReader.read(&path, ReadLimits { max_rows: 2 }).unwrap();
        assert_eq!(text, "name first second");
    }

    #[test]
    fn csv_reader_tolerates_ragged_rows_and_latin1() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("odd.csv");
        let mut data = b"a,b\nx\ny,z,extra\n".to_vec();
        data.extend_from_slice(b"caf\xe9,w\n");
        std::fs::write(&path, data).unwrap();

        let text = CsvReader.read(&path, ReadLimits::default()).unwrap();
        assert!(text.starts_with("a x y caf"));
        assert!(text.ends_with("b z w"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CsvReader
            .read(&tmp.path().join("gone.csv"), ReadLimits::default())
            .unwrap_err();
        assert!(matches!(err, ReadError::Csv(_)));
    }

    #[test]
    fn text_reader_is_lossy() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("track.gpx");
        std::fs::write(&path, b"<name>Dugong \xff track</name>").unwrap();

        let text = TextReader.read(&path, ReadLimits::default()).unwrap();
        assert!(text.contains("Dugong"));
        assert!(text.contains("track"));
    }

    #[test]
    fn dbf_reader_extracts_character_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let shp = tmp.path().join("layer.shp");
        std::fs::write(&shp, b"").unwrap();
        let bytes = dbf_bytes(
            &[("SPECIES", b'C', 8), ("N", b'N', 3)],
            &[
                (&b"Dugong    1"[..], false),
                (&b"Turtle    2"[..], true),
                (&b"Osprey   12"[..], false),
            ],
        );
        std::fs::write(tmp.path().join("layer.dbf"), bytes).unwrap();

        let text = DbfReader.read(&shp, ReadLimits::default()).unwrap();
        assert_eq!(text, "SPECIES Dugong Osprey N");
    }

    #[test]
    fn dbf_reader_without_sidecar_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let shp = tmp.path().join("lonely.shp");
        std::fs::write(&shp, b"").unwrap();

        let err = DbfReader.read(&shp, ReadLimits::default()).unwrap_err();
        assert!(matches!(err, ReadError::Malformed { .. }));
    }

    #[test]
    fn dbf_truncated_header_is_malformed() {
        let err = parse_dbf(&[0u8; 10], ReadLimits::default()).unwrap_err();
        assert!(err.to_string().contains("truncated header"));
    }

    #[test]
    fn builtin_registry_covers_file_formats() {
        let registry = ReaderRegistry::with_builtin();
        for target_type in [
            TargetType::Csv,
            TargetType::Excel,
            TargetType::Pdf,
            TargetType::Gpx,
            TargetType::Shapefile,
        ] {
            assert!(registry.get(target_type).is_some(), "{target_type}");
        }
        assert!(registry.get(TargetType::Geodatabase).is_none());
    }

    #[test]
    fn sheet_text_keeps_name_headers_and_text_columns() {
        let mut range = Range::new((0, 0), (3, 2));
        for (col, header) in ["Species", "Count", "Site"].into_iter().enumerate() {
            range.set_value((0, col as u32), Data::String(header.into()));
        }
        range.set_value((1, 0), Data::String("Dugong".into()));
        range.set_value((1, 1), Data::Float(3.0));
        range.set_value((1, 2), Data::String(" Sharma ".into()));
        range.set_value((2, 0), Data::String("Green turtle".into()));
        range.set_value((2, 1), Data::Int(12));
        range.set_value((3, 0), Data::String("Osprey".into()));

        let limits = ReadLimits { max_rows: 2 };
        assert_eq!(
            sheet_text("Aerial 2023", &range, limits),
            "Aerial 2023 Species Dugong Green turtle Count Site Sharma"
        );
    }

    #[test]
    fn empty_sheet_contributes_its_name() {
        let range: Range<Data> = Range::empty();
        assert_eq!(sheet_text("Notes", &range, ReadLimits::default()), "Notes");
    }

    #[test]
    fn corrupt_workbook_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dugong.xlsx");
        std::fs::write(&path, "not a zip archive").unwrap();
        assert!(ExcelReader.read(&path, ReadLimits::default()).is_err());
    }

    #[test]
    fn corrupt_pdf_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.pdf");
        std::fs::write(&path, "%PDF").unwrap();
        let err = PdfReader.read(&path, ReadLimits::default()).unwrap_err();
        assert!(matches!(err, ReadError::Pdf(_)));
    }
}
