//! Reading source over the daily append-only row store
//!
//! Each calendar date has its own CSV file with a fixed header and the
//! newest row last. Only the header and the final row are read; the file
//! is scanned backwards from its end so the cost does not grow with the
//! size of the day's data.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::reading::Reading;

/// Bytes read per backwards step when looking for the last line
const TAIL_CHUNK: u64 = 4096;

/// Directory of per-day CSV row stores
#[derive(Debug, Clone)]
pub struct RowStore {
    dir: PathBuf,
}

impl RowStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Row store file for a date
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    /// Most recent reading recorded for `date`
    pub fn latest_reading(&self, date: NaiveDate) -> Result<Reading, SourceError> {
        let path = self.path_for(date);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let mut header_line = String::new();
        let header_len = BufReader::new(&mut file).read_line(&mut header_line)? as u64;
        let header_line = header_line.trim_start_matches('\u{feff}');
        if header_line.trim().is_empty() {
            return Err(SourceError::Empty(path));
        }

        let last_line = read_last_line(&mut file, header_len)?
            .ok_or_else(|| SourceError::Empty(path.clone()))?;

        let headers = parse_record(header_line)?.ok_or_else(|| SourceError::Empty(path.clone()))?;
        let row = parse_record(&last_line)?.ok_or(SourceError::Empty(path))?;

        // Short rows leave the trailing columns absent rather than empty
        let columns = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.trim().to_string(), value.to_string()))
            .collect();

        Reading::from_columns(columns)
    }
}

/// Last non-blank line located at or after byte offset `start`
fn read_last_line(file: &mut File, start: u64) -> Result<Option<String>, std::io::Error> {
    let mut pos = file.metadata()?.len();
    let mut tail: Vec<u8> = Vec::new();

    while pos > start {
        let step = TAIL_CHUNK.min(pos - start);
        pos -= step;

        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;

        let body = trim_line_ends(&tail);
        if let Some(newline) = body.iter().rposition(|&b| b == b'\n') {
            return Ok(Some(String::from_utf8_lossy(&body[newline + 1..]).into_owned()));
        }
    }

    let body = trim_line_ends(&tail);
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(None)
    } else {
        Ok(Some(String::from_utf8_lossy(body).into_owned()))
    }
}

fn trim_line_ends(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map(|i| i + 1)
        .unwrap_or(0);
    &bytes[..end]
}

fn parse_record(line: &str) -> Result<Option<csv::StringRecord>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(Some(record?)),
        None => Ok(None),
    }
}

/// Row store errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No row store at {0}")]
    NotFound(PathBuf),

    #[error("Row store {0} has no rows")]
    Empty(PathBuf),

    #[error("Latest row has no timestamp")]
    MissingTimestamp,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Malformed row: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// True when the pass should just treat the data as unavailable
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, SourceError::Io(_))
    }
}
