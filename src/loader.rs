use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PaylensError, Result};
use crate::models::{Table, Transaction};

pub const BRAND_COLUMN: &str = "Brand";
pub const CARRIER_COLUMN: &str = "Carrier";
pub const SERVICE_COLUMN: &str = "CarrierService";
pub const AMOUNT_COLUMN: &str = "Amount";
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "CreatedAt";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[default]
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).ok()
            }
            // Every byte maps to the code point of the same value.
            Self::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf-8"),
            Self::Latin1 => write!(f, "latin-1"),
        }
    }
}

impl FromStr for Encoding {
    type Err = PaylensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            _ => Err(PaylensError::UnknownEncoding(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub encoding: Encoding,
    pub timestamp_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %I:%M:%S %p",
    "%d-%m-%Y %I:%M %p",
    "%d.%m.%Y %I:%M:%S %p",
    "%d.%m.%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

/// Parse a timestamp, reading ambiguous numeric dates day-first.
/// Returns `None` for anything unrecognised, and for instants outside the
/// range of nanoseconds since the epoch held in an `i64` (about 1677 to 2262).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_any_format(raw).filter(|ts| ts.and_utc().timestamp_nanos_opt().is_some())
}

fn parse_any_format(raw: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_local())
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| -v);
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

struct ColumnIndex {
    timestamp: usize,
    brand: usize,
    carrier: usize,
    service: usize,
    amount: usize,
}

fn find_column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| PaylensError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })
}

/// Load the whole payment file into memory.
pub fn load_transactions(path: &Path, opts: &LoadOptions) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    let records = read_transactions(std::io::BufReader::new(file), path, opts)?;
    let table = Table {
        path: path.to_path_buf(),
        records,
    };
    info!(
        path = %path.display(),
        rows = table.records.len(),
        null_timestamps = table.null_timestamps(),
        "loaded transactions"
    );
    Ok(table)
}

/// Parse transactions from any reader. `path` is only used in error messages.
pub fn read_transactions<R: Read>(
    mut reader: R,
    path: &Path,
    opts: &LoadOptions,
) -> Result<Vec<Transaction>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let content = opts.encoding.decode(&bytes).ok_or_else(|| PaylensError::Decode {
        encoding: opts.encoding.to_string(),
        path: path.to_path_buf(),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    let idx = ColumnIndex {
        timestamp: find_column(&headers, &opts.timestamp_column, path)?,
        brand: find_column(&headers, BRAND_COLUMN, path)?,
        carrier: find_column(&headers, CARRIER_COLUMN, path)?,
        service: find_column(&headers, SERVICE_COLUMN, path)?,
        amount: find_column(&headers, AMOUNT_COLUMN, path)?,
    };

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let created_at = parse_timestamp(field(idx.timestamp));
        if created_at.is_none() {
            debug!(line = line + 2, raw = field(idx.timestamp), "unparseable timestamp");
        }
        rows.push(Transaction::new(
            created_at,
            field(idx.brand),
            field(idx.carrier),
            field(idx.service),
            parse_amount(field(idx.amount)),
        ));
    }
    Ok(rows)
}
