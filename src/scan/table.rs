//! Delimited-table input and output for scans.

use super::store::Scan;
use crate::error::{Error, Result};

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub const EXPORT_COLUMNS: [&str; 8] = [
    "input_product_id",
    "product_name",
    "manufacturer_name",
    "epd_url",
    "epd_issue_date",
    "risk_level",
    "reasons",
    "advisories",
];

/// Split comma-separated text into records. Quoted fields may hold commas,
/// line breaks and doubled quotes.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records.retain(|r| r.iter().any(|f| !f.trim().is_empty()));
    records
}

/// Product ids from an uploaded table. The first row is the header; the id
/// comes from a `product_id` or `id` column (any case), else the first column.
pub fn parse_ids(bytes: &[u8]) -> Result<Vec<String>> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    let mut records = parse_records(&text).into_iter();

    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };
    let lower: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let column = ["product_id", "id"]
        .iter()
        .find_map(|key| lower.iter().position(|h| h == key))
        .unwrap_or(0);

    let ids = records
        .filter_map(|row| row.get(column).map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .collect();
    Ok(ids)
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_row(out: &mut String, fields: &[&str]) {
    let line: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// UTF-8 CSV with a byte-order mark, one row per stored result. Reasons and
/// advisories are written as JSON lists.
pub fn export_csv(scan: &Scan) -> Result<Vec<u8>> {
    let mut out = String::new();
    write_row(&mut out, &EXPORT_COLUMNS);

    for r in &scan.results {
        let reasons = serde_json::to_string(&r.reasons)?;
        let advisories = serde_json::to_string(&r.advisories)?;
        write_row(
            &mut out,
            &[
                r.input_product_id.as_str(),
                r.product_name.as_deref().unwrap_or_default(),
                r.manufacturer_name.as_deref().unwrap_or_default(),
                r.epd_url.as_deref().unwrap_or_default(),
                r.epd_issue_date.as_deref().unwrap_or_default(),
                r.risk_level.label(),
                reasons.as_str(),
                advisories.as_str(),
            ],
        );
    }

    let mut bytes = BOM.to_vec();
    bytes.extend_from_slice(out.as_bytes());
    Ok(bytes)
}

/// Only CSV export exists.
pub fn check_format(format: Option<&str>) -> Result<()> {
    let format = format.unwrap_or("csv").to_lowercase();
    if format == "csv" {
        Ok(())
    } else {
        Err(Error::Validation(format!("Unsupported format: {format}")))
    }
}
