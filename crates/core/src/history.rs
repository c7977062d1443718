use crate::sheets::{Row, SheetStore};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DATE_COLUMN: &str = "Date";
pub const RATE_COLUMN: &str = "dollar";

// Sheets renders dates per the document locale; these cover ISO and the ko-KR defaults.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y. %m. %d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub rate: f64,
}

pub async fn load_history(store: &dyn SheetStore, range: &str) -> Result<Vec<HistoricalRecord>> {
    let rows = store
        .read_all(range)
        .await
        .with_context(|| format!("failed to read history range '{range}'"))?;
    parse_history(&rows).with_context(|| format!("malformed history in range '{range}'"))
}

/// First row is the header; every later non-blank row becomes one record, in sheet order.
pub fn parse_history(rows: &[Row]) -> Result<Vec<HistoricalRecord>> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let date_idx = column_index(header, DATE_COLUMN)?;
    let rate_idx = column_index(header, RATE_COLUMN)?;

    let mut out = Vec::with_capacity(body.len());
    for (i, row) in body.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        // Sheet row number (1-based, after the header).
        let sheet_row = i + 2;

        let date_cell = row.get(date_idx).map(String::as_str).unwrap_or("");
        let rate_cell = row.get(rate_idx).map(String::as_str).unwrap_or("");

        let date = parse_sheet_date(date_cell)
            .with_context(|| format!("row {sheet_row}: invalid {DATE_COLUMN} '{date_cell}'"))?;
        let rate = parse_rate(rate_cell)
            .with_context(|| format!("row {sheet_row}: invalid {RATE_COLUMN} '{rate_cell}'"))?;

        out.push(HistoricalRecord { date, rate });
    }

    Ok(out)
}

fn column_index(header: &Row, name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("header is missing column '{name}' (got {header:?})"))
}

pub fn parse_sheet_date(s: &str) -> Result<NaiveDate> {
    let t = s.trim().trim_end_matches('.');
    anyhow::ensure!(!t.is_empty(), "empty date");

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(dt.date());
        }
    }

    anyhow::bail!("unrecognized date format")
}

pub fn parse_rate(s: &str) -> Result<f64> {
    let t = s.trim();
    anyhow::ensure!(!t.is_empty(), "empty rate");
    let t = strip_thousands_separators(t)?;
    let v = t.parse::<f64>().context("rate is not a number")?;
    anyhow::ensure!(v.is_finite(), "rate is not finite");
    Ok(v)
}

/// Commas are only valid between three-digit groups of the integer part ("1,350.55").
/// A decimal comma such as "1350,55" is rejected rather than read as 135055.
fn strip_thousands_separators(s: &str) -> Result<String> {
    if !s.contains(',') {
        return Ok(s.to_string());
    }
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    anyhow::ensure!(!frac_part.contains(','), "misplaced thousands separator");

    let digits = int_part.strip_prefix('-').unwrap_or(int_part);
    let all_digits = |g: &str| g.bytes().all(|b| b.is_ascii_digit());
    let mut groups = digits.split(',');
    let lead_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && all_digits(g));
    let rest_ok = groups.all(|g| g.len() == 3 && all_digits(g));
    anyhow::ensure!(lead_ok && rest_ok, "misplaced thousands separator");

    Ok(s.replace(',', ""))
}
