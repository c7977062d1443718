use crate::history::HistoricalRecord;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_YEARS: u32 = 3;

// Fixed-length years; leap days are deliberately not accounted for.
const DAYS_PER_YEAR: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Wait,
    Invest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: Action,
    pub text: String,
}

/// One run's computation. Only its fields reach the sheet, as the two appended rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub today_date: NaiveDate,
    pub today_rate: f64,
    pub average_rate: f64,
    pub suggestion: Suggestion,
}

impl Snapshot {
    pub fn result_row(&self) -> Vec<String> {
        vec![
            format_date(self.today_date),
            format!("{:.2}", self.today_rate),
            format!("{:.2}", self.average_rate),
            self.suggestion.text.clone(),
        ]
    }

    pub fn rawdata_row(&self) -> Vec<String> {
        vec![format_date(self.today_date), format!("{:.2}", self.today_rate)]
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn window_start(as_of: NaiveDate, years: u32) -> NaiveDate {
    as_of - Duration::days(DAYS_PER_YEAR * i64::from(years))
}

/// Records dated on or after `as_of - years * 365 days`, in their original order.
pub fn filter_window(
    records: &[HistoricalRecord],
    as_of: NaiveDate,
    years: u32,
) -> Vec<&HistoricalRecord> {
    let start = window_start(as_of, years);
    records.iter().filter(|r| r.date >= start).collect()
}

/// Arithmetic mean of `rate`; `None` for an empty set.
pub fn average(records: &[&HistoricalRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let sum: f64 = records.iter().map(|r| r.rate).sum();
    Some(sum / records.len() as f64)
}

/// Wait only when today is strictly above the average; ties invest.
pub fn decide(today_rate: f64, avg_rate: f64, window_years: u32) -> Suggestion {
    let difference = today_rate - avg_rate;
    if today_rate > avg_rate {
        Suggestion {
            action: Action::Wait,
            text: format!(
                "기다리세요. {difference:.2}원 높습니다. 오늘 가격: {today_rate:.2}원, {window_years}년 평균: {avg_rate:.2}원"
            ),
        }
    } else {
        Suggestion {
            action: Action::Invest,
            text: format!(
                "투자하세요. {:.2}원 낮습니다. 오늘 가격: {today_rate:.2}원, {window_years}년 평균: {avg_rate:.2}원",
                difference.abs()
            ),
        }
    }
}
