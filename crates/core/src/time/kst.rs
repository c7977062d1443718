use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Run date for the daily update: an explicit `YYYY-MM-DD`, else today's calendar date in KST.
pub fn resolve_run_date(date_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    if let Some(s) = date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid run date '{s}' (expected YYYY-MM-DD)"));
    }

    let kst = chrono::FixedOffset::east_opt(KST_OFFSET_SECS).context("invalid KST offset")?;
    Ok(now_utc.with_timezone(&kst).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rolls_into_next_kst_day_after_15_utc() {
        // 2026-10-15 16:00 UTC = 2026-10-16 01:00 KST
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 16, 0, 0).unwrap();
        let d = resolve_run_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }

    #[test]
    fn keeps_same_day_before_15_utc() {
        // 2026-10-16 08:00 UTC = 17:00 KST
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let d = resolve_run_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let d = resolve_run_date(Some("2025-03-01"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(resolve_run_date(Some("03/01/2025"), now).is_err());
    }
}
