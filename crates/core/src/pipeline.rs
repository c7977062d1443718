use crate::error::{EmptyHistoryError, PartialWriteError};
use crate::history::load_history;
use crate::rate::RateSource;
use crate::signal::{self, Snapshot};
use crate::sheets::{Row, SheetStore};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub rawdata_range: String,
    pub result_range: String,
    pub window_years: u32,
    /// Do everything except appending to the sheet.
    pub dry_run: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            rawdata_range: "rawdata".to_string(),
            result_range: "dollar".to_string(),
            window_years: signal::DEFAULT_WINDOW_YEARS,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub snapshot: Snapshot,
    pub result_row: Row,
    pub rawdata_row: Row,
    pub history_len: usize,
    pub window_len: usize,
    pub appended: bool,
}

/// Fetch, load, average, decide, append. Steps run strictly in order; nothing is written
/// unless every read and computation succeeded.
pub async fn run_daily_update(
    store: &dyn SheetStore,
    rates: &dyn RateSource,
    run_date: NaiveDate,
    opts: &UpdateOptions,
) -> anyhow::Result<UpdateReport> {
    let today_rate = rates.fetch_today_rate().await?;
    tracing::info!(%run_date, source = rates.source_name(), today_rate, "fetched today's rate");

    let history = load_history(store, &opts.rawdata_range).await?;
    let window = signal::filter_window(&history, run_date, opts.window_years);
    tracing::info!(
        %run_date,
        store = store.store_name(),
        range = %opts.rawdata_range,
        history_len = history.len(),
        window_len = window.len(),
        window_years = opts.window_years,
        "loaded history"
    );

    let average_rate = signal::average(&window).ok_or_else(|| EmptyHistoryError {
        as_of: run_date,
        window_start: signal::window_start(run_date, opts.window_years),
        history_len: history.len(),
    })?;

    let suggestion = signal::decide(today_rate, average_rate, opts.window_years);
    let snapshot = Snapshot {
        today_date: run_date,
        today_rate,
        average_rate,
        suggestion,
    };
    tracing::info!(
        %run_date,
        today_rate,
        average_rate,
        action = ?snapshot.suggestion.action,
        "computed snapshot"
    );

    let result_row = snapshot.result_row();
    let rawdata_row = snapshot.rawdata_row();

    if opts.dry_run {
        tracing::info!(%run_date, ?result_row, ?rawdata_row, dry_run = true, "skipping appends");
        return Ok(UpdateReport {
            snapshot,
            result_row,
            rawdata_row,
            history_len: history.len(),
            window_len: window.len(),
            appended: false,
        });
    }

    store
        .append_row(&opts.result_range, result_row.clone())
        .await
        .map_err(|e| e.context(format!("append to '{}' failed", opts.result_range)))?;
    tracing::info!(%run_date, range = %opts.result_range, "appended result row");

    if let Err(err) = store
        .append_row(&opts.rawdata_range, rawdata_row.clone())
        .await
    {
        tracing::error!(
            %run_date,
            written = %opts.result_range,
            failed = %opts.rawdata_range,
            error = %err,
            "second append failed after first succeeded"
        );
        return Err(PartialWriteError {
            written_range: opts.result_range.clone(),
            failed_range: opts.rawdata_range.clone(),
            detail: format!("{err:#}"),
        }
        .into());
    }
    tracing::info!(%run_date, range = %opts.rawdata_range, "appended rawdata row");

    Ok(UpdateReport {
        snapshot,
        result_row,
        rawdata_row,
        history_len: history.len(),
        window_len: window.len(),
        appended: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::{ExchangeRateApiClient, FixedRate};
    use crate::signal::Action;
    use crate::sheets::MemorySheetStore;
    use chrono::Duration;
    use httpmock::{Method::GET, MockServer};

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn date_str(d: NaiveDate) -> String {
        d.format("%Y-%m-%d").to_string()
    }

    fn seeded_store() -> MemorySheetStore {
        let t = today();
        let rawdata = vec![
            row(&["Date", "dollar"]),
            vec![date_str(t - Duration::days(1096)), "1200".to_string()],
            vec![date_str(t - Duration::days(730)), "1300".to_string()],
            vec![date_str(t - Duration::days(365)), "1400".to_string()],
        ];
        MemorySheetStore::new()
            .with_range("rawdata", rawdata)
            .with_range("dollar", vec![row(&["date", "rate", "avg", "suggestion"])])
    }

    #[tokio::test]
    async fn end_to_end_appends_one_row_per_range() {
        let store = seeded_store();
        let report = run_daily_update(&store, &FixedRate(1450.0), today(), &UpdateOptions::default())
            .await
            .unwrap();

        assert!(report.appended);
        assert_eq!(report.history_len, 3);
        assert_eq!(report.window_len, 2);
        assert_eq!(report.snapshot.average_rate, 1350.0);
        assert_eq!(report.snapshot.suggestion.action, Action::Wait);
        assert!(report.snapshot.suggestion.text.contains("기다리세요"));
        assert!(report.snapshot.suggestion.text.contains("100.00원"));

        let results = store.rows("dollar");
        assert_eq!(results.len(), 2);
        assert_eq!(results[1][0], "2026-10-16");
        assert_eq!(results[1][1], "1450.00");
        assert_eq!(results[1][2], "1350.00");

        let raw = store.rows("rawdata");
        assert_eq!(raw.len(), 5);
        assert_eq!(raw[4], row(&["2026-10-16", "1450.00"]));
    }

    #[tokio::test]
    async fn same_day_reruns_duplicate_rows() {
        let store = seeded_store();
        let opts = UpdateOptions::default();
        run_daily_update(&store, &FixedRate(1450.0), today(), &opts)
            .await
            .unwrap();
        run_daily_update(&store, &FixedRate(1450.0), today(), &opts)
            .await
            .unwrap();

        let results = store.rows("dollar");
        assert_eq!(results.len(), 3);
        assert_eq!(results[1][..2], results[2][..2]);
        assert_eq!(results[1][2], "1350.00");
        // The second run sees the first run's rawdata row inside its window.
        assert_eq!(results[2][2], "1383.33");

        let raw = store.rows("rawdata");
        assert_eq!(raw.len(), 6);
        assert_eq!(raw[4], row(&["2026-10-16", "1450.00"]));
        assert_eq!(raw[4], raw[5]);
    }

    #[tokio::test]
    async fn upstream_failure_records_zero_rate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(500);
            })
            .await;
        let rates = ExchangeRateApiClient::new(reqwest::Client::new(), server.url("/latest"));

        let store = seeded_store();
        let report = run_daily_update(&store, &rates, today(), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(report.snapshot.today_rate, 0.0);
        assert_eq!(report.snapshot.suggestion.action, Action::Invest);
        assert_eq!(store.rows("dollar")[1][1], "0.00");
        assert_eq!(store.rows("rawdata")[4], row(&["2026-10-16", "0.00"]));
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let store = seeded_store();
        let opts = UpdateOptions {
            dry_run: true,
            ..UpdateOptions::default()
        };
        let report = run_daily_update(&store, &FixedRate(1300.0), today(), &opts)
            .await
            .unwrap();

        assert!(!report.appended);
        assert_eq!(report.result_row[1], "1300.00");
        assert_eq!(store.rows("dollar").len(), 1);
        assert_eq!(store.rows("rawdata").len(), 4);
    }

    #[tokio::test]
    async fn empty_window_aborts_before_writing() {
        let store = MemorySheetStore::new()
            .with_range(
                "rawdata",
                vec![row(&["Date", "dollar"]), row(&["2010-01-01", "1100"])],
            )
            .with_range("dollar", vec![]);

        let err = run_daily_update(&store, &FixedRate(1450.0), today(), &UpdateOptions::default())
            .await
            .unwrap_err();
        let empty = err.downcast_ref::<EmptyHistoryError>().unwrap();
        assert_eq!(empty.history_len, 1);
        assert!(store.rows("dollar").is_empty());
        assert_eq!(store.rows("rawdata").len(), 2);
    }

    #[tokio::test]
    async fn malformed_history_aborts_before_writing() {
        let store = MemorySheetStore::new()
            .with_range(
                "rawdata",
                vec![row(&["Date", "dollar"]), row(&["not-a-date", "1100"])],
            )
            .with_range("dollar", vec![]);

        assert!(
            run_daily_update(&store, &FixedRate(1450.0), today(), &UpdateOptions::default())
                .await
                .is_err()
        );
        assert!(store.rows("dollar").is_empty());
    }

    #[tokio::test]
    async fn second_append_failure_is_a_partial_write() {
        let store = seeded_store();
        store.fail_appends_to("rawdata");

        let err = run_daily_update(&store, &FixedRate(1450.0), today(), &UpdateOptions::default())
            .await
            .unwrap_err();
        let partial = err.downcast_ref::<PartialWriteError>().unwrap();
        assert_eq!(partial.written_range, "dollar");
        assert_eq!(partial.failed_range, "rawdata");

        // The first append stays in place; nothing is rolled back.
        assert_eq!(store.rows("dollar").len(), 2);
        assert_eq!(store.rows("rawdata").len(), 4);
    }

    #[tokio::test]
    async fn first_append_failure_is_not_partial() {
        let store = seeded_store();
        store.fail_appends_to("dollar");

        let err = run_daily_update(&store, &FixedRate(1450.0), today(), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<PartialWriteError>().is_none());
        assert_eq!(store.rows("rawdata").len(), 4);
    }
}
