use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use dollar_core::auth::{acquire_credential, Credential, ServiceAccountAuth};
use dollar_core::config::Settings;
use dollar_core::pipeline::{run_daily_update, UpdateOptions};
use dollar_core::rate::{ExchangeRateApiClient, FixedRate, RateSource};
use dollar_core::sheets::GoogleSheetsClient;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dollar_worker")]
struct Args {
    /// Run date (YYYY-MM-DD). Defaults to today's KST date.
    #[arg(long)]
    date: Option<String>,

    /// Record this USD/KRW rate instead of calling the rate API (backfills).
    #[arg(long)]
    rate: Option<f64>,

    /// Do everything except appending to the spreadsheet.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, &args).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "daily rate update failed");
    }
    result
}

/// Configuration resolved before any client is built.
#[derive(Debug)]
struct RunConfig {
    run_date: NaiveDate,
    credential: Credential,
    spreadsheet: String,
    /// `None` when `--rate` replaces the rate API.
    rate_api_url: Option<String>,
}

/// Resolves the run date and every required setting. Touches neither the network nor the
/// sheet, so a `ConfigurationError` always aborts the run before the first request.
fn validate_config(
    settings: &Settings,
    args: &Args,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<RunConfig> {
    let run_date = dollar_core::time::kst::resolve_run_date(args.date.as_deref(), now_utc)?;

    let source = settings.credential_source()?;
    let spreadsheet = settings.require_spreadsheet_id()?.to_string();
    let rate_api_url = match args.rate {
        Some(_) => None,
        None => Some(settings.require_rate_api_url()?),
    };
    let credential = acquire_credential(&source)?;

    Ok(RunConfig {
        run_date,
        credential,
        spreadsheet,
        rate_api_url,
    })
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let RunConfig {
        run_date,
        credential,
        spreadsheet,
        rate_api_url,
    } = validate_config(settings, args, Utc::now())?;

    let http = reqwest_client(settings.http_timeout_secs)?;

    let auth = ServiceAccountAuth::new(http.clone(), credential);
    let store = GoogleSheetsClient::new(http.clone(), auth, &settings.sheets_base_url, &spreadsheet)?;

    tracing::info!(
        %run_date,
        spreadsheet_id = %store.spreadsheet_id(),
        dry_run = args.dry_run,
        "starting daily rate update"
    );

    let rates: Box<dyn RateSource> = match (args.rate, rate_api_url) {
        (Some(rate), _) => Box::new(FixedRate(rate)),
        (None, Some(url)) => Box::new(ExchangeRateApiClient::new(http, url)),
        (None, None) => anyhow::bail!("no rate source configured"),
    };

    let opts = UpdateOptions {
        rawdata_range: settings.rawdata_range.clone(),
        result_range: settings.result_range.clone(),
        window_years: settings.window_years,
        dry_run: args.dry_run,
    };

    let report = run_daily_update(&store, rates.as_ref(), run_date, &opts).await?;

    if report.appended {
        println!("데이터 업데이트 완료: {:?}", report.result_row);
    } else {
        println!("데이터 업데이트 생략 (dry-run): {:?}", report.result_row);
    }
    Ok(())
}

fn reqwest_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build reqwest client")
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
