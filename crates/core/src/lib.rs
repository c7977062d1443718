pub mod auth;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod rate;
pub mod sheets;
pub mod signal;
pub mod time;

pub mod config {
    use crate::auth::CredentialSource;
    use crate::error::ConfigurationError;
    use std::path::PathBuf;

    const DEFAULT_RATE_API_BASE_URL: &str = "https://v6.exchangerate-api.com";
    const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
    const DEFAULT_RAWDATA_RANGE: &str = "rawdata";
    const DEFAULT_RESULT_RANGE: &str = "dollar";
    const DEFAULT_WINDOW_YEARS: u32 = 3;
    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub credentials_file: Option<String>,
        pub credentials_json: Option<String>,
        pub spreadsheet_id: Option<String>,
        pub rate_api_url: Option<String>,
        pub rate_api_base_url: String,
        pub rate_api_key: Option<String>,
        pub sheets_base_url: String,
        pub rawdata_range: String,
        pub result_range: String,
        pub window_years: u32,
        pub http_timeout_secs: u64,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self::from_lookup(|key| std::env::var(key).ok()))
        }

        /// Builds settings from an arbitrary key lookup so tests don't touch process env.
        pub fn from_lookup<F>(lookup: F) -> Self
        where
            F: Fn(&str) -> Option<String>,
        {
            let window_years = lookup("HISTORY_WINDOW_YEARS")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(DEFAULT_WINDOW_YEARS);

            let http_timeout_secs = lookup("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

            Self {
                credentials_file: lookup("GOOGLE_APPLICATION_CREDENTIALS"),
                credentials_json: lookup("GOOGLE_CREDENTIALS_JSON"),
                spreadsheet_id: lookup("SPREADSHEET_ID"),
                rate_api_url: lookup("RATE_API_URL"),
                rate_api_base_url: non_blank(lookup("RATE_API_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_RATE_API_BASE_URL.to_string()),
                rate_api_key: lookup("RATE_API_KEY"),
                sheets_base_url: non_blank(lookup("SHEETS_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_SHEETS_BASE_URL.to_string()),
                rawdata_range: non_blank(lookup("RAWDATA_RANGE"))
                    .unwrap_or_else(|| DEFAULT_RAWDATA_RANGE.to_string()),
                result_range: non_blank(lookup("RESULT_RANGE"))
                    .unwrap_or_else(|| DEFAULT_RESULT_RANGE.to_string()),
                window_years,
                http_timeout_secs,
                sentry_dsn: lookup("SENTRY_DSN"),
            }
        }

        /// Exactly one of the two credential variables must carry a value.
        pub fn credential_source(&self) -> Result<CredentialSource, ConfigurationError> {
            let file = non_blank(self.credentials_file.clone());
            let inline = non_blank(self.credentials_json.clone());

            match (file, inline) {
                (Some(path), None) => Ok(CredentialSource::FilePath(PathBuf::from(path))),
                (None, Some(json)) => Ok(CredentialSource::InlineJson(json)),
                (Some(_), Some(_)) => Err(ConfigurationError::new(
                    "both GOOGLE_APPLICATION_CREDENTIALS and GOOGLE_CREDENTIALS_JSON are set; use exactly one",
                )),
                (None, None) => Err(ConfigurationError::new(
                    "GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_CREDENTIALS_JSON is required (missing or empty)",
                )),
            }
        }

        pub fn require_spreadsheet_id(&self) -> Result<&str, ConfigurationError> {
            self.spreadsheet_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConfigurationError::new("SPREADSHEET_ID is required"))
        }

        pub fn require_rate_api_url(&self) -> Result<String, ConfigurationError> {
            if let Some(url) = non_blank(self.rate_api_url.clone()) {
                return Ok(url);
            }

            let key = non_blank(self.rate_api_key.clone())
                .ok_or_else(|| ConfigurationError::new("RATE_API_URL or RATE_API_KEY is required"))?;

            Ok(format!(
                "{}/v6/{}/latest/USD",
                self.rate_api_base_url.trim_end_matches('/'),
                key
            ))
        }
    }

    fn non_blank(v: Option<String>) -> Option<String> {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

}
