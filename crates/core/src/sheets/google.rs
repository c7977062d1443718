use crate::auth::ServiceAccountAuth;
use crate::sheets::{Row, SheetStore};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Google Sheets v4 values API, scoped to one spreadsheet.
#[derive(Debug)]
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    auth: ServiceAccountAuth,
    base_url: String,
    spreadsheet_id: String,
}

impl GoogleSheetsClient {
    /// `spreadsheet` may be a bare ID or a full `https://docs.google.com/spreadsheets/d/<id>/...` URL.
    pub fn new(
        http: reqwest::Client,
        auth: ServiceAccountAuth,
        base_url: impl Into<String>,
        spreadsheet: &str,
    ) -> Result<Self> {
        let spreadsheet_id = spreadsheet_id_from(spreadsheet)
            .with_context(|| format!("cannot extract spreadsheet id from '{spreadsheet}'"))?;

        Ok(Self {
            http,
            auth,
            base_url: base_url.into(),
            spreadsheet_id,
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn values_url(&self, last_segment: &str) -> Result<Url> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid sheets base url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("sheets base url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", last_segment]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl SheetStore for GoogleSheetsClient {
    fn store_name(&self) -> &'static str {
        "google_sheets"
    }

    async fn read_all(&self, range: &str) -> Result<Vec<Row>> {
        let token = self.auth.access_token().await?;
        let url = self.values_url(range)?;

        let res = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("dateTimeRenderOption", "FORMATTED_STRING"),
            ])
            .send()
            .await
            .with_context(|| format!("sheets read request failed (range={range})"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read sheets response")?;
        if !status.is_success() {
            anyhow::bail!("sheets read HTTP {status} (range={range}): {text}");
        }

        let body = serde_json::from_str::<ValueRange>(&text)
            .with_context(|| format!("failed to parse sheets values response (range={range})"))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append_row(&self, range: &str, row: Row) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = self.values_url(&format!("{range}:append"))?;

        let body = AppendRequest { values: vec![row] };
        let res = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("sheets append request failed (range={range})"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("sheets append HTTP {status} (range={range}): {text}");
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    // Omitted by the API when the range is empty.
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct AppendRequest {
    values: Vec<Row>,
}

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn spreadsheet_id_from(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }

    if let Some(idx) = t.find("/d/") {
        let rest = &t[idx + 3..];
        let id = rest
            .split(|c: char| c == '/' || c == '?' || c == '#')
            .next()
            .unwrap_or("");
        return (!id.is_empty()).then(|| id.to_string());
    }

    if t.contains('/') {
        return None;
    }
    Some(t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::test_key_json;
    use crate::auth::{acquire_credential, CredentialSource};
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;

    #[test]
    fn extracts_spreadsheet_id_from_url_or_bare_id() {
        assert_eq!(
            spreadsheet_id_from("https://docs.google.com/spreadsheets/d/13BYN_abc-XYZ/edit#gid=0")
                .as_deref(),
            Some("13BYN_abc-XYZ")
        );
        assert_eq!(
            spreadsheet_id_from("https://docs.google.com/spreadsheets/d/13BYN_abc").as_deref(),
            Some("13BYN_abc")
        );
        assert_eq!(spreadsheet_id_from(" 13BYN_abc ").as_deref(), Some("13BYN_abc"));
        assert_eq!(spreadsheet_id_from("https://example.com/x"), None);
        assert_eq!(spreadsheet_id_from(""), None);
    }

    #[test]
    fn renders_cells_as_strings() {
        assert_eq!(cell_to_string(&json!("2024-01-05")), "2024-01-05");
        assert_eq!(cell_to_string(&json!(1350.55)), "1350.55");
        assert_eq!(cell_to_string(&json!(1300)), "1300");
        assert_eq!(cell_to_string(&Value::Null), "");
    }

    async fn client_for(server: &MockServer) -> GoogleSheetsClient {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.sheets", "expires_in": 3600}));
            })
            .await;

        let (json, _) = test_key_json(&server.url("/token"));
        let cred = acquire_credential(&CredentialSource::InlineJson(json)).unwrap();
        let http = reqwest::Client::new();
        let auth = ServiceAccountAuth::new(http.clone(), cred);
        GoogleSheetsClient::new(http, auth, server.base_url(), "sheet-1").unwrap()
    }

    #[tokio::test]
    async fn reads_range_values_as_rows() {
        let server = MockServer::start_async().await;
        let read = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v4/spreadsheets/sheet-1/values/rawdata")
                    .header("authorization", "Bearer ya29.sheets")
                    .query_param("valueRenderOption", "UNFORMATTED_VALUE");
                then.status(200).json_body(json!({
                    "range": "rawdata!A1:B3",
                    "majorDimension": "ROWS",
                    "values": [["Date", "dollar"], ["2024-01-05", 1300.5], ["2025-01-05", "1400"]]
                }));
            })
            .await;

        let client = client_for(&server).await;
        let rows = client.read_all("rawdata").await.unwrap();
        read.assert_async().await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["2024-01-05".to_string(), "1300.5".to_string()]);
        assert_eq!(rows[2][1], "1400");
    }

    #[tokio::test]
    async fn empty_range_reads_as_no_rows() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v4/spreadsheets/sheet-1/values/rawdata");
                then.status(200)
                    .json_body(json!({"range": "rawdata!A1:Z1000", "majorDimension": "ROWS"}));
            })
            .await;

        let client = client_for(&server).await;
        assert!(client.read_all("rawdata").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appends_one_raw_row() {
        let server = MockServer::start_async().await;
        let append = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v4/spreadsheets/sheet-1/values/dollar:append")
                    .header("authorization", "Bearer ya29.sheets")
                    .query_param("valueInputOption", "RAW")
                    .query_param("insertDataOption", "INSERT_ROWS")
                    .json_body(json!({"values": [["2026-10-16", "1350.55"]]}));
                then.status(200).json_body(json!({"spreadsheetId": "sheet-1"}));
            })
            .await;

        let client = client_for(&server).await;
        client
            .append_row(
                "dollar",
                vec!["2026-10-16".to_string(), "1350.55".to_string()],
            )
            .await
            .unwrap();
        append.assert_async().await;
    }

    #[tokio::test]
    async fn append_failure_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v4/spreadsheets/sheet-1/values/dollar:append");
                then.status(403).body("PERMISSION_DENIED");
            })
            .await;

        let client = client_for(&server).await;
        let err = client
            .append_row("dollar", vec!["x".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
