//! Google Sheets sink.
//!
//! Connecting reads a pre-authorized user token (`token.json`, as written by
//! Google's installed-app flow), resolves the first worksheet of the
//! configured spreadsheet, and returns a [`SheetHandle`] that appends rows via
//! the `values:append` endpoint with `USER_ENTERED` interpretation.
//!
//! Expired tokens are not refreshed; connecting simply fails.

use super::{RowSink, SinkConnector};
use crate::models::Row;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

pub const DEFAULT_SHEETS_BASE: &str = "https://sheets.googleapis.com";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Fields of an authorized-user token file that matter for a request.
#[derive(Debug, Deserialize)]
struct AuthorizedUser {
    #[serde(alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
}

/// Extract a usable bearer token from token-file JSON as of `now`.
pub fn bearer_from_token_json(json: &str, now: DateTime<Utc>) -> Result<String, Box<dyn Error>> {
    let user: AuthorizedUser = serde_json::from_str(json)?;

    let token = user
        .token
        .filter(|t| !t.is_empty())
        .ok_or("token file has no access token")?;

    if !user.scopes.is_empty() && !user.scopes.iter().any(|s| s == SPREADSHEETS_SCOPE) {
        debug!(scopes = ?user.scopes, wanted = SPREADSHEETS_SCOPE, "Token file does not list the spreadsheets scope");
    }

    if let Some(expiry) = user.expiry.as_deref() {
        let expiry = DateTime::parse_from_rfc3339(expiry)?.with_timezone(&Utc);
        if expiry <= now {
            return Err(format!("token expired at {expiry}").into());
        }
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: Option<usize>,
}

/// Connects to the first worksheet of one spreadsheet.
#[derive(Debug, Clone)]
pub struct GoogleSheets {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    token_file: PathBuf,
}

impl GoogleSheets {
    pub fn new(spreadsheet_id: impl Into<String>, token_file: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_SHEETS_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            token_file: token_file.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl SinkConnector for GoogleSheets {
    type Sink = SheetHandle;

    #[instrument(level = "info", skip_all, fields(spreadsheet = %self.spreadsheet_id))]
    async fn connect(&self) -> Result<SheetHandle, Box<dyn Error>> {
        let token_json = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| format!("reading {}: {e}", self.token_file.display()))?;
        let token = bearer_from_token_json(&token_json, Utc::now())?;

        let url = format!("{}/v4/spreadsheets/{}", self.base_url, self.spreadsheet_id);
        let meta: SpreadsheetMeta = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("fields", "sheets.properties")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let title = meta
            .sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or("spreadsheet has no worksheets")?;

        info!(%title, "Connected to worksheet");
        Ok(SheetHandle {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            title,
            token,
        })
    }
}

/// An authenticated handle on one worksheet.
pub struct SheetHandle {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    title: String,
    token: String,
}

impl std::fmt::Debug for SheetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetHandle")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("title", &self.title)
            .field("token", &"***")
            .finish()
    }
}

impl SheetHandle {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// A1 range anchoring appends to this worksheet, e.g. `'Sheet1'!A1`.
    fn append_range(&self) -> String {
        format!("'{}'!A1", self.title.replace('\'', "''"))
    }
}

impl RowSink for SheetHandle {
    #[instrument(level = "info", skip_all, fields(sheet = %self.title(), rows = rows.len()))]
    async fn append_rows(&self, rows: &[Row]) -> Result<usize, Box<dyn Error>> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(&self.append_range())
        );

        let resp: AppendResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let written = resp
            .updates
            .and_then(|u| u.updated_rows)
            .unwrap_or(rows.len());
        debug!(written, "Append acknowledged");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn token_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        file
    }

    #[test]
    fn test_bearer_from_valid_token() {
        let json = r#"{"token": "ya29.abc", "refresh_token": "r", "expiry": "2024-06-01T00:00:00.000000Z",
                       "scopes": ["https://www.googleapis.com/auth/drive.file", "https://www.googleapis.com/auth/spreadsheets"]}"#;
        assert_eq!(bearer_from_token_json(json, now()).unwrap(), "ya29.abc");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let json = r#"{"token": "ya29.abc", "expiry": "2023-06-01T00:00:00Z"}"#;
        let err = bearer_from_token_json(json, now()).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        assert!(bearer_from_token_json(r#"{"refresh_token": "r"}"#, now()).is_err());
    }

    #[test]
    fn test_drive_file_scope_is_accepted() {
        let json = r#"{"access_token": "t", "scopes": ["https://www.googleapis.com/auth/drive.file"]}"#;
        assert_eq!(bearer_from_token_json(json, now()).unwrap(), "t");
    }

    #[test]
    fn test_handle_debug_hides_token() {
        let handle = SheetHandle {
            http: Client::new(),
            base_url: DEFAULT_SHEETS_BASE.to_string(),
            spreadsheet_id: "sheet-123".to_string(),
            title: "Findings".to_string(),
            token: "ya29.secret".to_string(),
        };

        let shown = format!("{handle:?}");
        assert!(shown.contains("Findings"));
        assert!(!shown.contains("ya29.secret"));
    }

    #[tokio::test]
    async fn test_connect_resolves_first_sheet_and_appends() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123"))
            .and(header("authorization", "Bearer ya29.abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    {"properties": {"sheetId": 0, "title": "Findings", "index": 0}},
                    {"properties": {"sheetId": 1, "title": "Other", "index": 1}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/.*Findings.*:append$"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(body_json(json!({"values": [["Lights", 5]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updates": {"updatedRows": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = token_file(r#"{"token": "ya29.abc"}"#);
        let sheets = GoogleSheets::new("sheet-123", file.path()).with_base_url(server.uri());

        let handle = sheets.connect().await.unwrap();
        assert_eq!(handle.title(), "Findings");

        let written = handle
            .append_rows(&[vec!["Lights".into(), 5i64.into()]])
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_connect_fails_on_invalid_sheet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let file = token_file(r#"{"token": "ya29.abc"}"#);
        let sheets = GoogleSheets::new("missing", file.path()).with_base_url(server.uri());
        assert!(sheets.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_without_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let sheets = GoogleSheets::new("sheet-123", dir.path().join("token.json"));
        assert!(sheets.connect().await.is_err());
    }
}
