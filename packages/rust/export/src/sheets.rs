//! Google Sheets export through the Sheets v4 REST API.
//!
//! Authenticates as a service account: a signed RS256 JWT is exchanged for
//! an access token, which is cached until shortly before it expires. Rows
//! are appended to one tab; the header row is added only to an empty tab.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use leadgen_shared::{
    EXPORT_COLUMNS, ExportCapability, ExportRow, LeadGenError, Result, SheetsConfig,
};

const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// First row of the tab, spanning the nine export columns.
const HEADER_CELLS: &str = "A1:I1";

/// The fields of a service-account JSON key that signing needs.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Appends export rows to a Google Sheet.
pub struct SheetsExporter {
    client: Client,
    api_base: Url,
    sheet_id: String,
    range: String,
    client_email: String,
    token_uri: String,
    key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
}

impl SheetsExporter {
    /// Read the service-account key named in `config` and prepare a client.
    ///
    /// A missing or malformed key fails here, before any row is exported.
    pub fn new(config: &SheetsConfig) -> Result<Self> {
        let path = Path::new(&config.credentials_file);
        let raw = std::fs::read_to_string(path).map_err(|e| LeadGenError::io(path, e))?;
        let account: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            LeadGenError::config(format!(
                "invalid service account key {}: {e}",
                path.display()
            ))
        })?;
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            LeadGenError::config(format!(
                "unusable private key in {}: {e}",
                path.display()
            ))
        })?;

        let api_base = Url::parse(&config.api_base_url).map_err(|e| {
            LeadGenError::config(format!("invalid sheets.api_base_url: {e}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(LeadGenError::config(format!(
                "sheets.api_base_url cannot hold a path: {api_base}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("leadgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LeadGenError::Network(format!("failed to build sheets client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            sheet_id: config.sheet_id.trim().to_string(),
            range: config.range.trim().to_string(),
            client_email: account.client_email,
            token_uri: account.token_uri,
            key,
            token: Mutex::new(None),
        })
    }

    /// Remove every value from the configured tab.
    #[instrument(skip_all, fields(sheet = %self.sheet_id))]
    pub async fn clear(&self) -> Result<()> {
        let token = self.access_token().await?;
        let url = self.values_url(&format!("{}:clear", self.range))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| LeadGenError::Network(format!("sheets clear failed: {e}")))?;
        check_status(response, "clear").await?;

        info!(sheet = %self.sheet_id, range = %self.range, "cleared Google Sheet");
        Ok(())
    }

    /// A valid access token, signing and exchanging a new JWT when the
    /// cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > now) {
            return Ok(token.value.clone());
        }

        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| LeadGenError::Export(format!("failed to sign token request: {e}")))?;

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        let response = self
            .client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| LeadGenError::Network(format!("token request failed: {e}")))?;
        let parsed: TokenResponse = check_status(response, "token exchange")
            .await?
            .json()
            .await
            .map_err(|e| LeadGenError::parse(format!("invalid token response: {e}")))?;

        debug!(account = %self.client_email, "obtained sheets access token");
        let lifetime = parsed.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        // Renewed a minute before the server-side expiry.
        let expires_at = now + TimeDelta::seconds(lifetime.saturating_sub(60).max(0));
        let value = parsed.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    /// Whether the tab is empty and so still needs its header row.
    async fn needs_header(&self, token: &str) -> Result<bool> {
        let url = self.values_url(&format!("{}!{HEADER_CELLS}", self.range))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LeadGenError::Network(format!("sheets read failed: {e}")))?;
        let first: ValueRange = check_status(response, "header read")
            .await?
            .json()
            .await
            .map_err(|e| LeadGenError::parse(format!("invalid sheets response: {e}")))?;

        match first.values.first() {
            None => Ok(true),
            Some(row) if row.iter().map(String::as_str).eq(EXPORT_COLUMNS) => Ok(false),
            Some(_) => {
                warn!(sheet = %self.sheet_id, "first row is not the export header, leaving it");
                Ok(false)
            }
        }
    }

    /// `{api}/v4/spreadsheets/{id}/values/{range}` with each part escaped.
    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| LeadGenError::config("sheets.api_base_url cannot hold a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.sheet_id.as_str(), "values", range]);
        Ok(url)
    }
}

#[async_trait]
impl ExportCapability for SheetsExporter {
    fn location(&self) -> String {
        format!("google-sheets:{}/{}", self.sheet_id, self.range)
    }

    #[instrument(skip_all, fields(sheet = %self.sheet_id, rows = rows.len()))]
    async fn write(&self, rows: &[ExportRow]) -> Result<usize> {
        let token = self.access_token().await?;

        let mut values: Vec<Vec<&str>> = Vec::with_capacity(rows.len() + 1);
        if self.needs_header(&token).await? {
            debug!("adding header row to Google Sheet");
            values.push(EXPORT_COLUMNS.to_vec());
        }
        values.extend(rows.iter().map(|row| row.values().to_vec()));
        if values.is_empty() {
            return Ok(0);
        }

        let mut url = self.values_url(&format!("{}:append", self.range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "majorDimension": "ROWS", "values": values }))
            .send()
            .await
            .map_err(|e| LeadGenError::Network(format!("sheets append failed: {e}")))?;
        check_status(response, "append").await?;

        info!(rows = rows.len(), sheet = %self.sheet_id, "appended leads to Google Sheet");
        Ok(rows.len())
    }
}

async fn check_status(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    let detail: String = detail.chars().take(200).collect();
    Err(LeadGenError::Export(format!(
        "sheets {action} returned {status}: {}",
        detail.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../testdata/service-account-key.pem");
    const PUBLIC_KEY: &str = include_str!("../testdata/service-account-pub.pem");
    const VALUES: &str = "/v4/spreadsheets/sheet-123/values";

    struct Fixture {
        server: MockServer,
        config: SheetsConfig,
        dir: std::path::PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        let dir = std::env::temp_dir().join(format!("leadgen-sheets-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let credentials = dir.join("service-account.json");
        let key = serde_json::json!({
            "type": "service_account",
            "client_email": "leads@project.iam.gserviceaccount.com",
            "private_key": PRIVATE_KEY,
            "token_uri": format!("{}/token", server.uri()),
        });
        std::fs::write(&credentials, key.to_string()).unwrap();

        let config = SheetsConfig {
            enabled: true,
            sheet_id: "sheet-123".into(),
            credentials_file: credentials.display().to_string(),
            range: "Sheet1".into(),
            api_base_url: server.uri(),
        };
        Fixture {
            server,
            config,
            dir,
        }
    }

    async fn mount_token(server: &MockServer, times: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3600,
                "token_type": "Bearer",
            })))
            .expect(times)
            .mount(server)
            .await;
    }

    fn header_range(values: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "range": "Sheet1!A1:I1",
            "majorDimension": "ROWS",
            "values": values,
        }))
    }

    fn row(name: &str) -> ExportRow {
        ExportRow {
            agency_name: name.into(),
            country: "Finland".into(),
            website: "https://pixelpost.fi".into(),
            services: "SEO".into(),
            niche: String::new(),
            contact_name: String::new(),
            email: "hello@pixelpost.fi".into(),
            lead_score: "Warm".into(),
            outreach_message: "Hi Pixel Post team,".into(),
        }
    }

    #[tokio::test]
    async fn header_written_once_and_token_reused() {
        let fx = fixture().await;
        mount_token(&fx.server, 1).await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Sheet1!A1:I1")))
            .respond_with(header_range(serde_json::json!([])))
            .up_to_n_times(1)
            .mount(&fx.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{VALUES}/Sheet1!A1:I1")))
            .respond_with(header_range(serde_json::json!([EXPORT_COLUMNS])))
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/Sheet1:append")))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(2)
            .mount(&fx.server)
            .await;

        let exporter = SheetsExporter::new(&fx.config).unwrap();
        assert_eq!(exporter.write(&[row("Pixel Post"), row("Kasvu")]).await.unwrap(), 2);
        assert_eq!(exporter.write(&[row("Nordic Reach")]).await.unwrap(), 1);
        assert_eq!(exporter.location(), "google-sheets:sheet-123/Sheet1");

        let requests = fx.server.received_requests().await.unwrap();
        let appends: Vec<serde_json::Value> = requests
            .iter()
            .filter(|r| r.url.path().ends_with(":append"))
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(appends.len(), 2);

        let first = appends[0]["values"].as_array().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], serde_json::json!(EXPORT_COLUMNS));
        assert_eq!(first[1][0], "Pixel Post");
        assert_eq!(first[1][7], "Warm");

        let second = appends[1]["values"].as_array().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0][0], "Nordic Reach");

        let append_url = &requests
            .iter()
            .find(|r| r.url.path().ends_with(":append"))
            .unwrap()
            .url;
        assert_eq!(
            append_url.query(),
            Some("valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS")
        );
    }

    #[tokio::test]
    async fn token_request_carries_signed_service_account_jwt() {
        let fx = fixture().await;
        mount_token(&fx.server, 1).await;
        Mock::given(method("GET"))
            .respond_with(header_range(serde_json::json!([EXPORT_COLUMNS])))
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/Sheet1:append")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&fx.server)
            .await;

        let exporter = SheetsExporter::new(&fx.config).unwrap();
        exporter.write(&[row("Pixel Post")]).await.unwrap();

        let requests = fx.server.received_requests().await.unwrap();
        let token_request = requests.iter().find(|r| r.url.path() == "/token").unwrap();
        let form: std::collections::HashMap<String, String> =
            url::form_urlencoded::parse(&token_request.body).into_owned().collect();
        assert_eq!(form["grant_type"], JWT_BEARER_GRANT);

        let audience = format!("{}/token", fx.server.uri());
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience.as_str()]);
        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &form["assertion"],
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims["iss"], "leads@project.iam.gserviceaccount.com");
        assert_eq!(decoded.claims["scope"], SCOPE);
    }

    #[tokio::test]
    async fn rejected_append_is_an_export_error() {
        let fx = fixture().await;
        mount_token(&fx.server, 1).await;
        Mock::given(method("GET"))
            .respond_with(header_range(serde_json::json!([EXPORT_COLUMNS])))
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/Sheet1:append")))
            .respond_with(ResponseTemplate::new(403).set_body_string("caller lacks permission"))
            .mount(&fx.server)
            .await;

        let exporter = SheetsExporter::new(&fx.config).unwrap();
        let err = exporter.write(&[row("Pixel Post")]).await.unwrap_err();
        match err {
            LeadGenError::Export(msg) => {
                assert!(msg.contains("403"));
                assert!(msg.contains("caller lacks permission"));
            }
            other => panic!("expected export error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clear_posts_to_the_tab() {
        let fx = fixture().await;
        mount_token(&fx.server, 1).await;
        Mock::given(method("POST"))
            .and(path(format!("{VALUES}/Sheet1:clear")))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&fx.server)
            .await;

        let exporter = SheetsExporter::new(&fx.config).unwrap();
        exporter.clear().await.unwrap();
    }

    #[tokio::test]
    async fn unusable_key_is_a_config_error() {
        let fx = fixture().await;
        std::fs::write(
            &fx.config.credentials_file,
            r#"{"client_email": "a@b.iam.gserviceaccount.com", "private_key": "not a key"}"#,
        )
        .unwrap();
        let err = SheetsExporter::new(&fx.config).err().unwrap();
        assert!(matches!(err, LeadGenError::Config { .. }));

        let mut missing = fx.config.clone();
        missing.credentials_file = fx.dir.join("absent.json").display().to_string();
        let err = SheetsExporter::new(&missing).err().unwrap();
        assert!(matches!(err, LeadGenError::Io { .. }));
    }
}
