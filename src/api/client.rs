use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::api::models::{
    ConversationKey, ConversationSummary, Envelope, Message, NewMessage, NewQuote, QuoteOutcome,
    QuoteStatus, SenderRole, Session,
};
use crate::app::AppState;
use crate::error::{ClientError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the marketplace application endpoints and the backend
/// auth endpoint.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub http: HttpClient,
    api_base: String,
    backend_base: String,
    anon_key: String,
    access_token: Option<String>,
}

fn missing(what: &str) -> ClientError {
    ClientError::Decode(<serde_json::Error as serde::de::Error>::custom(format!("response has no {what}")))
}

impl ApiClient {
    pub fn new(api_url: &str, backend_url: &str, anon_key: &str) -> Result<Self> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base: Self::base_api(api_url),
            backend_base: backend_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: None,
        })
    }

    /// Client for the signed-in user stored in `state`.
    pub fn from_state(state: &AppState) -> Result<Self> {
        let token = state.access_token.clone().ok_or(ClientError::NotSignedIn)?;
        Ok(Self::new(&state.api_url, &state.backend_url, &state.anon_key)?.with_token(token))
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    fn with_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req = req.header("apikey", &self.anon_key);
        if let Some(t) = &self.access_token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req
    }

    async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>> {
        let status = resp.status();
        let body = resp.bytes().await?;
        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(ClientError::Http(status)),
            Err(e) => Err(ClientError::Decode(e)),
        }
    }

    /// Exchanges e-mail and password for an access token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let endpoint = format!("{}/auth/v1/token", self.backend_base);
        let resp = self
            .http
            .post(&endpoint)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        let json: Value = match serde_json::from_slice(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => return Err(ClientError::Http(status)),
            Err(e) => return Err(ClientError::Decode(e)),
        };
        if !status.is_success() {
            let msg = json
                .get("error_description")
                .or_else(|| json.get("msg"))
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            return Err(ClientError::Rejected(msg));
        }

        let access_token = json
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("access token"))?
            .to_string();
        let user = json.get("user").ok_or_else(|| missing("user"))?;
        let user_id = user
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("user id"))?
            .to_string();
        let metadata = user.get("user_metadata");
        let role = metadata
            .and_then(|m| m.get("role"))
            .and_then(|v| serde_json::from_value::<SenderRole>(v.clone()).ok())
            .unwrap_or(SenderRole::Customer);
        let display_name = metadata
            .and_then(|m| m.get("full_name").or_else(|| m.get("name")))
            .or_else(|| user.get("email"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(Session { access_token, user_id, role, display_name })
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        let endpoint = format!("{}/conversations", self.api_base);
        let resp = self.with_auth(self.http.get(&endpoint)).send().await?;
        Ok(Self::read_envelope(resp).await?.unwrap_or_default())
    }

    /// One page of messages, newest first. `before` pages backwards.
    pub async fn messages(
        &self,
        conversation: &ConversationKey,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let endpoint = format!("{}/conversations/{}/messages", self.api_base, conversation);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        let resp = self.with_auth(self.http.get(&endpoint)).query(&query).send().await?;
        Ok(Self::read_envelope(resp).await?.unwrap_or_default())
    }

    pub async fn create_message(&self, message: &NewMessage) -> Result<Message> {
        let endpoint = format!("{}/messages", self.api_base);
        let resp = self.with_auth(self.http.post(&endpoint)).json(message).send().await?;
        Self::read_envelope(resp).await?.ok_or_else(|| missing("message"))
    }

    pub async fn mark_read(&self, message_ids: &[String]) -> Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let endpoint = format!("{}/messages/read", self.api_base);
        let body = serde_json::json!({ "message_ids": message_ids });
        let resp = self.with_auth(self.http.post(&endpoint)).json(&body).send().await?;
        Self::read_envelope::<Value>(resp).await?;
        Ok(())
    }

    pub async fn create_quote(&self, quote: &NewQuote) -> Result<QuoteOutcome> {
        let endpoint = format!("{}/quotes", self.api_base);
        let resp = self.with_auth(self.http.post(&endpoint)).json(quote).send().await?;
        Ok(Self::read_envelope(resp).await?.unwrap_or_default())
    }

    pub async fn set_quote_status(&self, quote_id: &str, status: QuoteStatus) -> Result<QuoteOutcome> {
        let endpoint = format!("{}/quotes/{}", self.api_base, quote_id);
        let body = serde_json::json!({ "status": status });
        let resp = self.with_auth(self.http.patch(&endpoint)).json(&body).send().await?;
        Ok(Self::read_envelope(resp).await?.unwrap_or_default())
    }
}
