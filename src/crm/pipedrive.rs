//! Pipedrive v1 REST client.

use std::future::Future;
use std::pin::Pin;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{CrmApi, NewActivity};
use crate::config::CrmConfig;
use crate::models::deal::DealRecord;
use crate::{AppError, Result};

/// Pipedrive response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn into_data(self, what: &str) -> Result<Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Crm(format!(
                "{what} rejected: {}",
                self.error.as_deref().unwrap_or("unknown error")
            )))
        }
    }
}

/// Query-token authenticated Pipedrive client with a bounded timeout.
pub struct PipedriveClient {
    http: Client,
    base_url: String,
    api_token: String,
    estimator_field: Option<String>,
}

impl PipedriveClient {
    /// Build a client from CRM configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crm` if the HTTP client cannot be constructed.
    pub fn new(config: &CrmConfig) -> Result<Self> {
        crate::install_crypto_provider();
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Crm(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
            estimator_field: config.estimator_field.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))
            .map_err(|err| AppError::Crm(format!("invalid crm url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("api_token", &self.api_token);
        Ok(url)
    }

    async fn read_envelope(response: reqwest::Response, what: &str) -> Result<Value> {
        let status = response.status();
        let envelope: Envelope = response
            .json()
            .await
            .map_err(|err| AppError::Crm(format!("{what}: unreadable response ({status}): {err}")))?;
        if !status.is_success() {
            return Err(AppError::Crm(format!(
                "{what}: http {status}: {}",
                envelope.error.as_deref().unwrap_or("no error detail")
            )));
        }
        envelope.into_data(what)
    }
}

/// Pipedrive expects numeric IDs; anything else is passed through as text.
fn deal_id_value(deal_id: &str) -> Value {
    deal_id
        .parse::<u64>()
        .map_or_else(|_| Value::String(deal_id.to_owned()), Value::from)
}

impl CrmApi for PipedriveClient {
    fn fetch_deal(&self, deal_id: &str) -> Pin<Box<dyn Future<Output = Result<DealRecord>> + Send + '_>> {
        let deal_id = deal_id.to_owned();
        Box::pin(async move {
            let url = self.endpoint(&format!("deals/{deal_id}"))?;
            let response = self.http.get(url).send().await?;
            let data = Self::read_envelope(response, "fetch deal").await?;
            if data.is_null() {
                return Err(AppError::NotFound(format!("deal {deal_id}")));
            }
            let deal = DealRecord::from_api(&data, self.estimator_field.as_deref());
            debug!(deal_id, person = ?deal.person_name, estimator = ?deal.estimator, "deal fetched");
            Ok(deal)
        })
    }

    fn create_note(
        &self,
        deal_id: &str,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let body = json!({ "content": content, "deal_id": deal_id_value(deal_id) });
        let deal_id = deal_id.to_owned();
        Box::pin(async move {
            let url = self.endpoint("notes")?;
            let response = self.http.post(url).json(&body).send().await?;
            Self::read_envelope(response, "create note").await?;
            info!(deal_id, "note added to deal");
            Ok(())
        })
    }

    fn create_activity(
        &self,
        activity: NewActivity,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let url = self.endpoint("activities")?;
            let response = self.http.post(url).json(&activity).send().await?;
            let data = Self::read_envelope(response, "create activity").await?;
            let activity_id = match data.get("id") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            };
            info!(deal_id = %activity.deal_id, activity_id, "activity created");
            Ok(activity_id)
        })
    }
}
