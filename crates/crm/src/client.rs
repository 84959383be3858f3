use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::CrmConfig;
use leadbot_core::domain::lead::DealRef;
use leadbot_core::errors::CrmError;
use leadbot_core::sync::CrmGateway;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::payload::{self, CONTACT_ADD, CONTACT_LIST, ITEM_ADD};

/// Attribution applied to every contact and item the bot creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrmSettings {
    pub entity_type_id: u32,
    pub source_id: String,
    pub source_description: String,
    pub assigned_by_id: u32,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            entity_type_id: 1050,
            source_id: "TELEGRAM".to_string(),
            source_description: "Telegram".to_string(),
            assigned_by_id: 35,
        }
    }
}

impl From<&CrmConfig> for CrmSettings {
    fn from(config: &CrmConfig) -> Self {
        Self {
            entity_type_id: config.entity_type_id,
            source_id: config.source_id.clone(),
            source_description: config.source_description.clone(),
            assigned_by_id: config.assigned_by_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BitrixClient {
    base_url: String,
    http: Client,
    settings: CrmSettings,
}

impl BitrixClient {
    pub fn from_config(config: &CrmConfig) -> Result<Self, CrmError> {
        let base_url = config.base_url().ok_or(CrmError::ConfigMissing)?;
        Self::new(
            base_url,
            Duration::from_secs(config.request_timeout_secs),
            CrmSettings::from(config),
        )
    }

    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        settings: CrmSettings,
    ) -> Result<Self, CrmError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CrmError::ConfigMissing);
        }

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| CrmError::Transport(error.to_string()))?;

        Ok(Self { base_url, http, settings })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn find_contact(&self, phone: &str) -> Result<Option<String>, CrmError> {
        let request = payload::contact_list_request(phone);
        let response = self.post(CONTACT_LIST, &request).await?;
        logged_shape(CONTACT_LIST, &request, &response, payload::first_contact_id(&response))
    }

    pub async fn create_contact(&self, phone: &str, name: &str) -> Result<String, CrmError> {
        let request = payload::contact_add_request(phone, name, &self.settings);
        let response = self.post(CONTACT_ADD, &request).await?;
        logged_shape(CONTACT_ADD, &request, &response, payload::created_contact_id(&response))
    }

    pub async fn find_or_create_contact(
        &self,
        phone: &str,
        name: &str,
    ) -> Result<String, CrmError> {
        if let Some(contact_id) = self.find_contact(phone).await? {
            debug!(event_name = "crm.contact.found", contact_id = %contact_id, "reusing contact");
            return Ok(contact_id);
        }

        let contact_id = self.create_contact(phone, name).await?;
        info!(event_name = "crm.contact.created", contact_id = %contact_id, "created contact");
        Ok(contact_id)
    }

    pub async fn create_item(
        &self,
        contact_id: &str,
        course_title: &str,
    ) -> Result<String, CrmError> {
        let numeric_id = contact_id
            .trim()
            .parse::<i64>()
            .map_err(|_| CrmError::InvalidContactId(contact_id.to_string()))?;

        let request = payload::item_add_request(numeric_id, course_title, &self.settings);
        let response = self.post(ITEM_ADD, &request).await?;
        logged_shape(ITEM_ADD, &request, &response, payload::created_item_id(&response))
    }

    /// POSTs `body` to `{base_url}/{method}` and returns the decoded JSON envelope.
    pub async fn post(&self, method: &str, body: &Value) -> Result<Value, CrmError> {
        let url = format!("{}/{}", self.base_url, method.trim_start_matches('/'));

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                warn!(
                    event_name = "crm.request.transport_failed",
                    method,
                    error = %error,
                    "crm request failed before a response arrived"
                );
                CrmError::Transport(error.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| {
            warn!(
                event_name = "crm.request.transport_failed",
                method,
                status = status.as_u16(),
                error = %error,
                request = %body,
                "crm response body could not be read"
            );
            CrmError::Transport(error.to_string())
        })?;

        if status.as_u16() >= 400 {
            warn!(
                event_name = "crm.request.http_error",
                method,
                status = status.as_u16(),
                response = %text,
                request = %body,
                "crm returned an http error"
            );
            return Err(CrmError::Http { status: status.as_u16(), body: text });
        }

        let envelope: Value = serde_json::from_str(&text).map_err(|error| {
            warn!(
                event_name = "crm.request.unexpected_shape",
                method,
                error = %error,
                response = %text,
                request = %body,
                "crm response is not json"
            );
            CrmError::UnexpectedResponseShape(text.clone())
        })?;

        if let Some(api_error) = payload::api_error(&envelope) {
            warn!(
                event_name = "crm.request.api_error",
                method,
                error = %api_error,
                response = %text,
                request = %body,
                "crm rejected the request"
            );
            return Err(api_error);
        }

        Ok(envelope)
    }
}

fn logged_shape<T>(
    method: &str,
    request: &Value,
    response: &Value,
    decoded: Result<T, CrmError>,
) -> Result<T, CrmError> {
    if let Err(error) = &decoded {
        warn!(
            event_name = "crm.request.unexpected_shape",
            method,
            error = %error,
            response = %response,
            request = %request,
            "crm response is missing the expected id"
        );
    }
    decoded
}

#[async_trait]
impl CrmGateway for BitrixClient {
    async fn sync_deal(
        &self,
        phone: &str,
        contact_name: &str,
        course_title: &str,
    ) -> Result<DealRef, CrmError> {
        let contact_id = self.find_or_create_contact(phone, contact_name).await?;
        let item_id = self.create_item(&contact_id, course_title).await?;
        Ok(DealRef { contact_id, item_id })
    }
}
