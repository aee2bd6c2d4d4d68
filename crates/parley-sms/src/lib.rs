// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS channel adapter (Twilio REST API) for the Parley conversation engine.
//!
//! Messages are form-posted to `/2010-04-01/Accounts/{sid}/Messages.json`
//! with HTTP basic auth. Numbers are addressed in `+` transport form.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use parley_config::model::{IdentityConfig, SmsConfig};
use parley_core::identity::{PhoneFormat, TransportStyle};
use parley_core::traits::{ChannelAdapter, PluginAdapter};
use parley_core::types::{DeliveryChannel, HealthStatus, MessageId, OutboundMessage};
use parley_core::ParleyError;

const API_VERSION: &str = "2010-04-01";

#[derive(Debug, Serialize)]
struct MessageForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResource {
    #[serde(default)]
    status: Option<String>,
}

pub struct SmsChannel {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    phone: PhoneFormat,
}

impl SmsChannel {
    /// `None` unless SID, token and sender number are all configured.
    pub fn from_config(
        config: &SmsConfig,
        identity: &IdentityConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, ParleyError> {
        let (Some(sid), Some(token), Some(from)) =
            (&config.account_sid, &config.auth_token, &config.from_number)
        else {
            debug!("sms credentials incomplete, channel disabled");
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ParleyError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        info!(from = %from, "sms sender configured");
        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_sid: sid.clone(),
            auth_token: token.clone(),
            from_number: from.clone(),
            phone: PhoneFormat::new(&identity.country_code, &identity.mobile_indicator),
        }))
    }

    fn account_url(&self) -> String {
        format!("{}/{API_VERSION}/Accounts/{}", self.base_url, self.account_sid)
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(ApiError {
            code: Some(code),
            message: Some(message),
        }) => format!("sms provider returned {status}: {message} (code {code})"),
        _ => format!("sms provider returned {status}: {body}"),
    }
}

#[async_trait]
impl PluginAdapter for SmsChannel {
    fn name(&self) -> &str {
        "sms-twilio"
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let response = self
            .client
            .get(format!("{}.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("sms health request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        if !response.status().is_success() {
            return Ok(HealthStatus::Unhealthy(error_message(response).await));
        }
        let account: AccountResource = response.json().await.map_err(|e| ParleyError::Channel {
            message: format!("failed to parse sms account: {e}"),
            source: Some(Box::new(e)),
        })?;
        match account.status.as_deref() {
            Some("active") => Ok(HealthStatus::Healthy),
            other => Ok(HealthStatus::Unhealthy(format!(
                "sms account status: {}",
                other.unwrap_or("unknown")
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for SmsChannel {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Sms
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, ParleyError> {
        let to = self.phone.transport_form(&msg.recipient, TransportStyle::Plus)?;
        let form = serde_urlencoded::to_string(MessageForm {
            to: &to,
            from: &self.from_number,
            body: &msg.body,
        })
        .map_err(|e| ParleyError::Internal(format!("failed to encode sms form: {e}")))?;

        let response = self
            .client
            .post(format!("{}/Messages.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(form)
            .send()
            .await
            .map_err(|e| ParleyError::Channel {
                message: format!("sms request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(ParleyError::channel(error_message(response).await));
        }
        let resource: MessageResource = response.json().await.map_err(|e| ParleyError::Channel {
            message: format!("failed to parse sms response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(sid = %resource.sid, status = ?resource.status, "sms queued");
        Ok(MessageId(resource.sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SmsConfig {
        SmsConfig {
            base_url: server.uri(),
            account_sid: Some("AC123".to_string()),
            auth_token: Some("secret".to_string()),
            from_number: Some("+15550001111".to_string()),
        }
    }

    fn channel(server: &MockServer) -> SmsChannel {
        SmsChannel::from_config(&config(server), &IdentityConfig::default(), Duration::from_secs(5))
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn send_posts_form_with_plus_number() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            // base64("AC123:secret")
            .and(header("authorization", "Basic QUMxMjM6c2VjcmV0"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("To=%2B5215512345678"))
            .and(body_string_contains("From=%2B15550001111"))
            .and(body_string_contains("Body=Tu+c%C3%B3digo+es+1234"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"sid": "SM1", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = channel(&server)
            .send(OutboundMessage::new("5512345678", "Tu código es 1234"))
            .await
            .unwrap();
        assert_eq!(id, MessageId("SM1".to_string()));
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number."
            })))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send(OutboundMessage::new("5512345678", "hola"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("21211"));
    }

    #[tokio::test]
    async fn health_reads_account_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "suspended"})),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            channel(&server).health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn incomplete_credentials_disable_sms() {
        let config = SmsConfig {
            account_sid: Some("AC123".to_string()),
            ..SmsConfig::default()
        };
        assert!(
            SmsChannel::from_config(&config, &IdentityConfig::default(), Duration::from_secs(5))
                .unwrap()
                .is_none()
        );
    }
}
