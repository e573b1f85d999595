//! Outbound REST client for the IM platform.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use chatrelay_channels::{Channel, ChannelError, DispatchTarget};
use chatrelay_core::config::ImConfig;

use crate::error::ImError;
use crate::CHANNEL_NAME;

const SEND_MSG_PATH: &str = "/v4/openim/sendmsg";
const SEND_GROUP_MSG_PATH: &str = "/v4/group_open_http_svc/send_group_msg";

/// Sends text as the admin account through the platform REST API.
pub struct ImChannel {
    client: reqwest::Client,
    base_url: String,
    sdk_app_id: u64,
    admin_account: String,
    user_sig: String,
    timeout: Duration,
}

impl ImChannel {
    pub fn new(config: &ImConfig) -> Result<Self, ImError> {
        if config.admin_account.is_empty() {
            return Err(ImError::NoAdminAccount);
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sdk_app_id: config.sdk_app_id,
            admin_account: config.admin_account.clone(),
            user_sig: config.user_sig.clone(),
            timeout,
        })
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_text_to_user(
        &self,
        sender: &str,
        recipient: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let nonce = random();
        let body = serde_json::json!({
            "SyncOtherMachine": 1,
            "From_Account": sender,
            "To_Account": recipient,
            "MsgRandom": nonce,
            "MsgBody": text_body(text),
        });
        self.post(SEND_MSG_PATH, nonce, &body).await
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_text_to_group(&self, group_id: &str, text: &str) -> Result<(), ChannelError> {
        let nonce = random();
        let body = serde_json::json!({
            "GroupId": group_id,
            "From_Account": self.admin_account,
            "Random": nonce,
            "MsgBody": text_body(text),
        });
        self.post(SEND_GROUP_MSG_PATH, nonce, &body).await
    }

    async fn post(&self, path: &str, nonce: u32, body: &serde_json::Value) -> Result<(), ChannelError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .query(&[
                ("sdkappid", self.sdk_app_id.to_string()),
                ("identifier", self.admin_account.clone()),
                ("usersig", self.user_sig.clone()),
                ("random", nonce.to_string()),
                ("contenttype", "json".to_string()),
            ])
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ChannelError::AuthFailed(format!("HTTP {status}")));
        }
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        if !(200..300).contains(&status) {
            warn!(status, path, "IM API error");
            return Err(ChannelError::SendFailed(format!("HTTP {status}: {text}")));
        }

        check_response(&text)?;
        debug!(path, "IM message sent");
        Ok(())
    }

    fn transport_error(&self, e: reqwest::Error) -> ChannelError {
        if e.is_timeout() {
            ChannelError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }
        } else {
            ChannelError::SendFailed(e.to_string())
        }
    }
}

#[async_trait]
impl Channel for ImChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn send_text(&self, target: &DispatchTarget, text: &str) -> Result<(), ChannelError> {
        match target {
            DispatchTarget::User { sender, recipient } => {
                self.send_text_to_user(sender, recipient, text).await
            }
            DispatchTarget::Group { group_id } => self.send_text_to_group(group_id, text).await,
            DispatchTarget::Sender { .. } => Err(ChannelError::UnsupportedTarget {
                channel: CHANNEL_NAME.to_string(),
                target: target.to_string(),
            }),
        }
    }

    async fn send_image(&self, target: &DispatchTarget, _image: Vec<u8>) -> Result<(), ChannelError> {
        warn!(target = %target, "image replies are not implemented for the IM channel");
        Err(ChannelError::Unsupported("IM image send".into()))
    }
}

fn text_body(text: &str) -> serde_json::Value {
    serde_json::json!([{
        "MsgType": "TIMTextElem",
        "MsgContent": { "Text": text },
    }])
}

/// Per-request nonce; the platform dedups messages on it.
fn random() -> u32 {
    uuid::Uuid::new_v4().as_u128() as u32
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(rename = "ActionStatus", default)]
    action_status: String,
    #[serde(rename = "ErrorCode", default)]
    error_code: i64,
    #[serde(rename = "ErrorInfo", default)]
    error_info: String,
}

fn check_response(body: &str) -> Result<(), ChannelError> {
    let resp: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ChannelError::SendFailed(format!("invalid IM response: {e}")))?;
    if resp.action_status == "OK" {
        Ok(())
    } else {
        Err(ChannelError::SendFailed(format!(
            "IM error {}: {}",
            resp.error_code, resp.error_info
        )))
    }
}
