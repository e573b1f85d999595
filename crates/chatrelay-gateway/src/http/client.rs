//! Chat-client ingress, POST /client/messages.
//!
//! The client bridge posts every message it sees; the relay answers only
//! group messages that mention the bot, and replies synchronously in the
//! response body for the bridge to deliver.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, trace};

use chatrelay_agent::InboundEvent;
use chatrelay_channels::{CollectedReply, DispatchOutcome, DispatchTarget, ReplyCollector};
use chatrelay_core::config::ClientConfig;
use chatrelay_core::ConversationKey;

use crate::app::AppState;
use crate::auth::{auth_error, verify_bearer_token};

pub const CLIENT_CHANNEL: &str = "client";

#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub sender: String,
    /// Group (or user) the message was posted in; keys the history.
    pub conversation_id: String,
    pub text: String,
    #[serde(default)]
    pub is_at: bool,
    #[serde(default)]
    pub is_group: bool,
    /// The bot's display name; `"@" + bot_nickname` is stripped from `text`.
    pub bot_nickname: String,
}

/// Group messages that mention the bot, optionally from a single conversation.
fn accepts(config: &ClientConfig, msg: &ClientMessage) -> bool {
    if !(msg.is_group && msg.is_at) {
        return false;
    }
    match &config.group_id_only {
        Some(only) => *only == msg.conversation_id,
        None => true,
    }
}

/// POST /client/messages
pub async fn client_message_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(msg): Json<ClientMessage>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.client;
    if !cfg.enabled {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "client ingress is disabled"})),
        ));
    }
    if let Some(token) = cfg.token.as_deref() {
        verify_bearer_token(&headers, Some(token)).map_err(auth_error)?;
    }

    if !accepts(cfg, &msg) {
        trace!(
            conversation = %msg.conversation_id,
            is_group = msg.is_group,
            is_at = msg.is_at,
            "client message ignored"
        );
        return Ok(Json(json!({"handled": false})));
    }
    info!(sender = %msg.sender, conversation = %msg.conversation_id, "client message received");

    let event = InboundEvent::new(
        CLIENT_CHANNEL,
        ConversationKey::new(msg.conversation_id.as_str()),
        msg.text,
        format!("@{}", msg.bot_nickname),
        DispatchTarget::Sender {
            conversation: msg.conversation_id,
        },
    );
    let collector = ReplyCollector::new(CLIENT_CHANNEL);
    let outcomes = state.pipeline.process(&event, &collector).await;

    let replies: Vec<Value> = collector.drain().into_iter().map(reply_json).collect();
    let outcomes: Vec<Value> = outcomes.iter().map(outcome_json).collect();

    Ok(Json(json!({
        "handled": true,
        "event_id": event.id,
        "replies": replies,
        "outcomes": outcomes,
    })))
}

fn reply_json(reply: CollectedReply) -> Value {
    match reply {
        CollectedReply::Text(text) => json!({"kind": "text", "text": text}),
        CollectedReply::Image(bytes) => {
            json!({"kind": "image", "data_base64": STANDARD.encode(bytes)})
        }
    }
}

fn outcome_json(outcome: &DispatchOutcome) -> Value {
    json!({
        "kind": outcome.kind,
        "payload": outcome.payload,
        "delivered": outcome.is_delivered(),
        "error": outcome.result.as_ref().err().map(|e| e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::http::testing::{self, json_body, read_json};

    fn post(value: Value) -> Request<axum::body::Body> {
        Request::post("/client/messages")
            .header("content-type", "application/json")
            .body(json_body(&value))
            .unwrap()
    }

    fn message(text: &str) -> Value {
        json!({
            "sender": "alice",
            "conversation_id": "group-1",
            "text": text,
            "is_at": true,
            "is_group": true,
            "bot_nickname": "bot"
        })
    }

    #[tokio::test]
    async fn mentioned_group_message_gets_text_reply() {
        let (router, _) = testing::router(testing::config());

        let resp = router.oneshot(post(message("@bot hello"))).await.unwrap();

        assert_eq!(resp.status(), 200);
        let body = read_json(resp).await;
        assert_eq!(body["handled"], true);
        assert_eq!(body["replies"], json!([{"kind": "text", "text": "re: hello"}]));
        assert_eq!(body["outcomes"][0]["delivered"], true);
    }

    #[tokio::test]
    async fn image_replies_are_base64_encoded() {
        let (router, _) = testing::router(testing::config());

        let resp = router
            .oneshot(post(message("@bot [images] cat")))
            .await
            .unwrap();

        let body = read_json(resp).await;
        assert_eq!(
            body["replies"],
            json!([{"kind": "image", "data_base64": STANDARD.encode("cat")}])
        );
        assert_eq!(body["outcomes"][0]["kind"], "image");
        assert_eq!(body["outcomes"][0]["payload"], "https://img/cat");
    }

    #[tokio::test]
    async fn gateway_failure_is_reported_in_reply() {
        let (router, _) = testing::router(testing::config());

        let resp = router.oneshot(post(message("@bot fail"))).await.unwrap();

        let body = read_json(resp).await;
        assert_eq!(
            body["replies"],
            json!([{"kind": "text", "text": "gtp request error. boom"}])
        );
        assert_eq!(body["outcomes"][0]["delivered"], false);
    }

    #[tokio::test]
    async fn unmentioned_or_private_messages_are_not_handled() {
        let (router, _) = testing::router(testing::config());

        let mut msg = message("hello");
        msg["is_at"] = json!(false);
        let body = read_json(router.clone().oneshot(post(msg)).await.unwrap()).await;
        assert_eq!(body, json!({"handled": false}));

        let mut msg = message("@bot hello");
        msg["is_group"] = json!(false);
        let body = read_json(router.oneshot(post(msg)).await.unwrap()).await;
        assert_eq!(body, json!({"handled": false}));
    }

    #[tokio::test]
    async fn ignored_messages_stay_below_info() {
        let (router, _) = testing::router(testing::config());
        let (logs, _guard) = testing::capture_logs(tracing::Level::INFO);

        let mut msg = message("just chatting");
        msg["is_at"] = json!(false);
        let body = read_json(router.clone().oneshot(post(msg)).await.unwrap()).await;
        assert_eq!(body["handled"], false);
        assert!(!logs.contents().contains("client message"));

        router.oneshot(post(message("@bot hi"))).await.unwrap();
        assert!(logs.contents().contains("client message received"));
    }

    #[tokio::test]
    async fn group_id_only_restricts_conversations() {
        let mut config = testing::config();
        config.client.group_id_only = Some("group-2".into());
        let (router, _) = testing::router(config);

        let body = read_json(router.oneshot(post(message("@bot hi"))).await.unwrap()).await;
        assert_eq!(body["handled"], false);
    }

    #[tokio::test]
    async fn token_is_enforced_when_configured() {
        let mut config = testing::config();
        config.client.token = Some("t0ken".into());
        let (router, _) = testing::router(config);

        let resp = router
            .clone()
            .oneshot(post(message("@bot hi")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut req = post(message("@bot hi"));
        req.headers_mut()
            .insert("authorization", "Bearer t0ken".parse().unwrap());
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
