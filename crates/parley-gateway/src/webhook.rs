// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook payload normalisation.
//!
//! One endpoint accepts three shapes, told apart by their keys:
//! - `{"statuses": [{id, status, recipient_id}]}`: delivery status batch
//! - `{"messages": [...], "channel_id": ...}`: provider message batch
//! - `{"channel", "handle", "content", "raw"}`: legacy single message

use serde::Deserialize;
use serde_json::Value;

use parley_core::types::{Channel, DeliveryStatus, MessageType};
use parley_pipeline::{InboundEvent, ProviderMeta};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

impl StatusUpdate {
    /// The delivery status reported, or `None` for statuses we ignore.
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        match self.status.as_str() {
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum WebhookPayload {
    Statuses(Vec<StatusUpdate>),
    Messages(Vec<InboundEvent>),
    Legacy(InboundEvent),
}

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError(pub String);

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn parse_payload(body: &Value) -> Result<WebhookPayload, PayloadError> {
    if let Some(statuses) = body.get("statuses").and_then(Value::as_array) {
        let updates = statuses
            .iter()
            .filter_map(|s| serde_json::from_value::<StatusUpdate>(s.clone()).ok())
            .collect();
        return Ok(WebhookPayload::Statuses(updates));
    }

    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        let channel_id = body.get("channel_id").and_then(Value::as_str);
        let events = messages
            .iter()
            .filter_map(|m| provider_message(m, channel_id))
            .collect();
        return Ok(WebhookPayload::Messages(events));
    }

    legacy_message(body).map(WebhookPayload::Legacy)
}

fn legacy_message(body: &Value) -> Result<InboundEvent, PayloadError> {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
    };
    let (Some(channel), Some(handle), Some(content)) =
        (field("channel"), field("handle"), field("content"))
    else {
        return Err(PayloadError("Missing required fields".to_string()));
    };
    let channel: Channel = channel
        .parse()
        .map_err(|_| PayloadError(format!("unknown channel `{channel}`")))?;

    Ok(InboundEvent {
        channel,
        handle: handle.to_string(),
        content: content.to_string(),
        meta: ProviderMeta {
            raw: body.get("raw").cloned(),
            ..ProviderMeta::default()
        },
    })
}

/// Strip the provider's chat suffix from a handle.
pub fn clean_handle(raw: &str) -> String {
    raw.replace("@s.whatsapp.net", "").replace("@c.us", "")
}

fn provider_message(msg: &Value, channel_id: Option<&str>) -> Option<InboundEvent> {
    let handle = msg
        .get("chat_id")
        .or_else(|| msg.get("from"))
        .and_then(Value::as_str)?;
    let from_me = match msg.get("from_me") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };
    let (content, message_type) = message_content(msg);
    if content.is_empty() && msg.get("type").is_none() {
        return None;
    }

    let id = msg.get("id").and_then(Value::as_str).map(str::to_string);
    let mut meta = if from_me {
        ProviderMeta::self_authored(id)
    } else {
        ProviderMeta {
            id,
            ..ProviderMeta::default()
        }
    };
    meta.reference = channel_id.map(str::to_string);
    meta.message_type = message_type;
    meta.raw = Some(msg.clone());

    Some(InboundEvent {
        channel: Channel::Wa,
        handle: clean_handle(handle),
        content,
        meta,
    })
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn media_link<'a>(msg: &'a Value, kinds: &[&str]) -> Option<&'a str> {
    kinds.iter().find_map(|kind| {
        text_at(msg, &format!("/{kind}/link")).or_else(|| text_at(msg, &format!("/{kind}/url")))
    })
}

fn labelled(label: &str, link: Option<&str>, caption: &str) -> String {
    let head = match link {
        Some(url) => format!("[{label}]({url})"),
        None => format!("[{label}]"),
    };
    if caption.is_empty() {
        head
    } else {
        format!("{head} {caption}")
    }
}

/// Turn a provider message into stored content and a message type.
pub fn message_content(msg: &Value) -> (String, MessageType) {
    let kind = msg.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "text" => (
            text_at(msg, "/text/body").unwrap_or("").to_string(),
            MessageType::Text,
        ),
        "image" => (
            labelled(
                "Image",
                media_link(msg, &["image"]),
                text_at(msg, "/image/caption").unwrap_or(""),
            ),
            MessageType::Image,
        ),
        "video" => (
            labelled(
                "Video",
                media_link(msg, &["video"]),
                text_at(msg, "/video/caption").unwrap_or(""),
            ),
            MessageType::Video,
        ),
        "audio" | "voice" => (
            labelled("Audio", media_link(msg, &["audio", "voice"]), ""),
            MessageType::Audio,
        ),
        "document" | "file" => {
            let caption = text_at(msg, "/document/caption")
                .or_else(|| text_at(msg, "/document/filename"))
                .unwrap_or("");
            (
                labelled("File", media_link(msg, &["document", "file"]), caption),
                MessageType::File,
            )
        }
        "sticker" => (
            labelled("Sticker", media_link(msg, &["sticker"]), ""),
            MessageType::Sticker,
        ),
        "location" => {
            let coord = |key: &str| {
                msg.pointer(&format!("/location/{key}"))
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "?".to_string())
            };
            let (lat, long) = (coord("latitude"), coord("longitude"));
            (
                format!("[Location](https://www.google.com/maps?q={lat},{long}) Lat: {lat}, Long: {long}"),
                MessageType::File,
            )
        }
        "contact" => {
            let names: Vec<String> = msg
                .get("contact")
                .and_then(Value::as_array)
                .map(|contacts| {
                    contacts
                        .iter()
                        .filter_map(|c| {
                            text_at(c, "/name/formatted_name")
                                .or_else(|| c.get("name").and_then(Value::as_str))
                                .map(str::to_string)
                        })
                        .collect()
                })
                .unwrap_or_default();
            (format!("[Shared contact]: {}", names.join(", ")), MessageType::Text)
        }
        "poll" => {
            let title = text_at(msg, "/poll/title").unwrap_or("Poll");
            let options: Vec<&str> = msg
                .pointer("/poll/options")
                .and_then(Value::as_array)
                .map(|opts| opts.iter().filter_map(|o| text_at(o, "/option_name")).collect())
                .unwrap_or_default();
            (
                format!("[Poll]: {title} (Options: {})", options.join(", ")),
                MessageType::Text,
            )
        }
        "order" => {
            let items: Vec<String> = msg
                .pointer("/order/product_items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|i| {
                            let qty = i.get("quantity").map(|q| q.to_string()).unwrap_or_default();
                            let product = text_at(i, "/product_retailer_id").unwrap_or("?");
                            format!("{qty}x {product}")
                        })
                        .collect()
                })
                .unwrap_or_default();
            let total = msg
                .pointer("/order/total_amount/value")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "?".to_string());
            let currency = text_at(msg, "/order/total_amount/currency").unwrap_or("");
            (
                format!("[Order]: {} (Total: {total} {currency})", items.join(", "))
                    .trim_end()
                    .to_string(),
                MessageType::Text,
            )
        }
        "link_preview" => {
            let url = text_at(msg, "/link_preview/url").unwrap_or("");
            let title = text_at(msg, "/link_preview/title").unwrap_or("Link");
            let description = text_at(msg, "/link_preview/description")
                .map(|d| format!("\n> {d}"))
                .unwrap_or_default();
            (
                format!("[Link Preview] [{title}]({url}){description}"),
                MessageType::Text,
            )
        }
        "action" => match text_at(msg, "/action/type") {
            Some("reaction") => (
                format!("(Reaction: {})", text_at(msg, "/action/emoji").unwrap_or("")),
                MessageType::Reaction,
            ),
            Some("delete") => ("This message was deleted.".to_string(), MessageType::Event),
            other => (
                format!("[Action: {}]", other.unwrap_or("unknown")),
                MessageType::Event,
            ),
        },
        "button" => (
            text_at(msg, "/button/text").unwrap_or("[Button]").to_string(),
            MessageType::Button,
        ),
        "interactive" => {
            let content = match text_at(msg, "/interactive/type") {
                Some("button_reply") => text_at(msg, "/interactive/button_reply/title")
                    .unwrap_or("[Button reply]")
                    .to_string(),
                Some("list_reply") => {
                    let title = text_at(msg, "/interactive/list_reply/title").unwrap_or("[List reply]");
                    match text_at(msg, "/interactive/list_reply/description") {
                        Some(d) => format!("{title} ({d})"),
                        None => title.to_string(),
                    }
                }
                other => format!("[Interactive: {}]", other.unwrap_or("unknown")),
            };
            (content, MessageType::Interactive)
        }
        "reply" => (
            text_at(msg, "/reply/text")
                .or_else(|| text_at(msg, "/reply/title"))
                .unwrap_or("[Reply]")
                .to_string(),
            MessageType::Text,
        ),
        "album" => {
            let items = msg.get("album").and_then(Value::as_array);
            let count = items.map_or(0, Vec::len);
            let links: Vec<String> = items
                .into_iter()
                .flatten()
                .filter_map(|i| media_link(i, &["image", "video"]))
                .map(|u| format!("- {u}"))
                .collect();
            let mut content = format!("[Album: {count} files]");
            if !links.is_empty() {
                content.push('\n');
                content.push_str(&links.join("\n"));
            }
            (content, MessageType::File)
        }
        other => {
            let payload = msg.get(other).unwrap_or(msg).to_string();
            let snippet: String = payload.chars().take(100).collect();
            (format!("[File: {other}] {snippet}"), MessageType::File)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{Direction, Role};
    use serde_json::json;

    fn single(body: Value) -> InboundEvent {
        match parse_payload(&body).unwrap() {
            WebhookPayload::Messages(mut events) => events.remove(0),
            other => panic!("expected messages, got {other:?}"),
        }
    }

    #[test]
    fn text_message_is_normalised() {
        let event = single(json!({
            "channel_id": "ACCOUNT-1",
            "messages": [{
                "id": "wamid.1",
                "type": "text",
                "chat_id": "5215512345678@s.whatsapp.net",
                "from_me": false,
                "text": {"body": "Hola, quiero info"}
            }]
        }));
        assert_eq!(event.channel, Channel::Wa);
        assert_eq!(event.handle, "5215512345678");
        assert_eq!(event.content, "Hola, quiero info");
        assert_eq!(event.meta.id.as_deref(), Some("wamid.1"));
        assert_eq!(event.meta.reference.as_deref(), Some("ACCOUNT-1"));
        assert_eq!(event.meta.direction, Direction::Inbound);
    }

    #[test]
    fn from_me_marks_self_authored() {
        let event = single(json!({
            "messages": [{
                "id": "wamid.2",
                "type": "text",
                "from": "5512345678@c.us",
                "from_me": "true",
                "text": {"body": "Te escribo yo"}
            }]
        }));
        assert_eq!(event.handle, "5512345678");
        assert!(event.meta.from_me);
        assert_eq!(event.meta.direction, Direction::Outbound);
        assert_eq!(event.meta.role, Role::Assistant);
    }

    #[test]
    fn media_types_carry_links_and_captions() {
        let (content, kind) = message_content(&json!({
            "type": "image",
            "image": {"link": "https://cdn.example.com/a.jpg", "caption": "mira"}
        }));
        assert_eq!(content, "[Image](https://cdn.example.com/a.jpg) mira");
        assert_eq!(kind, MessageType::Image);

        let (content, kind) = message_content(&json!({"type": "voice", "voice": {"id": "m1"}}));
        assert_eq!(content, "[Audio]");
        assert_eq!(kind, MessageType::Audio);

        let (content, kind) = message_content(&json!({
            "type": "document",
            "document": {"url": "https://cdn.example.com/f.pdf", "filename": "factura.pdf"}
        }));
        assert_eq!(content, "[File](https://cdn.example.com/f.pdf) factura.pdf");
        assert_eq!(kind, MessageType::File);
    }

    #[test]
    fn structured_types_are_summarised() {
        let (content, kind) = message_content(&json!({
            "type": "location",
            "location": {"latitude": 19.4, "longitude": -99.1}
        }));
        assert!(content.contains("Lat: 19.4, Long: -99.1"));
        assert_eq!(kind, MessageType::File);

        let (content, _) = message_content(&json!({
            "type": "poll",
            "poll": {"title": "Color", "options": [{"option_name": "Rojo"}, {"option_name": "Azul"}]}
        }));
        assert_eq!(content, "[Poll]: Color (Options: Rojo, Azul)");

        let (content, _) = message_content(&json!({
            "type": "order",
            "order": {
                "product_items": [{"quantity": 2, "product_retailer_id": "SKU-1"}],
                "total_amount": {"value": 500, "currency": "MXN"}
            }
        }));
        assert_eq!(content, "[Order]: 2x SKU-1 (Total: 500 MXN)");

        let (content, kind) = message_content(&json!({
            "type": "album",
            "album": [{"image": {"link": "https://a/1.jpg"}}, {"video": {"url": "https://a/2.mp4"}}]
        }));
        assert_eq!(content, "[Album: 2 files]\n- https://a/1.jpg\n- https://a/2.mp4");
        assert_eq!(kind, MessageType::File);
    }

    #[test]
    fn actions_and_replies() {
        let (content, kind) = message_content(&json!({
            "type": "action",
            "action": {"type": "reaction", "emoji": "👍"}
        }));
        assert_eq!(content, "(Reaction: 👍)");
        assert_eq!(kind, MessageType::Reaction);

        let (_, kind) = message_content(&json!({"type": "action", "action": {"type": "delete"}}));
        assert_eq!(kind, MessageType::Event);

        let (content, kind) = message_content(&json!({
            "type": "interactive",
            "interactive": {"type": "list_reply", "list_reply": {"title": "Envío", "description": "24h"}}
        }));
        assert_eq!(content, "Envío (24h)");
        assert_eq!(kind, MessageType::Interactive);

        let (content, kind) = message_content(&json!({"type": "button", "button": {"text": "Sí"}}));
        assert_eq!(content, "Sí");
        assert_eq!(kind, MessageType::Button);
    }

    #[test]
    fn unknown_type_is_preserved() {
        let (content, kind) = message_content(&json!({"type": "hsm", "hsm": {"x": 1}}));
        assert_eq!(content, r#"[File: hsm] {"x":1}"#);
        assert_eq!(kind, MessageType::File);
    }

    #[test]
    fn statuses_are_filtered() {
        let payload = parse_payload(&json!({
            "statuses": [
                {"id": "wamid.1", "status": "read", "recipient_id": "5215512345678"},
                {"id": "wamid.2", "status": "pending"}
            ]
        }))
        .unwrap();
        let WebhookPayload::Statuses(updates) = payload else {
            panic!("expected statuses");
        };
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].delivery_status(), Some(DeliveryStatus::Read));
        assert_eq!(updates[1].delivery_status(), None);
    }

    #[test]
    fn legacy_body_requires_all_fields() {
        let payload = parse_payload(&json!({
            "channel": "WEBCHAT",
            "handle": "visitor-42",
            "content": "hola",
            "raw": {"page": "/checkout"}
        }))
        .unwrap();
        let WebhookPayload::Legacy(event) = payload else {
            panic!("expected legacy");
        };
        assert_eq!(event.channel, Channel::Webchat);
        assert_eq!(event.meta.raw, Some(json!({"page": "/checkout"})));

        let err = parse_payload(&json!({"channel": "WA", "handle": "5512345678"})).unwrap_err();
        assert_eq!(err.0, "Missing required fields");
        assert!(parse_payload(&json!({"channel": "TELEGRAM", "handle": "x", "content": "y"})).is_err());
    }
}
