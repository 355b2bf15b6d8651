//! Evolution API v2 payload normalization.
//!
//! Pure, tolerant, and fail-closed: anything that cannot be read as a fresh
//! inbound message maps to `None`. Parsing never raises.

use crate::config::digits_only;
use crate::{CanonicalMessage, MessageKind};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    event: Option<String>,
    #[serde(default)]
    data: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    key: Key,
    #[serde(rename = "pushName", default)]
    push_name: Option<String>,
    #[serde(default)]
    message: Body,
    /// Seconds since epoch; some gateway builds send it as a string.
    #[serde(rename = "messageTimestamp", default)]
    timestamp: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Key {
    #[serde(rename = "remoteJid", default)]
    remote_jid: String,
    #[serde(rename = "fromMe", default)]
    from_me: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(default)]
    conversation: Option<String>,
    #[serde(rename = "extendedTextMessage", default)]
    extended: Option<Captioned>,
    #[serde(rename = "imageMessage", default)]
    image: Option<Captioned>,
    #[serde(rename = "videoMessage", default)]
    video: Option<Captioned>,
    #[serde(rename = "documentMessage", default)]
    document: Option<Captioned>,
    #[serde(rename = "audioMessage", default)]
    audio: Option<serde_json::Value>,
    #[serde(rename = "stickerMessage", default)]
    sticker: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Captioned {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

/// Transform a raw gateway payload into a canonical message.
///
/// Returns `None` for self-echoes, non-upsert events, and payloads with no
/// extractable content. Captionless media becomes a placeholder label so the
/// sender still gets an answer.
pub fn normalize(payload: &serde_json::Value) -> Option<CanonicalMessage> {
    let envelope: Envelope = serde_json::from_value(payload.clone()).ok()?;

    if envelope.event.as_deref() != Some("MESSAGES_UPSERT") {
        return None;
    }
    // Ignore echoes of our own outbound messages to avoid reply loops.
    if envelope.data.key.from_me {
        return None;
    }

    let sender = digits_only(&envelope.data.key.remote_jid);
    if sender.is_empty() {
        return None;
    }

    let body = &envelope.data.message;
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    let (text, kind) = if let Some(text) = non_empty(&body.conversation) {
        (text, MessageKind::Text)
    } else if let Some(text) = body.extended.as_ref().and_then(|e| non_empty(&e.text)) {
        (text, MessageKind::ExtendedText)
    } else if let Some(text) = body.image.as_ref().and_then(|m| non_empty(&m.caption)) {
        (text, MessageKind::MediaCaption)
    } else if let Some(text) = body.video.as_ref().and_then(|m| non_empty(&m.caption)) {
        (text, MessageKind::MediaCaption)
    } else if let Some(text) = body.document.as_ref().and_then(|m| non_empty(&m.caption)) {
        (text, MessageKind::MediaCaption)
    } else if body.audio.is_some() {
        ("[audio]".to_string(), MessageKind::MediaPlaceholder)
    } else if body.sticker.is_some() {
        ("[sticker]".to_string(), MessageKind::MediaPlaceholder)
    } else if body.image.is_some() {
        ("[imagen]".to_string(), MessageKind::MediaPlaceholder)
    } else if body.video.is_some() {
        ("[video]".to_string(), MessageKind::MediaPlaceholder)
    } else if body.document.is_some() {
        ("[documento]".to_string(), MessageKind::MediaPlaceholder)
    } else {
        tracing::debug!(sender = %sender, "payload carried no extractable content");
        return None;
    };

    let timestamp = envelope
        .data
        .timestamp
        .as_ref()
        .and_then(|raw| match raw {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now);

    Some(CanonicalMessage {
        sender,
        text,
        kind,
        display_name: envelope.data.push_name.filter(|n| !n.trim().is_empty()),
        source: "evolution_v2".into(),
        timestamp,
        id: envelope.data.key.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(raw: &str) -> Option<CanonicalMessage> {
        let value: serde_json::Value = serde_json::from_str(raw).expect("fixture json");
        normalize(&value)
    }

    #[test]
    fn plain_conversation_message() {
        let message = parse(indoc! {r#"
            {
                "type": "MESSAGES_UPSERT",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net", "fromMe": false, "id": "ABC123"},
                    "pushName": "Ana",
                    "message": {"conversation": "Hola, precio de cejas?"},
                    "messageTimestamp": 1735000000
                }
            }
        "#})
        .expect("canonical message");

        assert_eq!(message.sender, "59170009999");
        assert_eq!(message.text, "Hola, precio de cejas?");
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.display_name.as_deref(), Some("Ana"));
        assert_eq!(message.id.as_deref(), Some("ABC123"));
    }

    #[test]
    fn self_echo_is_ignored() {
        let result = parse(indoc! {r#"
            {
                "type": "MESSAGES_UPSERT",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net", "fromMe": true},
                    "message": {"conversation": "echo"}
                }
            }
        "#});
        assert!(result.is_none());
    }

    #[test]
    fn unsupported_event_is_ignored() {
        let result = parse(indoc! {r#"
            {
                "type": "CONNECTION_UPDATE",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net"},
                    "message": {"conversation": "hola"}
                }
            }
        "#});
        assert!(result.is_none());
    }

    #[test]
    fn extended_text_and_image_caption_are_extracted() {
        let extended = parse(indoc! {r#"
            {
                "type": "MESSAGES_UPSERT",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net"},
                    "message": {"extendedTextMessage": {"text": "respuesta citada"}}
                }
            }
        "#})
        .expect("extended");
        assert_eq!(extended.text, "respuesta citada");
        assert_eq!(extended.kind, MessageKind::ExtendedText);

        let caption = parse(indoc! {r#"
            {
                "type": "MESSAGES_UPSERT",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net"},
                    "message": {"imageMessage": {"caption": "mis cejas hoy"}}
                }
            }
        "#})
        .expect("caption");
        assert_eq!(caption.text, "mis cejas hoy");
        assert_eq!(caption.kind, MessageKind::MediaCaption);
    }

    #[test]
    fn captionless_media_becomes_placeholder() {
        let audio = parse(indoc! {r#"
            {
                "type": "MESSAGES_UPSERT",
                "data": {
                    "key": {"remoteJid": "59170009999@s.whatsapp.net"},
                    "message": {"audioMessage": {"seconds": 12}}
                }
            }
        "#})
        .expect("audio placeholder");
        assert_eq!(audio.text, "[audio]");
        assert_eq!(audio.kind, MessageKind::MediaPlaceholder);
    }

    #[test]
    fn garbage_payload_is_ignored_not_an_error() {
        assert!(parse(r#"{"unexpected": true}"#).is_none());
        assert!(parse(r#"{"type": "MESSAGES_UPSERT", "data": {"key": {"remoteJid": "no-digits"}, "message": {"conversation": "hi"}}}"#).is_none());
        assert!(parse(r#"{"type": "MESSAGES_UPSERT"}"#).is_none());
    }
}
