//! Wire protocol for the translation service.
//!
//! Messages are JSON text frames tagged with an `"event"` field. Audio
//! payloads travel as base64 inside the `process_audio` event.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::audio::pcm::PcmPayload;
use crate::error::{Result, TerpError};
use crate::language::Language;

/// Events sent to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    /// Submit one completed utterance for transcription and translation.
    #[serde(rename = "process_audio")]
    ProcessAudio {
        /// Base64-encoded 16-bit signed little-endian PCM.
        audio: String,
        sample_rate: u32,
        sample_width: u16,
        language: Language,
    },

    /// Change the recognition/translation source language.
    #[serde(rename = "set_language")]
    SetLanguage { language: Language },
}

impl ClientEvent {
    #[must_use]
    pub fn process_audio(payload: &PcmPayload) -> Self {
        Self::ProcessAudio {
            audio: BASE64.encode(&payload.bytes),
            sample_rate: payload.sample_rate,
            sample_width: payload.sample_width,
            language: payload.language,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| TerpError::Network(format!("failed to encode event: {e}")))
    }
}

/// Events received from the server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// One completed utterance result.
    #[serde(rename = "translation_update")]
    TranslationUpdate { original: String, translated: String },

    /// Advisory state text. Ignored while Listening so it cannot override
    /// the listening indicator.
    #[serde(rename = "status_update")]
    StatusUpdate { status: String },
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| TerpError::Network(format!("failed to decode server event: {e}")))
    }
}

/// What the transport delivers to the control loop: server events plus
/// channel availability transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Translation { original: String, translated: String },
    Status { text: String },
}

impl From<ServerEvent> for ChannelEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::TranslationUpdate {
                original,
                translated,
            } => Self::Translation {
                original,
                translated,
            },
            ServerEvent::StatusUpdate { status } => Self::Status { text: status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn process_audio_shape() {
        let payload = PcmPayload {
            bytes: vec![0xFF, 0x7F, 0x00, 0x80],
            sample_rate: 48000,
            sample_width: 2,
            language: Language::Punjabi,
        };
        let event = ClientEvent::process_audio(&payload);
        let encoded = event.encode().unwrap_or_else(|e| panic!("{e}"));
        let value: Value = serde_json::from_str(&encoded).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(value["event"], "process_audio");
        assert_eq!(value["audio"], BASE64.encode(&payload.bytes));
        assert_eq!(value["sample_rate"], 48000);
        assert_eq!(value["sample_width"], 2);
        assert_eq!(value["language"], "pa-IN");
    }

    #[test]
    fn set_language_shape() {
        let event = ClientEvent::SetLanguage {
            language: Language::German,
        };
        let encoded = event.encode().unwrap_or_else(|e| panic!("{e}"));
        let value: Value = serde_json::from_str(&encoded).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            value,
            json!({"event": "set_language", "language": "de-DE"})
        );
    }

    #[test]
    fn decode_translation_update() {
        let event = ServerEvent::decode(
            r#"{"event": "translation_update", "original": "hello", "translated": "bonjour"}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            event,
            ServerEvent::TranslationUpdate {
                original: "hello".to_string(),
                translated: "bonjour".to_string(),
            }
        );
    }

    #[test]
    fn decode_status_update() {
        let event = ServerEvent::decode(r#"{"event": "status_update", "status": "Ready"}"#)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            ChannelEvent::from(event),
            ChannelEvent::Status {
                text: "Ready".to_string()
            }
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(ServerEvent::decode(r#"{"event": "reboot"}"#).is_err());
        assert!(ServerEvent::decode("not json").is_err());
    }
}
