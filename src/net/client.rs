use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::audio::pcm::PcmPayload;
use crate::error::{Result, TerpError};
use crate::language::Language;
use crate::net::protocol::{ChannelEvent, ClientEvent, ServerEvent};

/// Outbound queue depth. Sends beyond this are dropped, which matches the
/// fire-and-forget contract: callers never wait on delivery.
const OUTBOUND_CAPACITY: usize = 32;

/// Bidirectional event channel to the translation service.
///
/// `connect` splits the websocket into two tasks: one drains the outbound
/// queue, one decodes inbound frames into [`ChannelEvent`]s for the control
/// loop. Lifecycle transitions (`Connected`, `Disconnected`) arrive on the
/// same receiver as server events, so the control loop has a single place
/// to react to a lost connection.
pub struct Channel {
    tx: mpsc::Sender<ClientEvent>,
}

impl Channel {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<ChannelEvent>)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TerpError::Network(format!("failed to connect to {url}: {e}")))?;

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ClientEvent>(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(OUTBOUND_CAPACITY);

        let _ = event_tx.send(ChannelEvent::Connected).await;

        // Outbound: queue -> websocket.
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                let json = match event.encode() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!("skipping unencodable event: {e}");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    tracing::debug!("websocket send failed, outbound task exiting");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        // Inbound: websocket -> control loop.
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerEvent::decode(&text) {
                        Ok(event) => {
                            if event_tx.send(event.into()).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => tracing::warn!("{e}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("websocket error: {e}");
                        break;
                    }
                }
            }
            let _ = event_tx.send(ChannelEvent::Disconnected).await;
        });

        Ok((Self { tx: out_tx }, event_rx))
    }

    /// Submit a completed utterance. Fire-and-forget: no acknowledgment is
    /// awaited and a dropped send is not retried.
    pub fn send_audio(&self, payload: &PcmPayload) {
        self.send(ClientEvent::process_audio(payload));
    }

    /// Tell the server which language to recognize and translate from.
    pub fn send_language(&self, language: Language) {
        self.send(ClientEvent::SetLanguage { language });
    }

    fn send(&self, event: ClientEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("outbound queue unavailable, dropping event");
        }
    }

    /// Channel backed by a bare queue, for exercising the control loop
    /// without a server.
    #[cfg(test)]
    pub(crate) fn test_pair() -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { tx }, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// One-shot fake service: expects a process_audio event, answers with a
    /// translation_update, then closes.
    async fn spawn_fake_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let addr = listener.local_addr().unwrap_or_else(|e| panic!("{e}"));

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap_or_else(|e| panic!("{e}"));
            let mut ws = accept_async(stream).await.unwrap_or_else(|e| panic!("{e}"));

            while let Some(Ok(msg)) = ws.next().await {
                let Ok(text) = msg.to_text() else { continue };
                let value: serde_json::Value =
                    serde_json::from_str(text).unwrap_or_else(|e| panic!("{e}"));
                if value["event"] == "process_audio" {
                    assert_eq!(value["sample_width"], 2);
                    let reply = serde_json::json!({
                        "event": "translation_update",
                        "original": "hello",
                        "translated": "bonjour",
                    });
                    ws.send(Message::Text(reply.to_string().into()))
                        .await
                        .unwrap_or_else(|e| panic!("{e}"));
                    break;
                }
            }
            let _ = ws.close(None).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn round_trip_with_fake_server() {
        let url = spawn_fake_server().await;
        let (channel, mut events) = Channel::connect(&url)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(events.recv().await, Some(ChannelEvent::Connected));

        let payload = PcmPayload {
            bytes: vec![0x00, 0x01, 0x02, 0x03],
            sample_rate: 16000,
            sample_width: 2,
            language: Language::Hindi,
        };
        channel.send_audio(&payload);

        assert_eq!(
            events.recv().await,
            Some(ChannelEvent::Translation {
                original: "hello".to_string(),
                translated: "bonjour".to_string(),
            })
        );
        assert_eq!(events.recv().await, Some(ChannelEvent::Disconnected));
    }

    #[tokio::test]
    async fn connect_to_nothing_fails() {
        let result = Channel::connect("ws://127.0.0.1:1/stream").await;
        assert!(matches!(result, Err(TerpError::Network(_))));
    }
}
