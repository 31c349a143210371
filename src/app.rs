use std::path::Path;

use tokio::sync::mpsc;

use crate::audio::wav;
use crate::config::Config;
use crate::error::{Result, TerpError};
use crate::language::Language;
use crate::net::client::Channel;
use crate::net::protocol::ChannelEvent;
use crate::session::CaptureSession;
use crate::state::SessionState;
use crate::transcript::Transcript;

/// Commands typed on stdin. Everything here is UI glue; the interesting
/// decisions live in the session and the channel handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Start,
    Stop,
    Language(Language),
    Export,
    Quit,
}

pub fn parse_command(line: &str) -> std::result::Result<UiCommand, String> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("start") => Ok(UiCommand::Start),
        Some("stop") => Ok(UiCommand::Stop),
        Some("lang" | "language") => {
            let tag = words
                .next()
                .ok_or_else(|| "usage: lang <tag> (e.g. lang fr-FR)".to_string())?;
            tag.parse::<Language>()
                .map(UiCommand::Language)
                .map_err(|e| e.to_string())
        }
        Some("export") => Ok(UiCommand::Export),
        Some("quit" | "exit") => Ok(UiCommand::Quit),
        Some(other) => Err(format!(
            "unknown command '{other}' (start, stop, lang <tag>, export, quit)"
        )),
        None => Err(String::new()),
    }
}

/// Read stdin lines on a plain thread and forward parsed commands.
fn spawn_stdin_reader(tx: mpsc::Sender<UiCommand>) {
    std::thread::spawn(move || {
        use std::io::BufRead;

        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Ok(cmd) => {
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                Err(msg) => {
                    if !msg.is_empty() {
                        eprintln!("{msg}");
                    }
                }
            }
        }

        tracing::debug!("stdin reader exiting");
    });
}

/// Main control loop: connect, then multiplex stdin commands, channel
/// events, and captured audio blocks on a single task.
pub async fn run(config: Config) -> Result<()> {
    let (channel, mut event_rx) = Channel::connect(&config.server.url).await?;
    tracing::info!("connected to {}", config.server.url);

    let mut session = CaptureSession::new(config.audio.clone());
    let mut transcript = Transcript::new();
    let mut language = config.language;
    let dump_dir = config
        .audio
        .dump_dir
        .as_deref()
        .map(Config::expand_path);

    // Align the server with the configured language before the first
    // utterance; the server's own default may differ.
    channel.send_language(language);

    let (cmd_tx, mut cmd_rx) = mpsc::channel(16);
    spawn_stdin_reader(cmd_tx);

    println!("Commands: start, stop, lang <tag>, export, quit");
    println!("Language: {} ({})", language.tag(), language.name());

    let mut block_rx: Option<mpsc::Receiver<Vec<f32>>> = None;
    let mut disconnected = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    UiCommand::Start => match session.start() {
                        Ok(Some(rx)) => {
                            transcript.clear();
                            block_rx = Some(rx);
                            println!("Listening... (type 'stop' to finish the utterance)");
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!("{e}");
                            println!("Could not start: {e}");
                        }
                    },
                    UiCommand::Stop => {
                        if session.stop() {
                            println!("Processing...");
                            // Conversion waits for the block channel to
                            // close, handled in the block branch below.
                        }
                    }
                    UiCommand::Language(lang) => {
                        language = lang;
                        channel.send_language(lang);
                        println!("Language: {} ({})", lang.tag(), lang.name());
                    }
                    UiCommand::Export => {
                        let path = Config::expand_path(&config.output.transcript_path);
                        match transcript.export(&path) {
                            Ok(()) => println!("Transcript written to {}", path.display()),
                            Err(e) => tracing::error!("{e}"),
                        }
                    }
                    UiCommand::Quit => break,
                }
            }

            event = event_rx.recv() => {
                let event = event.unwrap_or(ChannelEvent::Disconnected);
                if handle_channel_event(event, &mut session, &mut transcript) {
                    disconnected = true;
                    break;
                }
            }

            block = recv_block(&mut block_rx), if block_rx.is_some() => {
                match block {
                    Some(block) => session.push_block(block),
                    None => {
                        // Producer quiesced: every block is in, safe to convert.
                        block_rx = None;
                        if session.state() == SessionState::Processing {
                            flush_utterance(&mut session, &channel, language, dump_dir.as_deref());
                        }
                    }
                }
            }
        }
    }

    session.force_stop();

    if !transcript.is_empty() {
        let path = Config::expand_path(&config.output.transcript_path);
        if let Err(e) = transcript.export(&path) {
            tracing::error!("{e}");
        }
    }

    if disconnected {
        return Err(TerpError::Disconnected);
    }
    Ok(())
}

async fn recv_block(rx: &mut Option<mpsc::Receiver<Vec<f32>>>) -> Option<Vec<f32>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

/// Convert and send the finished utterance. The send happens at most once
/// per session: conversion consumes the accumulator, and an empty capture
/// skips the channel entirely.
fn flush_utterance(
    session: &mut CaptureSession,
    channel: &Channel,
    language: Language,
    dump_dir: Option<&Path>,
) {
    match session.finish_capture(language) {
        Ok(payload) => {
            if let Some(dir) = dump_dir {
                match wav::dump_utterance(dir, &payload) {
                    Ok(path) => tracing::debug!("utterance dumped to {}", path.display()),
                    Err(e) => tracing::warn!("{e}"),
                }
            }
            channel.send_audio(&payload);
            println!("Sent {} bytes of audio, awaiting translation...", payload.bytes.len());
        }
        Err(TerpError::EmptyCapture) => {
            println!("No audio recorded.");
        }
        Err(e) => tracing::error!("{e}"),
    }
}

/// Apply one channel event. Returns true when the connection is gone and
/// the loop should wind down.
fn handle_channel_event(
    event: ChannelEvent,
    session: &mut CaptureSession,
    transcript: &mut Transcript,
) -> bool {
    match event {
        ChannelEvent::Connected => {
            println!("Ready.");
            false
        }
        ChannelEvent::Disconnected => {
            tracing::warn!("server connection lost");
            // Force-stop so the microphone is released and the state
            // machine cannot stay stuck in Listening or Processing.
            session.force_stop();
            true
        }
        ChannelEvent::Translation {
            original,
            translated,
        } => {
            println!("Original:   {original}");
            println!("Translated: {translated}");
            transcript.push(original, translated);
            session.complete();
            false
        }
        ChannelEvent::Status { text } => {
            if session.state() == SessionState::Listening {
                // Advisory only; never let it override the listening
                // indicator.
                tracing::debug!("status ignored while listening: {text}");
            } else {
                println!("[server] {text}");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::net::protocol::ClientEvent;

    fn listening_session() -> CaptureSession {
        let mut session = CaptureSession::new(AudioConfig::default());
        session.pretend_listening(16000);
        session
    }

    #[test]
    fn parse_commands() {
        assert_eq!(parse_command("start"), Ok(UiCommand::Start));
        assert_eq!(parse_command("  stop "), Ok(UiCommand::Stop));
        assert_eq!(
            parse_command("lang es-ES"),
            Ok(UiCommand::Language(Language::Spanish))
        );
        assert_eq!(
            parse_command("language en-US"),
            Ok(UiCommand::Language(Language::EnglishUs))
        );
        assert_eq!(parse_command("export"), Ok(UiCommand::Export));
        assert_eq!(parse_command("quit"), Ok(UiCommand::Quit));
        assert!(parse_command("lang").is_err());
        assert!(parse_command("lang xx-XX").is_err());
        assert!(parse_command("record").is_err());
    }

    #[tokio::test]
    async fn utterance_is_sent_exactly_once() {
        let (channel, mut sent) = Channel::test_pair();
        let mut session = listening_session();
        for _ in 0..3 {
            session.push_block(vec![0.5; 128]);
        }
        assert!(session.stop());

        flush_utterance(&mut session, &channel, Language::Hindi, None);

        match sent.try_recv() {
            Ok(ClientEvent::ProcessAudio {
                sample_rate,
                sample_width,
                language,
                ..
            }) => {
                assert_eq!(sample_rate, 16000);
                assert_eq!(sample_width, 2);
                assert_eq!(language, Language::Hindi);
            }
            other => panic!("expected ProcessAudio, got {other:?}"),
        }
        assert!(sent.try_recv().is_err(), "send must happen exactly once");
    }

    #[tokio::test]
    async fn empty_capture_never_sends() {
        let (channel, mut sent) = Channel::test_pair();
        let mut session = listening_session();
        assert!(session.stop());

        flush_utterance(&mut session, &channel, Language::Hindi, None);

        assert!(sent.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn translation_appends_entry_and_idles() {
        let mut session = listening_session();
        assert!(session.stop());
        let mut transcript = Transcript::new();

        let done = handle_channel_event(
            ChannelEvent::Translation {
                original: "hello".to_string(),
                translated: "bonjour".to_string(),
            },
            &mut session,
            &mut transcript,
        );

        assert!(!done);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].original, "hello");
        assert_eq!(transcript.entries()[0].translated, "bonjour");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn disconnect_while_listening_forces_stop() {
        let mut session = listening_session();
        let mut transcript = Transcript::new();

        let done = handle_channel_event(ChannelEvent::Disconnected, &mut session, &mut transcript);

        assert!(done);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn status_is_ignored_while_listening() {
        let mut session = listening_session();
        let mut transcript = Transcript::new();

        // No state change, no transcript entry; the text is only logged.
        let done = handle_channel_event(
            ChannelEvent::Status {
                text: "Processing...".to_string(),
            },
            &mut session,
            &mut transcript,
        );

        assert!(!done);
        assert_eq!(session.state(), SessionState::Listening);
        assert!(transcript.is_empty());
    }
}
