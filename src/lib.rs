//! Live speech translation client.
//!
//! Captures microphone audio one utterance at a time, converts it to 16-bit
//! little-endian PCM, and exchanges it with a translation server over a
//! websocket channel. Results accumulate in an in-memory transcript that can
//! be exported as plain text.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod language;
pub mod net;
pub mod session;
pub mod state;
pub mod transcript;
