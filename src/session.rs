use tokio::sync::mpsc;

use crate::audio::buffer::SampleAccumulator;
use crate::audio::capture::AudioCapture;
use crate::audio::pcm::{self, PcmPayload};
use crate::config::AudioConfig;
use crate::error::{Result, TerpError};
use crate::language::Language;
use crate::state::{SessionState, StateMachine};

/// Capacity of the async block channel between the bridge thread and the
/// control loop.
const BLOCK_CHANNEL_CAPACITY: usize = 64;

/// One start-to-stop recording cycle and its single remote exchange.
///
/// Owns the microphone capture, the accumulator, and the state machine, so
/// there is exactly one place where a session can be live and one set of
/// guards deciding when audio flows. The device and the capture graph are
/// exclusive resources: `start()` while a session is active is a no-op.
pub struct CaptureSession {
    config: AudioConfig,
    machine: StateMachine,
    accumulator: SampleAccumulator,
    capture: Option<AudioCapture>,
    sample_rate: u32,
}

impl CaptureSession {
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            machine: StateMachine::new(),
            accumulator: SampleAccumulator::new(),
            capture: None,
            sample_rate: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.machine.state()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Acquire the microphone and start accumulating.
    ///
    /// Returns a receiver of audio blocks on success; the control loop must
    /// feed each one back through [`push_block`](Self::push_block) and treat
    /// the receiver closing as the capture-quiesced signal. Returns
    /// `Ok(None)` when a session is already active (idempotent no-op).
    /// On error the device is not held and the state returns to Idle.
    pub fn start(&mut self) -> Result<Option<mpsc::Receiver<Vec<f32>>>> {
        if !self.machine.begin_request() {
            tracing::debug!("start ignored: session is {}", self.state());
            return Ok(None);
        }

        let capture = match AudioCapture::new(&self.config).and_then(|c| {
            c.start()?;
            Ok(c)
        }) {
            Ok(capture) => capture,
            Err(e) => {
                self.machine.fail_request();
                return Err(e);
            }
        };

        self.accumulator.clear();
        self.sample_rate = capture.sample_rate();

        let (block_tx, block_rx) = mpsc::channel(BLOCK_CHANNEL_CAPACITY);
        crate::audio::start_block_bridge(&capture, block_tx);
        self.capture = Some(capture);

        self.machine.begin_listening();
        tracing::info!("listening at {} Hz", self.sample_rate);
        Ok(Some(block_rx))
    }

    /// Append one delivered block, in arrival order.
    ///
    /// Accepted while Listening, and also while Processing: blocks already
    /// in flight when `stop()` ran still belong to the utterance.
    pub fn push_block(&mut self, block: Vec<f32>) {
        match self.state() {
            SessionState::Listening | SessionState::Processing => {
                self.accumulator.push_block(block);
            }
            state => {
                tracing::debug!("discarding block delivered while {state}");
            }
        }
    }

    /// Request a stop. Returns false (no-op) unless Listening.
    ///
    /// Moves to Processing immediately so duplicate stops are rejected,
    /// releases the microphone, and tears down the capture. Conversion does
    /// not happen here: the caller waits for the block receiver to close
    /// (all in-flight blocks delivered) and then calls
    /// [`finish_capture`](Self::finish_capture).
    pub fn stop(&mut self) -> bool {
        if !self.machine.begin_processing() {
            tracing::debug!("stop ignored: session is {}", self.state());
            return false;
        }

        self.release_capture();
        true
    }

    /// Convert the accumulated audio once capture has quiesced.
    ///
    /// Clears the accumulator on success so the payload is built exactly
    /// once. An empty capture finishes the session immediately and reports
    /// `EmptyCapture`; otherwise the session stays in Processing until
    /// [`complete`](Self::complete) or [`force_stop`](Self::force_stop).
    pub fn finish_capture(&mut self, language: Language) -> Result<PcmPayload> {
        let Some(payload) = pcm::convert(&self.accumulator, self.sample_rate, language) else {
            self.machine.finish();
            return Err(TerpError::EmptyCapture);
        };

        tracing::info!(
            "captured {} samples ({} blocks) -> {} bytes PCM",
            payload.sample_count(),
            self.accumulator.block_count(),
            payload.bytes.len(),
        );
        self.accumulator.clear();
        Ok(payload)
    }

    /// Mark the in-flight utterance as answered; Processing -> Idle.
    pub fn complete(&mut self) {
        self.machine.finish();
    }

    /// Tear down unconditionally, as if the user pressed stop, but without
    /// sending anything. Used when the server connection drops so the
    /// microphone is released and the state cannot desync.
    pub fn force_stop(&mut self) {
        self.release_capture();
        self.accumulator.clear();

        match self.state() {
            SessionState::Listening => {
                self.machine.begin_processing();
                self.machine.finish();
            }
            SessionState::Processing => {
                self.machine.finish();
            }
            SessionState::Requesting => {
                self.machine.fail_request();
            }
            SessionState::Idle => {}
        }
    }

    fn release_capture(&mut self) {
        if let Some(capture) = self.capture.take() {
            let dropped = capture.dropped_blocks();
            if dropped > 0 {
                tracing::warn!("{dropped} audio blocks dropped during capture");
            }
            if let Err(e) = capture.pause() {
                tracing::warn!("{e}");
            }
            // Dropping the capture releases the device and disconnects the
            // block channel; the bridge thread drains and exits.
        }
    }

    /// Walk the state machine to Listening without touching audio hardware.
    #[cfg(test)]
    pub(crate) fn pretend_listening(&mut self, sample_rate: u32) {
        assert!(self.machine.begin_request());
        assert!(self.machine.begin_listening());
        self.accumulator.clear();
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening_session() -> CaptureSession {
        let mut session = CaptureSession::new(AudioConfig::default());
        session.pretend_listening(16000);
        session
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut session = CaptureSession::new(AudioConfig::default());
        assert!(!session.stop());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn stop_transitions_to_processing_and_rejects_duplicates() {
        let mut session = listening_session();
        assert!(session.stop());
        assert_eq!(session.state(), SessionState::Processing);
        assert!(!session.stop());
    }

    #[test]
    fn blocks_are_discarded_while_idle() {
        let mut session = CaptureSession::new(AudioConfig::default());
        session.push_block(vec![0.5; 128]);
        session.pretend_listening(16000);
        assert!(session.finish_capture(Language::Hindi).is_err());
    }

    #[test]
    fn in_flight_blocks_after_stop_are_kept() {
        let mut session = listening_session();
        session.push_block(vec![0.1; 128]);
        assert!(session.stop());
        session.push_block(vec![0.2; 128]);

        let payload = session
            .finish_capture(Language::Hindi)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(payload.sample_count(), 256);
    }

    #[test]
    fn empty_capture_reports_and_returns_to_idle() {
        let mut session = listening_session();
        assert!(session.stop());

        let result = session.finish_capture(Language::Hindi);
        assert!(matches!(result, Err(TerpError::EmptyCapture)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn utterance_lifecycle_produces_one_payload() {
        let mut session = listening_session();
        for _ in 0..3 {
            session.push_block(vec![0.25; 128]);
        }
        assert!(session.stop());

        let payload = session
            .finish_capture(Language::French)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(payload.sample_count(), 384);
        assert_eq!(payload.bytes.len(), 768);
        assert_eq!(payload.sample_rate, 16000);
        assert_eq!(payload.language, Language::French);

        // Still processing until the server answers.
        assert_eq!(session.state(), SessionState::Processing);
        session.complete();
        assert_eq!(session.state(), SessionState::Idle);

        // Accumulator was cleared by the conversion.
        assert!(matches!(
            session.finish_capture(Language::French),
            Err(TerpError::EmptyCapture)
        ));
    }

    #[test]
    fn force_stop_while_listening_returns_to_idle() {
        let mut session = listening_session();
        session.push_block(vec![0.1; 64]);
        session.force_stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn force_stop_while_processing_returns_to_idle() {
        let mut session = listening_session();
        assert!(session.stop());
        session.force_stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn start_after_completed_cycle_is_allowed() {
        let mut session = listening_session();
        assert!(session.stop());
        session.complete();
        // The machine is back at Idle, so a new request is accepted.
        session.pretend_listening(48000);
        assert_eq!(session.state(), SessionState::Listening);
        assert_eq!(session.sample_rate(), 48000);
    }
}
