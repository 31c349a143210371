pub mod buffer;
pub mod capture;
pub mod pcm;
pub mod wav;

use tokio::sync::mpsc;

use self::capture::AudioCapture;

/// Bridge the realtime block channel into the async control loop.
///
/// A dedicated thread drains the capture's crossbeam receiver and forwards
/// each block over a tokio mpsc sender. When the capture is dropped its
/// sender disconnects, the thread drains whatever is left and exits, and
/// dropping `block_tx` closes the async side. That close is the session's
/// quiescence signal: once the control loop sees it, no more blocks can
/// arrive and conversion may begin.
pub fn start_block_bridge(capture: &AudioCapture, block_tx: mpsc::Sender<Vec<f32>>) {
    let raw_rx = capture.receiver();

    std::thread::spawn(move || {
        let mut total_blocks = 0usize;
        let mut total_samples = 0usize;

        while let Ok(block) = raw_rx.recv() {
            total_blocks += 1;
            total_samples += block.len();

            if block_tx.blocking_send(block).is_err() {
                tracing::debug!("block receiver dropped, stopping audio bridge");
                return;
            }
        }

        tracing::debug!("audio bridge exiting: {total_blocks} blocks, {total_samples} samples");
    });
}
