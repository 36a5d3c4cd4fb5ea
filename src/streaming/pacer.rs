//! Smooth output pacing
//!
//! Provider deltas arrive in bursts. The pacer buffers their characters and
//! releases them in fixed-size batches on a fixed interval, so the consumer
//! sees a steady typing effect regardless of upstream chunking.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

use super::processor::OutputSender;
use crate::config::StreamingSpeedConfig;

/// Why the pacer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PacerExit {
    /// Input closed and every buffered character was emitted
    Drained { chars: usize },
    /// The consumer dropped the output stream
    ClientGone { chars: usize },
}

/// Spawn a pacer writing batches of text into `output`.
///
/// Dropping the returned sender lets the pacer drain its buffer and exit.
pub(crate) fn spawn_pacer(
    speed: StreamingSpeedConfig,
    output: OutputSender,
) -> (mpsc::UnboundedSender<String>, JoinHandle<PacerExit>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_pacer(rx, output, speed));
    (tx, handle)
}

async fn run_pacer(
    mut input: mpsc::UnboundedReceiver<String>,
    output: OutputSender,
    speed: StreamingSpeedConfig,
) -> PacerExit {
    let batch_size = speed.batch_size();
    let mut ticker = interval(speed.delay());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buffer: VecDeque<char> = VecDeque::new();
    let mut emitted = 0usize;

    loop {
        if buffer.is_empty() {
            match input.recv().await {
                Some(text) => buffer.extend(text.chars()),
                None => {
                    debug!(chars = emitted, "Pacer drained");
                    return PacerExit::Drained { chars: emitted };
                }
            }
        }

        ticker.tick().await;

        while let Ok(text) = input.try_recv() {
            buffer.extend(text.chars());
        }

        let take = batch_size.min(buffer.len());
        if take == 0 {
            continue;
        }
        let batch: String = buffer.drain(..take).collect();

        if output.send(Ok(Bytes::from(batch))).is_err() {
            return PacerExit::ClientGone { chars: emitted };
        }
        emitted += take;
    }
}
