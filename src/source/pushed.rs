//! Externally-pushed sample source.
//!
//! Samples POSTed by a device land on a bounded channel; the monitor loop
//! drains it non-blockingly on each tick. The loop never waits on producers.

use crate::source::types::SignalSample;
use crate::source::SampleSource;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Channel capacity. Pushes beyond this are dropped rather than blocking
/// the HTTP handler.
const FEED_CAPACITY: usize = 10_000;

/// Sender half handed to the ingress endpoint.
#[derive(Clone)]
pub struct PushHandle {
    sender: Sender<SignalSample>,
    device_id: String,
}

impl PushHandle {
    /// Push a sample into the feed. Returns false if the feed is full
    /// or the monitor side has gone away.
    pub fn push(&self, sample: SignalSample) -> bool {
        match self.sender.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// A source fed by an external producer.
pub struct PushedSource {
    device_id: String,
    receiver: Receiver<SignalSample>,
}

impl PushedSource {
    /// Create a pushed source and the handle that feeds it.
    pub fn new(device_id: impl Into<String>) -> (Self, PushHandle) {
        let (sender, receiver) = bounded(FEED_CAPACITY);
        let device_id = device_id.into();
        let handle = PushHandle {
            sender,
            device_id: device_id.clone(),
        };
        (
            Self {
                device_id,
                receiver,
            },
            handle,
        )
    }
}

impl SampleSource for PushedSource {
    fn poll_sample(&mut self) -> Option<SignalSample> {
        // Drain to the newest queued sample so a bursty producer cannot
        // make the window lag behind real time.
        let mut latest = None;
        while let Ok(sample) = self.receiver.try_recv() {
            latest = Some(sample);
        }
        latest
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_feed_yields_nothing() {
        let (mut source, _handle) = PushedSource::new("bedside-7");
        assert!(source.poll_sample().is_none());
    }

    #[test]
    fn test_poll_returns_newest_sample() {
        let (mut source, handle) = PushedSource::new("bedside-7");
        assert!(handle.push(SignalSample::new(0.1)));
        assert!(handle.push(SignalSample::new(0.2)));
        assert!(handle.push(SignalSample::new(0.3)));

        let sample = source.poll_sample().unwrap();
        assert_eq!(sample.value, 0.3);
        // Feed was drained
        assert!(source.poll_sample().is_none());
    }

    #[test]
    fn test_push_after_source_dropped() {
        let (source, handle) = PushedSource::new("bedside-7");
        drop(source);
        assert!(!handle.push(SignalSample::new(0.5)));
    }
}
