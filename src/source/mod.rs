//! Sample sources for the monitor loop.
//!
//! The loop is source-agnostic: it polls a [`SampleSource`] once per tick.
//! Two implementations are provided - a simulated signal generator and a
//! channel-backed source fed by externally pushed samples.

pub mod pushed;
pub mod simulated;
pub mod types;

// Re-export commonly used types
pub use pushed::{PushHandle, PushedSource};
pub use simulated::SimulatedSource;
pub use types::{
    MetricSample, MetricType, NewMetricSample, SignalSample, UnknownMetricType, DEFAULT_DEVICE_ID,
    DEFAULT_UNIT,
};

/// A producer of signal samples, polled once per monitor tick.
pub trait SampleSource: Send {
    /// Produce the sample for this tick, if one is available.
    fn poll_sample(&mut self) -> Option<SignalSample>;

    /// Identifier of the device this source represents.
    fn device_id(&self) -> &str;
}
