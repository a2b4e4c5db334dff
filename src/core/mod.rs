//! Core monitoring logic.
//!
//! This module contains:
//! - The bounded trailing signal window and rate estimation
//! - The rule-based risk classifier
//! - The alert threshold policy for standard and infant subjects

pub mod classifier;
pub mod thresholds;
pub mod window;

// Re-export commonly used types
pub use classifier::{classify, population_variance, RiskAssessment, RiskLevel};
pub use thresholds::{AlertThresholds, VitalRange, VitalStatus};
pub use window::{SignalWindow, DEFAULT_CAPACITY, MIN_RATE_SAMPLES, RATE_WINDOW};
