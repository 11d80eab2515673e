//! Probing harness for the EgisTec EH576 fingerprint sensor.
//!
//! Send a command frame, read what comes back, and grade the response by
//! how much of it looks like sensor data.

pub mod analysis;
pub mod artifact;
pub mod classify;
pub mod error;
pub mod fixture;
pub mod frame;
pub mod probe;
pub mod sequence;
pub mod transport;
pub mod usb;

pub use classify::{classify, Classification, Thresholds, Tier, TierRule};
pub use error::{Error, Result};
pub use frame::CommandFrame;
pub use probe::{probe, receive, Outcome, Response};
pub use transport::Transport;
pub use usb::{SessionConfig, UsbSession};
