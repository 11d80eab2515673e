use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("permission denied on interface {interface}: {source}")]
    PermissionDenied { interface: u8, source: rusb::Error },

    #[error("send failed: {0}")]
    SendFailed(rusb::Error),

    #[error("read failed: {0}")]
    ReadFailed(rusb::Error),

    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid thresholds: {0}")]
    InvalidThresholds(&'static str),

    #[error("fixture {}: {message}", path.display())]
    Fixture { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
