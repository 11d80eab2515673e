use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::frame::{hex_preview, CommandFrame, RESPONSE_MAGIC};
use crate::transport::Transport;

/// Bytes read back from the device for one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    data: Vec<u8>,
    requested: usize,
}

impl Response {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum length that was asked for.
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn is_partial(&self) -> bool {
        self.data.len() < self.requested
    }

    pub fn has_response_magic(&self) -> bool {
        self.data.starts_with(&RESPONSE_MAGIC)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Received(Response),
    /// Nothing arrived before the timeout. Routine for many commands.
    TimedOut,
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Received(r) => Some(r),
            Outcome::TimedOut    => None,
        }
    }
}

/// One request/response exchange: send `frame`, then read up to
/// `max_response_length` bytes within `timeout`.
///
/// No retries. A failed send returns `SendFailed` without reading; a
/// transport timeout is `Ok(Outcome::TimedOut)`; any other read fault is
/// `ReadFailed`.
///
pub fn probe<T: Transport + ?Sized>(
    session: &mut T,
    frame: &CommandFrame,
    max_response_length: usize,
    timeout: Duration,
) -> Result<Outcome> {
    check_arguments(max_response_length, timeout)?;

    debug!(frame = %frame, "send");
    let written = session.write(frame.as_bytes(), timeout).map_err(Error::SendFailed)?;
    if written != frame.len() {
        debug!(written, expected = frame.len(), "short write");
        return Err(Error::SendFailed(rusb::Error::Io));
    }

    read_response(session, max_response_length, timeout)
}

/// The read half of [`probe`], for listening without sending first.
pub fn receive<T: Transport + ?Sized>(
    session: &mut T,
    max_response_length: usize,
    timeout: Duration,
) -> Result<Outcome> {
    check_arguments(max_response_length, timeout)?;
    read_response(session, max_response_length, timeout)
}

fn check_arguments(max_response_length: usize, timeout: Duration) -> Result<()> {
    if max_response_length == 0 {
        return Err(Error::InvalidArgument("max_response_length must be > 0"));
    }
    if timeout.is_zero() {
        return Err(Error::InvalidArgument("timeout must be > 0"));
    }
    Ok(())
}

fn read_response<T: Transport + ?Sized>(
    session: &mut T,
    max_response_length: usize,
    timeout: Duration,
) -> Result<Outcome> {
    let mut buf = vec![0u8; max_response_length];

    match session.read(&mut buf, timeout) {
        Ok(n) => {
            buf.truncate(n);
            debug!(len = n, requested = max_response_length, "received");
            trace!(data = %hex_preview(&buf, 20));
            Ok(Outcome::Received(Response { data: buf, requested: max_response_length }))
        },
        Err(rusb::Error::Timeout) => {
            debug!(?timeout, "timed out");
            Ok(Outcome::TimedOut)
        },
        Err(e) => Err(Error::ReadFailed(e)),
    }
}
