use std::iter;
use std::time::Duration;

use chrono::Local;
use console::style;
use crossbeam::channel::{after, never, select, tick, Receiver};
use tracing::{debug, warn};

use egis_probe::artifact::ArtifactStore;
use egis_probe::frame::hex_preview;
use egis_probe::{receive, Error, Outcome, Result, Transport, UsbSession};

const INTERRUPT_LENGTH: usize = 64;
const BULK_LENGTH: usize = 512;
const LISTEN_TIMEOUT: Duration = Duration::from_millis(100);

pub struct PollOptions<'a> {
    pub interval: Duration,
    pub duration: Option<Duration>,
    pub status_interval: Duration,
    pub store: Option<&'a ArtifactStore>,
}

/// A device whose IN endpoints can be read one at a time.
pub trait Endpoints {
    /// Endpoint addresses with the read length for each, in polling order.
    fn endpoints(&self) -> Vec<(u8, usize)>;

    fn listener(&mut self, endpoint: u8) -> Box<dyn Transport + '_>;
}

impl Endpoints for UsbSession {
    fn endpoints(&self) -> Vec<(u8, usize)> {
        let config = self.config();
        config.interrupt_endpoints.iter()
            .map(|&endpoint| (endpoint, INTERRUPT_LENGTH))
            .chain(iter::once((config.endpoint_in, BULK_LENGTH)))
            .collect()
    }

    fn listener(&mut self, endpoint: u8) -> Box<dyn Transport + '_> {
        Box::new(UsbSession::listener(self, endpoint))
    }
}

#[derive(Debug, Default)]
pub struct PollStats {
    pub polls: usize,
    pub responses: usize,
    pub errors: usize,
}

/// Listen on every IN endpoint without sending anything, until `duration`
/// lapses or a line arrives on `stop`.
///
/// Losing the device ends the poll with an error; other read faults are
/// counted and polling continues.
///
pub fn poll<D>(device: &mut D, options: &PollOptions, stop: Receiver<String>) -> Result<PollStats>
where
    D: Endpoints + ?Sized,
{
    let endpoints = device.endpoints();

    let ticker = tick(options.interval);
    let status = tick(options.status_interval);
    let deadline = options.duration.map(after).unwrap_or_else(never);
    let mut stdin_open = true;

    let mut stats = PollStats::default();

    loop {
        let stop = if stdin_open { stop.clone() } else { never() };

        select! {
            recv(ticker) -> _ => {
                stats.polls += 1;
                for &(endpoint, length) in &endpoints {
                    listen(&mut *device.listener(endpoint), endpoint, length, options.store, &mut stats)?;
                }
            },
            recv(status) -> _ => {
                println!("{} {} polls, {} responses, {} errors",
                    style(Local::now().format("%H:%M:%S")).dim(), stats.polls, stats.responses, stats.errors);
            },
            recv(deadline) -> _ => break,
            recv(stop) -> line => match line {
                Ok(_) => break,
                Err(_) => {
                    debug!("stdin closed, polling until the deadline");
                    stdin_open = false;
                },
            },
        }
    }

    Ok(stats)
}

fn listen<T: Transport + ?Sized>(
    transport: &mut T,
    endpoint: u8,
    length: usize,
    store: Option<&ArtifactStore>,
    stats: &mut PollStats,
) -> Result<()> {
    match receive(transport, length, LISTEN_TIMEOUT) {
        Ok(Outcome::Received(response)) if !response.is_empty() => {
            stats.responses += 1;
            println!("{} EP 0x{:02x}: {}",
                Local::now().format("%H:%M:%S%.3f"),
                endpoint,
                hex_preview(response.data(), 32),
            );

            if let Some(store) = store {
                store.save(&format!("ep_0x{endpoint:02x}"), response.data())?;
            }
        },
        Ok(_) => {},
        Err(Error::ReadFailed(rusb::Error::NoDevice)) => {
            return Err(Error::ReadFailed(rusb::Error::NoDevice));
        },
        Err(e) => {
            stats.errors += 1;
            warn!(endpoint, "listen: {e}");
        },
    }

    Ok(())
}
