use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, UsbContext};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::Transport;

pub const VENDOR_ID: u16 = 0x1c7a;
pub const PRODUCT_ID: u16 = 0x0576;

/// Where to find the sensor and how to talk to it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    /// Bulk OUT, command frames.
    pub endpoint_out: u8,
    /// Bulk IN, responses.
    pub endpoint_in: u8,
    pub interrupt_endpoints: Vec<u8>,
    pub detach_kernel_driver: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            interface: 0,
            endpoint_out: 0x01,
            endpoint_in: 0x82,
            interrupt_endpoints: vec![0x83, 0x84],
            detach_kernel_driver: true,
        }
    }
}

pub fn find_device(context: &Context, vendor_id: u16, product_id: u16) -> Result<Device<Context>> {
    for device in context.devices()?.iter() {
        if let Ok(device_descriptor) = device.device_descriptor() {
            if device_descriptor.vendor_id() == vendor_id && device_descriptor.product_id() == product_id {
                return Ok(device);
            }
        }
    }

    Err(Error::DeviceNotFound { vendor_id, product_id })
}

/// A claimed sensor interface.
///
/// Dropping the session releases the interface and hands it back to the
/// kernel driver if one was detached on open.
///
pub struct UsbSession {
    handle: DeviceHandle<Context>,
    config: SessionConfig,
    reattach: bool,
    claimed: bool,
}

impl UsbSession {
    pub fn open(context: &mut Context, config: &SessionConfig) -> Result<Self> {
        let interface = config.interface;
        let permission = |source: rusb::Error| match source {
            rusb::Error::Access | rusb::Error::Busy => Error::PermissionDenied { interface, source },
            e => Error::Usb(e),
        };

        let device = find_device(context, config.vendor_id, config.product_id)?;
        let handle = device.open().map_err(permission)?;

        let mut reattach = false;
        if config.detach_kernel_driver {
            match handle.kernel_driver_active(interface) {
                Ok(true) => {
                    handle.detach_kernel_driver(interface).map_err(permission)?;
                    debug!(interface, "kernel driver detached");
                    reattach = true;
                },
                Ok(false) | Err(rusb::Error::NotSupported) => {},
                Err(e) => return Err(permission(e)),
            }
        }

        if let Err(e) = handle.claim_interface(interface) {
            if reattach {
                let _ = handle.attach_kernel_driver(interface);
            }
            return Err(Error::PermissionDenied { interface, source: e });
        }

        info!(
            bus = device.bus_number(),
            address = device.address(),
            interface,
            "session open {:04x}:{:04x}", config.vendor_id, config.product_id,
        );

        Ok(Self {
            handle,
            config: config.clone(),
            reattach,
            claimed: true,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Passive reader for one IN endpoint, bulk or interrupt per the config.
    pub fn listener(&mut self, endpoint: u8) -> Listener<'_> {
        let interrupt = self.config.interrupt_endpoints.contains(&endpoint);
        Listener {
            session: self,
            endpoint,
            interrupt,
        }
    }

    pub fn release(mut self) -> Result<()> {
        self.release_interface().map_err(Error::from)
    }

    fn release_interface(&mut self) -> rusb::Result<()> {
        let interface = self.config.interface;

        if self.claimed {
            self.claimed = false;
            self.handle.release_interface(interface)?;
        }

        if self.reattach {
            self.reattach = false;
            self.handle.attach_kernel_driver(interface)?;
        }

        debug!(interface, "session released");
        Ok(())
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        if let Err(e) = self.release_interface() {
            warn!("release: {e}");
        }
    }
}

impl Transport for UsbSession {
    fn write(&mut self, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.write_bulk(self.config.endpoint_out, data, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.read_bulk(self.config.endpoint_in, buf, timeout)
    }
}

pub struct Listener<'a> {
    session: &'a mut UsbSession,
    endpoint: u8,
    interrupt: bool,
}

impl Transport for Listener<'_> {
    fn write(&mut self, _data: &[u8], _timeout: Duration) -> rusb::Result<usize> {
        Err(rusb::Error::NotSupported)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        let handle = &self.session.handle;
        if self.interrupt {
            handle.read_interrupt(self.endpoint, buf, timeout)
        } else {
            handle.read_bulk(self.endpoint, buf, timeout)
        }
    }
}
