use crate::constants::*;
use crate::error::{Communication, DeviceAccess, Internal};
use crate::protocol::Frame;
use crate::{Error, Transport};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::Device as RusbDevice;
use rusb::DeviceHandle as RusbDeviceHandle;
use rusb::{Context, TransferType, UsbContext};
use std::thread::sleep;
use std::time::Duration;

/// UsbTransport represents the physical RCDAT attached via USB.
///
/// It is unlikely to be necessary to use this struct directly, as
/// [`crate::Attenuator`] provides the RCDAT command set on top of it.
///
/// Instead of using [`UsbTransport::open`] it is recommended to use
/// [`crate::AttenuatorBuilder::build`], which creates both the Attenuator and
/// the UsbTransport.
///
/// The claimed interface is released when [`Transport::close`] is called, or
/// when the UsbTransport is dropped.
#[derive(Debug)]
pub struct UsbTransport {
    handle: RusbDeviceHandle<Context>,
    config: UsbTransportConfig,
    usb_info: UsbInfo,
    out_type: TransferType,
    in_type: TransferType,
    claimed: bool,
}

#[derive(Debug)]
pub struct UsbTransportConfig {
    /// The [`rusb::Context`] to use for this device.  May be None to use
    /// a newly created context.
    pub context: Option<Context>,

    /// USB vendor ID to match
    pub vendor_id: u16,

    /// USB product ID to match
    pub product_id: u16,

    /// Interface to claim
    pub interface: u8,

    /// Maximum time to wait for each reply
    pub read_timeout: Duration,

    /// Maximum time to wait for each command to be accepted
    pub write_timeout: Duration,
}

impl Default for UsbTransportConfig {
    fn default() -> Self {
        UsbTransportConfig {
            context: None,
            vendor_id: RCDAT_VID,
            product_id: RCDAT_PID,
            interface: RCDAT_INTERFACE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl UsbTransportConfig {
    /// Check both transfer timeouts are between
    /// [`MIN_TRANSFER_TIMEOUT`] and [`MAX_TRANSFER_TIMEOUT`], so every
    /// transfer is bounded
    pub fn check_timeouts(&self) -> Result<(), Error> {
        for dur in [self.read_timeout, self.write_timeout] {
            if !(MIN_TRANSFER_TIMEOUT..=MAX_TRANSFER_TIMEOUT).contains(&dur) {
                return Err(Error::InvalidTimeout {
                    dur,
                    min: MIN_TRANSFER_TIMEOUT,
                    max: MAX_TRANSFER_TIMEOUT,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UsbInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub device_address: u8,
}

/// Public UsbTransport functions
impl UsbTransport {
    /// Finds and opens the RCDAT, ready to exchange commands.
    ///
    /// This function
    /// * finds the first device matching the configured vendor and product ID
    /// * detaches any kernel drivers bound to the device's interfaces
    /// * activates the device's first configuration
    /// * hard resets the device, in case a previous session left it in a
    ///   bad state
    /// * claims the configured interface
    ///
    /// # Arguments
    /// * `config` - Configuration for the device, or None for default
    ///
    /// # Returns
    /// * `Ok(UsbTransport)` - Successfully opened device
    /// * `Err(Error::InvalidTimeout)` - If a configured timeout is zero or
    ///   too long.  The bus isn't touched
    /// * `Err(Error)` - If no device was found, or it couldn't be set up
    pub fn open(config: Option<UsbTransportConfig>) -> Result<Self, Error> {
        trace!("UsbTransport::open");

        let mut config = config.unwrap_or_default();
        trace!(
            "UsbTransportConfig {:04x}:{:04x} interface {}",
            config.vendor_id,
            config.product_id,
            config.interface
        );
        config.check_timeouts()?;

        // Create the rusb:Context if we weren't provided one
        let context = match config.context.take() {
            Some(ctx) => ctx,
            None => Context::new()?,
        };
        config.context = Some(context.clone());

        let device = Self::find_device(&context, config.vendor_id, config.product_id)?;
        let mut handle = device
            .open()
            .map_err(|e| Self::access_error(e, &config))?;

        Self::detach_kernel_drivers(&device, &mut handle);
        Self::activate_configuration(&device, &mut handle, &config)?;
        Self::hard_reset(&mut handle)?;
        Self::claim_interface(&mut handle, &config)?;

        let out_type = Self::endpoint_transfer_type(&device, OUT_ENDPOINT);
        let in_type = Self::endpoint_transfer_type(&device, IN_ENDPOINT);
        debug!("Using {out_type:?} out endpoint, {in_type:?} in endpoint");

        let usb_info = UsbInfo {
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            bus_number: device.bus_number(),
            device_address: device.address(),
        };
        info!(
            "Opened RCDAT {:04x}:{:04x} at {:03}-{:03}",
            usb_info.vendor_id, usb_info.product_id, usb_info.bus_number, usb_info.device_address
        );

        Ok(Self {
            handle,
            config,
            usb_info,
            out_type,
            in_type,
            claimed: true,
        })
    }

    /// Retrieve this UsbTransport's configuration, including the
    /// [`rusb::Context`] in use
    pub fn current_config(&self) -> &UsbTransportConfig {
        &self.config
    }

    /// Retrieve the USB location of the opened device
    pub fn usb_info(&self) -> &UsbInfo {
        &self.usb_info
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, command: &[u8]) -> Result<(), Error> {
        trace!("UsbTransport::send {:?}", String::from_utf8_lossy(command));

        if command.len() > FRAME_SIZE {
            return Err(Communication::CommandTooLong {
                len: command.len(),
                max: FRAME_SIZE,
            }
            .into());
        }

        let timeout = self.config.write_timeout;
        let written = match self.out_type {
            TransferType::Interrupt => self.handle.write_interrupt(OUT_ENDPOINT, command, timeout),
            _ => self.handle.write_bulk(OUT_ENDPOINT, command, timeout),
        }
        .map_err(|e| Self::transfer_error(e, timeout))?;

        if written < command.len() {
            warn!("Device accepted {written} of {} command bytes", command.len());
            return Err(Communication::ShortWrite {
                expected: command.len(),
                actual: written,
            }
            .into());
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Frame, Error> {
        trace!("UsbTransport::receive");

        let timeout = self.config.read_timeout;
        let mut frame = [0u8; FRAME_SIZE];
        let read = match self.in_type {
            TransferType::Interrupt => self.handle.read_interrupt(IN_ENDPOINT, &mut frame, timeout),
            _ => self.handle.read_bulk(IN_ENDPOINT, &mut frame, timeout),
        }
        .map_err(|e| Self::transfer_error(e, timeout))?;

        if read < FRAME_SIZE {
            warn!("Device returned {read} of {FRAME_SIZE} reply bytes");
            return Err(Communication::ShortRead {
                expected: FRAME_SIZE,
                actual: read,
            }
            .into());
        }
        trace!("Read frame {:02x?}", &frame[..]);
        Ok(frame)
    }

    fn close(&mut self) -> Result<(), Error> {
        trace!("UsbTransport::close");
        if !self.claimed {
            debug!("Interface already released");
            return Ok(());
        }
        self.claimed = false;
        self.handle.release_interface(self.config.interface)?;
        debug!("Released interface {}", self.config.interface);
        Ok(())
    }
}

/// Private UsbTransport functions
impl UsbTransport {
    /// Enumerate the bus and find the appropriate device
    fn find_device(
        context: &Context,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<RusbDevice<Context>, Error> {
        trace!("UsbTransport::find_device {vendor_id:04x}:{product_id:04x}");

        let devices = context.devices()?;
        let candidates = devices
            .iter()
            .filter_map(|device| match device.device_descriptor() {
                Ok(desc) => Some((desc.vendor_id(), desc.product_id(), device)),
                Err(e) => {
                    debug!("Skipping USB device with unreadable descriptor: {e}");
                    None
                }
            });
        select_device(candidates, vendor_id, product_id)
    }

    // Best effort - the device may well be usable even if this fails, so
    // failures are logged and otherwise ignored
    fn detach_kernel_drivers(device: &RusbDevice<Context>, handle: &mut RusbDeviceHandle<Context>) {
        trace!("UsbTransport::detach_kernel_drivers");

        let num_configs = match device.device_descriptor() {
            Ok(desc) => desc.num_configurations(),
            Err(e) => {
                debug!("Couldn't read device descriptor, not detaching kernel drivers: {e}");
                return;
            }
        };

        for index in 0..num_configs {
            let config = match device.config_descriptor(index) {
                Ok(config) => config,
                Err(e) => {
                    debug!("Couldn't read configuration descriptor {index}: {e}");
                    continue;
                }
            };
            for interface in config.interfaces() {
                let number = interface.number();
                match Self::detach_kernel_driver(handle, number) {
                    Ok(true) => debug!("Detached kernel driver from interface {number}"),
                    Ok(false) => trace!("No kernel driver bound to interface {number}"),
                    Err(ignored @ Internal::KernelDriverDetach { .. }) => {
                        debug!("Ignoring: {ignored}")
                    }
                }
            }
        }
    }

    /// Returns whether a kernel driver was detached
    fn detach_kernel_driver(
        handle: &mut RusbDeviceHandle<Context>,
        interface: u8,
    ) -> Result<bool, Internal> {
        match handle.kernel_driver_active(interface) {
            Ok(false) => return Ok(false),
            Ok(true) => (),
            // No kernel driver support on this platform, so nothing to detach
            Err(rusb::Error::NotSupported) => return Ok(false),
            Err(error) => return Err(Internal::KernelDriverDetach { interface, error }),
        }
        handle
            .detach_kernel_driver(interface)
            .map(|_| true)
            .map_err(|error| Internal::KernelDriverDetach { interface, error })
    }

    fn activate_configuration(
        device: &RusbDevice<Context>,
        handle: &mut RusbDeviceHandle<Context>,
        config: &UsbTransportConfig,
    ) -> Result<(), Error> {
        trace!("UsbTransport::activate_configuration");
        let number = device.config_descriptor(0)?.number();
        debug!("Set active configuration to {number}");
        handle
            .set_active_configuration(number)
            .map_err(|e| Self::access_error(e, config))
    }

    fn hard_reset(handle: &mut RusbDeviceHandle<Context>) -> Result<(), Error> {
        trace!("UsbTransport::hard_reset");
        debug!("Hard reset the device");
        handle.reset()?;
        sleep(DEFAULT_USB_RESET_SLEEP);
        trace!("Reset should be complete, continue");
        Ok(())
    }

    fn claim_interface(
        handle: &mut RusbDeviceHandle<Context>,
        config: &UsbTransportConfig,
    ) -> Result<(), Error> {
        trace!("UsbTransport::claim_interface {}", config.interface);

        // The reset may have let a kernel driver rebind
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {e}");
        }

        debug!("Claim interface {}", config.interface);
        handle
            .claim_interface(config.interface)
            .map_err(|e| Self::access_error(e, config))
    }

    /// Look up how the device expects an endpoint to be driven.  RCDAT
    /// firmware variants differ, so fall back to bulk if the descriptor
    /// isn't readable.
    fn endpoint_transfer_type(device: &RusbDevice<Context>, address: u8) -> TransferType {
        let config = match device.active_config_descriptor() {
            Ok(config) => config,
            Err(e) => {
                debug!("Couldn't read active configuration descriptor: {e}");
                return TransferType::Bulk;
            }
        };
        for interface in config.interfaces() {
            for descriptor in interface.descriptors() {
                for endpoint in descriptor.endpoint_descriptors() {
                    if endpoint.address() == address {
                        return endpoint.transfer_type();
                    }
                }
            }
        }
        debug!("Endpoint 0x{address:02x} not described, assuming bulk");
        TransferType::Bulk
    }

    fn access_error(error: rusb::Error, config: &UsbTransportConfig) -> Error {
        match error {
            rusb::Error::Access => DeviceAccess::Permission.into(),
            rusb::Error::Busy => DeviceAccess::Busy {
                vid: config.vendor_id,
                pid: config.product_id,
            }
            .into(),
            other => other.into(),
        }
    }

    fn transfer_error(error: rusb::Error, timeout: Duration) -> Error {
        match error {
            rusb::Error::Timeout => Error::Timeout { dur: timeout },
            other => {
                debug!("USB transfer failed {other}");
                other.into()
            }
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        trace!("UsbTransport::drop");
        // Ignoring errors since we're in drop
        let _ = self.close();
        trace!("Exited drop");
    }
}

/// Pick the device to use from `(vendor_id, product_id, device)` candidates.
///
/// Exactly one match is expected.  If there are several, the first is used.
pub(crate) fn select_device<D>(
    candidates: impl IntoIterator<Item = (u16, u16, D)>,
    vendor_id: u16,
    product_id: u16,
) -> Result<D, Error> {
    let mut matches = candidates
        .into_iter()
        .inspect(|(vid, pid, _)| trace!("Found USB device {vid:04x}:{pid:04x}"))
        .filter(|(vid, pid, _)| *vid == vendor_id && *pid == product_id)
        .map(|(_, _, device)| device);

    let Some(device) = matches.next() else {
        info!("No RCDAT device {vendor_id:04x}:{product_id:04x} found");
        return Err(DeviceAccess::NotFound {
            vid: vendor_id,
            pid: product_id,
        }
        .into());
    };

    let others = matches.count();
    if others > 0 {
        warn!(
            "Found {} RCDAT devices {vendor_id:04x}:{product_id:04x}, using the first",
            others + 1
        );
    } else {
        debug!("Found RCDAT device");
    }
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_accepted() {
        assert_eq!(UsbTransportConfig::default().check_timeouts(), Ok(()));
        let config = UsbTransportConfig {
            read_timeout: MIN_TRANSFER_TIMEOUT,
            write_timeout: MAX_TRANSFER_TIMEOUT,
            ..Default::default()
        };
        assert_eq!(config.check_timeouts(), Ok(()));
    }

    #[test]
    fn test_unbounded_timeouts_rejected() {
        let bad = [
            Duration::ZERO,
            Duration::from_micros(999),
            MAX_TRANSFER_TIMEOUT + Duration::from_millis(1),
            Duration::from_millis(1 << 32),
        ];
        for dur in bad {
            for config in [
                UsbTransportConfig {
                    read_timeout: dur,
                    ..Default::default()
                },
                UsbTransportConfig {
                    write_timeout: dur,
                    ..Default::default()
                },
            ] {
                assert_eq!(
                    config.check_timeouts(),
                    Err(Error::InvalidTimeout {
                        dur,
                        min: MIN_TRANSFER_TIMEOUT,
                        max: MAX_TRANSFER_TIMEOUT,
                    })
                );
            }
        }
    }

    #[test]
    fn test_open_rejects_zero_timeout() {
        let config = UsbTransportConfig {
            read_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            UsbTransport::open(Some(config)),
            Err(Error::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_select_no_candidates() {
        let result = select_device(Vec::<(u16, u16, u8)>::new(), RCDAT_VID, RCDAT_PID);
        assert_eq!(
            result,
            Err(Error::DeviceAccess {
                kind: DeviceAccess::NotFound {
                    vid: RCDAT_VID,
                    pid: RCDAT_PID
                }
            })
        );
    }

    #[test]
    fn test_select_needs_both_ids() {
        let candidates = vec![
            (RCDAT_VID, 0x0022, "wrong pid"),
            (0x16d0, RCDAT_PID, "wrong vid"),
        ];
        assert!(matches!(
            select_device(candidates, RCDAT_VID, RCDAT_PID),
            Err(Error::DeviceAccess {
                kind: DeviceAccess::NotFound { .. }
            })
        ));
    }

    #[test]
    fn test_select_first_of_several() {
        let candidates = vec![
            (0x1d6b, 0x0002, "hub"),
            (RCDAT_VID, RCDAT_PID, "first"),
            (RCDAT_VID, RCDAT_PID, "second"),
        ];
        assert_eq!(select_device(candidates, RCDAT_VID, RCDAT_PID), Ok("first"));
    }

    #[test]
    fn test_select_overridden_ids() {
        let candidates = vec![(RCDAT_VID, RCDAT_PID, 1), (0x1234, 0x5678, 2)];
        assert_eq!(select_device(candidates, 0x1234, 0x5678), Ok(2));
    }

    #[test]
    fn test_device_not_found() {
        // Vendor ID reserved by the USB-IF, so never present
        let config = UsbTransportConfig {
            vendor_id: 0xffff,
            product_id: 0xfffe,
            ..Default::default()
        };
        let result = UsbTransport::open(Some(config));
        println!("{result:?}");
        assert!(matches!(
            result,
            // Normal case
            Err(Error::DeviceAccess {
                kind: DeviceAccess::NotFound {
                    vid: 0xffff,
                    pid: 0xfffe
                }
            }) |
            // No USB support at all on the test machine
            Err(Error::Usb(_))
        ));
    }
}
