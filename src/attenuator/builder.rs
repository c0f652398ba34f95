use crate::{Attenuator, Error, UsbTransport, UsbTransportConfig};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::Context;
use std::time::Duration;

/// A builder pattern for creating USB attached [`Attenuator`] instances
/// with custom configuration.
///
/// Allows setting optional parameters like the vendor and product IDs to
/// match, the transfer timeout and the USB context before opening the
/// device.
///
/// # Examples
///
/// ## A simple example
///
/// ```no_run
/// use rcdat::AttenuatorBuilder;
///
/// // Opens the first RCDAT found, using the default IDs
/// let attenuator = AttenuatorBuilder::new()
///     .build()
///     .unwrap();
/// ```
///
/// ## A more complex example
///
/// ```no_run
/// use rcdat::AttenuatorBuilder;
/// use std::time::Duration;
///
/// let attenuator = AttenuatorBuilder::new()
///     .vendor_id(0x20ce)
///     .product_id(0x0023)
///     .timeout(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct AttenuatorBuilder {
    usb_context: Option<Context>,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    timeout: Option<Duration>,
}

impl AttenuatorBuilder {
    /// Creates a new [`AttenuatorBuilder`] instance with default values.
    ///
    /// All fields are initialized to None and can be set using the builder
    /// methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the device and returns a new [`Attenuator`] using the configured
    /// parameters.  Uses default values for any parameters that weren't set.
    ///
    /// # Returns
    /// * `Ok(Attenuator)` - the opened Attenuator
    /// * `Err(Error)` - if no device was found, or it couldn't be set up
    pub fn build(&mut self) -> Result<Attenuator<UsbTransport>, Error> {
        trace!("AttenuatorBuilder::build");
        let config = self.usb_config();
        let transport = UsbTransport::open(Some(config))?;
        Ok(Attenuator::new(transport))
    }

    /// Sets the USB vendor ID to match.
    ///
    /// If not set, defaults to [`crate::constants::RCDAT_VID`]
    pub fn vendor_id(&mut self, vid: u16) -> &mut Self {
        self.vendor_id = Some(vid);
        self
    }

    /// Sets the USB product ID to match.
    ///
    /// If not set, defaults to [`crate::constants::RCDAT_PID`]
    pub fn product_id(&mut self, pid: u16) -> &mut Self {
        self.product_id = Some(pid);
        self
    }

    /// Sets the maximum time to wait for each USB read and write.
    ///
    /// If not set, defaults to [`crate::constants::DEFAULT_READ_TIMEOUT`] and
    /// [`crate::constants::DEFAULT_WRITE_TIMEOUT`].  [`Self::build`] fails
    /// with [`Error::InvalidTimeout`] if it is under a millisecond.
    pub fn timeout(&mut self, duration: Duration) -> &mut Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets a custom USB context for device communication.
    ///
    /// This allows setting the USB debug log level via
    /// context.set_log_level() using rusb::LogLevel.
    ///
    /// ```rust,no_run
    /// use rusb::{Context, UsbContext};
    /// use rcdat::AttenuatorBuilder;
    ///
    /// let mut context = Context::new().unwrap();
    /// context.set_log_level(rusb::LogLevel::Debug);
    ///
    /// let attenuator = AttenuatorBuilder::new()
    ///     .context(context)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn context(&mut self, context: Context) -> &mut Self {
        self.usb_context = Some(context);
        self
    }

    fn usb_config(&mut self) -> UsbTransportConfig {
        let default = UsbTransportConfig::default();
        UsbTransportConfig {
            context: self.usb_context.take(),
            vendor_id: self.vendor_id.unwrap_or(default.vendor_id),
            product_id: self.product_id.unwrap_or(default.product_id),
            interface: default.interface,
            read_timeout: self.timeout.unwrap_or(default.read_timeout),
            write_timeout: self.timeout.unwrap_or(default.write_timeout),
        }
    }
}
