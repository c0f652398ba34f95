//! The [`Transport`] module provides the raw command/reply exchange with the
//! RCDAT.  Prefer [`crate::Attenuator`] for most use cases.
//!
//! It is unlikely you need to use this interface directly unless you are
//! re-implementing [`crate::Attenuator`] or adding to it.

#[cfg(test)]
pub(crate) mod mock;
pub mod usb;

pub use usb::{UsbInfo, UsbTransport, UsbTransportConfig};

use crate::protocol::Frame;
use crate::Error;

/// The core Transport trait, which allows the USB device to be mocked out
/// for testing
pub trait Transport: std::fmt::Debug {
    /// Writes a single command to the device
    ///
    /// # Arguments
    /// * `command` - The encoded command bytes
    ///
    /// # Returns
    /// * `Ok(())` - If the whole command was accepted by the device
    /// * `Err(Error)` - On failure, including a timeout or short write
    fn send(&mut self, command: &[u8]) -> Result<(), Error>;

    /// Reads a single reply frame from the device
    ///
    /// # Returns
    /// * `Ok(Frame)` - A complete reply frame
    /// * `Err(Error)` - On failure, including a timeout or short read
    fn receive(&mut self) -> Result<Frame, Error>;

    /// Releases the device.  The transport must not be used afterwards.
    ///
    /// [`crate::Attenuator`] calls this exactly once, either explicitly via
    /// [`crate::Attenuator::close`] or when it is dropped.
    fn close(&mut self) -> Result<(), Error>;
}
