//! Error objects for the rcdat crate
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the rcdat crate
#[derive(Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Errors accessing the USB device
    /// Note that permission and busy problems are explicitly handled in
    /// DeviceAccess
    #[error("USB error while attempting to communicate with the RCDAT: {0}")]
    Usb(SerializableUsbError),

    /// Failure in exchanging a command and reply with the RCDAT
    #[error("RCDAT device communication error: {kind}")]
    Communication { kind: Communication },

    /// A USB transfer timed out
    #[error("RCDAT transfer timed out after {dur:?}")]
    Timeout { dur: std::time::Duration },

    /// DeviceAccess holds a variety of errors relating to accessing the RCDAT
    #[error("{kind}")]
    DeviceAccess { kind: DeviceAccess },

    /// The requested attenuation is outside the supported range, or isn't a
    /// decimal number
    #[error("Invalid attenuation: {message}")]
    InvalidAttenuation { message: String },

    /// A transfer timeout that libusb can't honour.  Zero (or anything under
    /// a millisecond) would mean waiting forever
    #[error("Invalid transfer timeout {dur:?}: must be between {min:?} and {max:?}")]
    InvalidTimeout {
        dur: std::time::Duration,
        min: std::time::Duration,
        max: std::time::Duration,
    },

    /// The device didn't acknowledge a `SETATT` command
    #[error("Error setting attenuation: device replied {reply:?}")]
    SetAttenuationFailed { reply: String },

    /// Failed to write the run output
    #[error("Failed to write output: {message}")]
    Output { message: String },
}

/// Used to differentiate between different types of problems accessing the
/// RCDAT device
#[derive(Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum DeviceAccess {
    #[error("The library is not connected to an RCDAT")]
    NoDevice,

    #[error("RCDAT device {vid:04x}/{pid:04x} not found - is it connected and do you have permissions to access it?")]
    NotFound { vid: u16, pid: u16 },

    #[error("RCDAT device {vid:04x}/{pid:04x} is busy - is another program using it?")]
    Busy { vid: u16, pid: u16 },

    #[error("Hit USB permissions error while attempting to access RCDAT device.  Are you sure you have suitable permissions?  You may need to reconfigure udev rules in /etc/udev/rules.d/.")]
    Permission,
}

#[derive(Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Communication {
    /// The device returned fewer bytes than a full reply frame
    #[error("Device returned a short reply: {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },

    /// The device accepted fewer bytes than the command contained
    #[error("Device accepted a partial command: {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    /// The command doesn't fit in a single transfer
    #[error("Command of {len} bytes exceeds maximum of {max}")]
    CommandTooLong { len: usize, max: usize },
}

#[derive(Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum SerializableUsbError {
    #[error("{message}")]
    UsbError { message: String },
}

impl Error {
    /// Whether this error should abort the rest of a command sequence.
    ///
    /// An unacknowledged set is recorded but the sequence carries on to read
    /// back the attenuation.  Everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SetAttenuationFailed { .. })
    }
}

/// Used for errors which must remain internal to the rcdat crate
/// This is not "pub use"d by lib.rs
#[derive(Debug, Error)]
pub(crate) enum Internal {
    /// A kernel driver was bound to an interface we want, and couldn't be
    /// detached.  The device may still be usable so this is never surfaced
    #[error("Failed to detach kernel driver from interface {interface}: {error}")]
    KernelDriverDetach { interface: u8, error: rusb::Error },
}

// Map rusb::Error to Error
impl From<rusb::Error> for Error {
    fn from(err: rusb::Error) -> Self {
        Self::Usb(SerializableUsbError::UsbError {
            message: err.to_string(),
        })
    }
}

// Map Communication to Error
impl From<Communication> for Error {
    fn from(kind: Communication) -> Self {
        Self::Communication { kind }
    }
}

// Map io::Error, from writing run output, to Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Output {
            message: err.to_string(),
        }
    }
}

// Map DeviceAccess to Error
impl From<DeviceAccess> for Error {
    fn from(kind: DeviceAccess) -> Self {
        Self::DeviceAccess { kind }
    }
}
