//! Constants used in the RCDAT implementation
use rusb::constants::{LIBUSB_ENDPOINT_IN, LIBUSB_ENDPOINT_OUT};
use std::time::Duration;

/// RCDAT device info

/// Mini-Circuits USB vendor ID
pub const RCDAT_VID: u16 = 0x20ce;
/// RCDAT family USB product ID
pub const RCDAT_PID: u16 = 0x0023;
/// Interface claimed for the command/response exchange
pub const RCDAT_INTERFACE: u8 = 0;

/// Attenuation limits

/// Minimum attenuation accepted, in dB
pub const MIN_ATTENUATION_DB: f64 = 0.0;
/// Maximum attenuation accepted, in dB.  The device itself enforces its
/// 0.25 dB step size
pub const MAX_ATTENUATION_DB: f64 = 90.0;
/// Longest attenuation text that still fits a `SETATT` command in one frame
pub const MAX_ATTENUATION_TEXT_LEN: usize = FRAME_SIZE - "*:SETATT=;".len();

/// Timeouts

/// Used to wait for the USB device to respond to a read message
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Used to wait for the USB device to accept a write message
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Shortest transfer timeout accepted.  libusb treats 0 as no timeout, and
/// rusb truncates to whole milliseconds
pub const MIN_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1);
/// Longest transfer timeout accepted, the most milliseconds libusb can take
pub const MAX_TRANSFER_TIMEOUT: Duration = Duration::from_millis(u32::MAX as u64);
/// Used to wait for the USB device to come back after a reset.  The USB
/// spec requires a minimum of 100ms
pub const DEFAULT_USB_RESET_SLEEP: Duration = Duration::from_millis(100);

/// The USB device's in endpoint is used to read replies
pub const IN_ENDPOINT: u8 = 1 | LIBUSB_ENDPOINT_IN;
/// The USB device's out endpoint is used to write commands
pub const OUT_ENDPOINT: u8 = 1 | LIBUSB_ENDPOINT_OUT;

/// Size of every reply frame read from the device
pub const FRAME_SIZE: usize = 64;
/// Offset of the first payload byte in a reply frame.  Byte 0 is a header
pub const FRAME_PAYLOAD_OFFSET: usize = 1;
/// Payload terminator
pub const FRAME_TERMINATOR_NUL: u8 = 0x00;
/// Alternative payload terminator, treated the same as
/// [`FRAME_TERMINATOR_NUL`]
pub const FRAME_TERMINATOR_FF: u8 = 0xff;

/// Protocol

/// Prefix of every command sent to the device
pub const COMMAND_PREFIX: &str = "*:";
/// Reply sent by the device to acknowledge `SETATT`
pub const SET_ATTENUATION_ACK: &str = "1";
