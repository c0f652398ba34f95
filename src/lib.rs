//! # rcdat
//!
//! This crate provides a Rust interface for configuring Mini-Circuits RCDAT
//! programmable RF attenuators over USB.
//!
//! ## Overview
//!
//! The rcdat crate is structured around two main components:
//!
//! - A high-level [`Attenuator`] interface providing the RCDAT command set
//! - A lower-level [`Transport`] interface for the raw USB command/reply
//!   exchange, implemented by [`UsbTransport`]
//!
//! ## Architecture
//!
//! ### Attenuator Layer
//!
//! The [`Attenuator`] struct is the primary interface most users should
//! interact with.  It provides:
//!
//! - Identity queries (serial number, model number, firmware version)
//! - Setting the attenuation, with range checking before anything is sent
//! - Reading the attenuation back
//! - [`Attenuator::run`], the complete identify, set and verify sequence
//!
//! It tracks the session's [`SessionState`] and guarantees the transport is
//! closed exactly once, however the session ends.
//!
//! ### Transport Layer
//!
//! [`UsbTransport`] finds the device by vendor and product ID, detaches any
//! kernel driver, activates the first configuration, resets the device and
//! claims its interface.  Each command is a single write to the out
//! endpoint, and each reply a single 64 byte read from the in endpoint, both
//! bounded by a timeout.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use rcdat::{AttenuatorBuilder, Error};
//!
//! fn main() -> Result<(), Error> {
//!     let mut attenuator = AttenuatorBuilder::new().build()?;
//!
//!     println!("Model: {}", attenuator.model_number()?);
//!
//!     attenuator.set_attenuation(12.5)?;
//!     println!("Attenuation: {}", attenuator.get_attenuation()?);
//!
//!     // No need to close the device, it will be released when attenuator
//!     // goes out of scope
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! The library uses the `log` crate for diagnostic output:
//!
//! - Warn: Unacknowledged commands, multiple matching devices, short transfers
//! - Info: Device opened, identity, attenuation changes
//! - Debug: USB set-up steps and each command's reply
//! - Trace: Function entry and protocol-level details
//!
//! The `rcdat` binary initialises `env_logger`, so set the `RUST_LOG`
//! environment variable to see this output.
//!
//! ## Technical Details
//!
//! - Vendor ID: 0x20CE
//! - Product ID: 0x0023
//! - Out endpoint: 0x01, in endpoint: 0x81
//! - Replies: 64 bytes, header byte then text terminated by 0x00 or 0xFF

pub mod attenuation;
pub mod attenuator;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod transport;

/// Use to create an Attenuator via a USB-connected RCDAT
pub type UsbAttenuator = Attenuator<UsbTransport>;
pub use crate::attenuation::Attenuation;
pub use crate::attenuator::{
    Attenuator, AttenuatorBuilder, AttenuatorInfo, RunReport, SessionState,
};
pub use crate::error::{Communication, DeviceAccess, Error};
pub use crate::protocol::{decode_ascii_reply, Command, Frame};
pub use crate::transport::{Transport, UsbInfo, UsbTransport, UsbTransportConfig};
