//! [`Attenuator`] is the main interface for configuring an RCDAT.  Its use
//! is preferred over direct use of a [`Transport`].
use crate::constants::SET_ATTENUATION_ACK;
use crate::protocol::{decode_ascii_reply, Command};
use crate::{Attenuation, DeviceAccess, Error, Transport};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

pub mod builder;

pub use builder::AttenuatorBuilder;

/// The stages an [`Attenuator`] session moves through.  They only move
/// forwards, apart from a transport failure during [`Attenuator::run`], which
/// goes straight to [`SessionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SessionState {
    /// The device is open and no commands have been exchanged
    #[default]
    Opened,
    /// At least one of serial number, model number or firmware version has
    /// been queried
    IdentityQueried,
    /// A `SETATT` command has been exchanged, whether acknowledged or not
    AttenuationSet,
    /// The attenuation has been read back from the device
    AttenuationVerified,
    /// The transport has been released.  No further commands can be sent
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Opened => write!(f, "Opened"),
            SessionState::IdentityQueried => write!(f, "Identity queried"),
            SessionState::AttenuationSet => write!(f, "Attenuation set"),
            SessionState::AttenuationVerified => write!(f, "Attenuation verified"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// AttenuatorInfo contains the identity strings read from the RCDAT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttenuatorInfo {
    /// Reply to `SN?`
    pub serial_number: String,
    /// Reply to `MN?`
    pub model_number: String,
    /// Reply to `FIRMWARE?`
    pub firmware: String,
}

impl fmt::Display for AttenuatorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Serial Number: {}", self.serial_number)?;
        writeln!(f, "  Model Number: {}", self.model_number)?;
        write!(f, "  Firmware version: {}", self.firmware)
    }
}

/// The outcome of [`Attenuator::run`].
///
/// `reported` is the device's reply to `ATT?`, passed through as-is.  It is
/// not compared with `requested`.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub info: AttenuatorInfo,
    pub requested: Attenuation,
    /// Set if the device didn't acknowledge the new attenuation
    pub set_failure: Option<Error>,
    pub reported: String,
}

impl RunReport {
    /// Whether the device acknowledged the new attenuation
    pub fn is_success(&self) -> bool {
        self.set_failure.is_none()
    }
}

/// The [`Attenuator`] struct provides the RCDAT command set on top of a
/// [`Transport`]:
/// * serial_number, model_number, firmware (identity queries)
/// * set_attenuation
/// * get_attenuation
/// * run (the complete identify, set and verify sequence)
///
/// Commands are strictly sequential - each one waits for its reply before
/// returning.
///
/// The transport is closed exactly once, either by [`Attenuator::close`],
/// by [`Attenuator::run`] when it aborts, or when the Attenuator is dropped.
///
/// Use [`AttenuatorBuilder`] to create a new USB attached [`Attenuator`].
#[derive(Debug)]
pub struct Attenuator<T: Transport> {
    transport: T,
    state: SessionState,
}

/// Public [`Attenuator`] functions
impl<T: Transport> Attenuator<T> {
    /// Creates a new Attenuator session from an already opened transport.
    ///
    /// Using [`AttenuatorBuilder`] is preferred for USB attached devices.
    #[must_use]
    pub fn new(transport: T) -> Self {
        trace!("Attenuator::new");
        Attenuator {
            transport,
            state: SessionState::default(),
        }
    }

    /// The current stage of this session
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The transport this session is using
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one command and decode its reply.
    ///
    /// # Returns
    /// * `Ok(String)` - the decoded reply text, which may be empty
    /// * `Err(Error)` - if the session is closed or the transport failed
    pub fn query(&mut self, command: Command) -> Result<String, Error> {
        trace!("Attenuator::query {command}");
        if self.state == SessionState::Closed {
            warn!("Attempted to send {command} on a closed session");
            return Err(DeviceAccess::NoDevice.into());
        }

        self.transport.send(&command.encode())?;
        let frame = self.transport.receive()?;
        let reply = decode_ascii_reply(&frame);
        debug!("{command} -> {reply:?}");
        Ok(reply)
    }

    /// Query the device's serial number
    pub fn serial_number(&mut self) -> Result<String, Error> {
        self.identity_query(Command::SerialNumber)
    }

    /// Query the device's model number
    pub fn model_number(&mut self) -> Result<String, Error> {
        self.identity_query(Command::ModelNumber)
    }

    /// Query the device's firmware version
    pub fn firmware(&mut self) -> Result<String, Error> {
        self.identity_query(Command::Firmware)
    }

    /// Query serial number, model number and firmware version, in that order
    pub fn identity(&mut self) -> Result<AttenuatorInfo, Error> {
        trace!("Attenuator::identity");
        let info = AttenuatorInfo {
            serial_number: self.serial_number()?,
            model_number: self.model_number()?,
            firmware: self.firmware()?,
        };
        info!(
            "RCDAT model {} serial {} firmware {}",
            info.model_number, info.serial_number, info.firmware
        );
        Ok(info)
    }

    /// Set the attenuation, in dB.
    ///
    /// `db` is checked against the supported range before anything is sent.
    /// It is sent in its shortest decimal form, unrounded.
    ///
    /// # Returns
    /// * `Ok(())` - if the device acknowledged the new attenuation
    /// * `Err(Error::InvalidAttenuation)` - if `db` is out of range.  Nothing
    ///   was sent
    /// * `Err(Error::SetAttenuationFailed)` - if the device replied with
    ///   anything other than an acknowledgement.  The session remains usable
    /// * `Err(Error)` - if the transport failed
    pub fn set_attenuation(&mut self, db: f64) -> Result<(), Error> {
        trace!("Attenuator::set_attenuation {db}");
        let attenuation = Attenuation::new(db)?;

        let reply = self.query(Command::SetAttenuation(attenuation))?;
        self.state = SessionState::AttenuationSet;

        if reply == SET_ATTENUATION_ACK {
            info!("Attenuation set to {attenuation} dB");
            Ok(())
        } else {
            warn!("Device didn't acknowledge attenuation {attenuation}: {reply:?}");
            Err(Error::SetAttenuationFailed { reply })
        }
    }

    /// Read the current attenuation from the device, exactly as reported.
    ///
    /// Only a read following a set moves the session on to
    /// [`SessionState::AttenuationVerified`].
    pub fn get_attenuation(&mut self) -> Result<String, Error> {
        trace!("Attenuator::get_attenuation");
        let reply = self.query(Command::GetAttenuation)?;
        if self.state == SessionState::AttenuationSet {
            self.state = SessionState::AttenuationVerified;
        }
        Ok(reply)
    }

    /// Identify the device, set the attenuation and read it back, writing
    /// progress to `out`.
    ///
    /// An unacknowledged set doesn't stop the attenuation being read back -
    /// it is recorded in the returned [`RunReport`] instead.  Any other error
    /// aborts the sequence and closes the session before being returned.
    ///
    /// # Example
    /// ```no_run
    /// use rcdat::AttenuatorBuilder;
    ///
    /// let mut attenuator = AttenuatorBuilder::new().build().unwrap();
    /// let report = attenuator.run(25.0, &mut std::io::stdout()).unwrap();
    /// if !report.is_success() {
    ///     std::process::exit(2);
    /// }
    /// ```
    pub fn run<W: Write>(&mut self, requested: f64, out: &mut W) -> Result<RunReport, Error> {
        trace!("Attenuator::run {requested}");
        let result = self.run_sequence(requested, out);
        if let Err(e) = &result {
            warn!("Aborting in state {}: {e}", self.state);
            if let Err(close_err) = self.close() {
                debug!("Failed to close after aborting: {close_err}");
            }
        }
        result
    }

    /// Release the transport.  Further commands will fail.  Calling this more
    /// than once has no further effect.
    pub fn close(&mut self) -> Result<(), Error> {
        trace!("Attenuator::close");
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.transport.close()
    }
}

/// Private [`Attenuator`] functions
impl<T: Transport> Attenuator<T> {
    fn identity_query(&mut self, command: Command) -> Result<String, Error> {
        let reply = self.query(command)?;
        if self.state == SessionState::Opened {
            self.state = SessionState::IdentityQueried;
        }
        Ok(reply)
    }

    fn run_sequence<W: Write>(&mut self, requested: f64, out: &mut W) -> Result<RunReport, Error> {
        // Checked here as well as by set_attenuation so nothing at all is
        // sent for a bad value
        let requested = Attenuation::new(requested)?;

        let info = self.identity()?;

        writeln!(out, "{}", Command::SetAttenuation(requested))?;
        let set_failure = match self.set_attenuation(requested.db()) {
            Ok(()) => None,
            Err(e) if !e.is_fatal() => {
                writeln!(out, "Error setting attenuation")?;
                Some(e)
            }
            Err(e) => return Err(e),
        };

        writeln!(out, "{}", Command::GetAttenuation)?;
        let reported = self.get_attenuation()?;
        writeln!(out, "Attenuation: {reported}")?;

        Ok(RunReport {
            info,
            requested,
            set_failure,
            reported,
        })
    }
}

impl<T: Transport> Drop for Attenuator<T> {
    fn drop(&mut self) {
        trace!("Attenuator::drop");
        // Ignoring errors since we're in drop
        let _ = self.close();
    }
}
