//! Test doubles for [`Transport`], so the command set can be exercised
//! without an RCDAT attached.
//!
//! * [`MockTransport`] plays back pre-loaded request/reply pairs in order,
//!   and can be told to fail a given exchange.
//! * [`SimulatedAttenuator`] behaves like a real device, storing the last
//!   attenuation set and reporting it back.
use crate::constants::*;
use crate::error::SerializableUsbError;
use crate::protocol::Frame;
use crate::{Error, Transport};

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Header byte the mocks put at the start of every reply frame
pub const MOCK_HEADER: u8 = 0x2a;

/// Build a reply frame the way the device does: header byte, payload, then a
/// terminator.  The rest of the frame is padding that must be ignored.
pub fn reply_frame(reply: &str, terminator: u8) -> Frame {
    let mut frame = [0xffu8; FRAME_SIZE];
    frame[0] = MOCK_HEADER;
    let payload = reply.as_bytes();
    frame[FRAME_PAYLOAD_OFFSET..FRAME_PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    frame[FRAME_PAYLOAD_OFFSET + payload.len()] = terminator;
    frame
}

/// A USB failure, as the real transport would report a device being
/// unplugged mid-session
pub fn unplugged() -> Error {
    Error::Usb(SerializableUsbError::UsbError {
        message: rusb::Error::NoDevice.to_string(),
    })
}

#[derive(Debug)]
enum Reply {
    Frame(Frame),
    FailSend(Error),
    FailReceive(Error),
}

#[derive(Debug)]
struct Expectation {
    request: String,
    reply: Reply,
}

/// A scripted [`Transport`].
///
/// Expectations are consumed in order.  Each `send()` is recorded and
/// checked against the next expectation, and the matching reply is returned
/// by the following `receive()`.  Unexpected traffic panics, failing the test.
#[derive(Debug, Default)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    pending: Option<Reply>,
    sent: Vec<String>,
    closes: Rc<Cell<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `request`, and answer with `reply` terminated by a NUL
    pub fn expect(&mut self, request: &str, reply: &str) -> &mut Self {
        self.expect_frame(request, reply_frame(reply, FRAME_TERMINATOR_NUL))
    }

    /// Expect `request`, and answer with a raw frame
    pub fn expect_frame(&mut self, request: &str, frame: Frame) -> &mut Self {
        self.push(request, Reply::Frame(frame))
    }

    /// Expect `request`, and fail to send it
    pub fn fail_send(&mut self, request: &str, error: Error) -> &mut Self {
        self.push(request, Reply::FailSend(error))
    }

    /// Expect `request`, send it, then fail to read the reply
    pub fn fail_receive(&mut self, request: &str, error: Error) -> &mut Self {
        self.push(request, Reply::FailReceive(error))
    }

    /// Every command sent so far
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// A counter of `close()` calls, which remains readable after the
    /// transport itself has been dropped
    pub fn close_counter(&self) -> Rc<Cell<usize>> {
        self.closes.clone()
    }

    fn push(&mut self, request: &str, reply: Reply) -> &mut Self {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            reply,
        });
        self
    }
}

impl Transport for MockTransport {
    fn send(&mut self, command: &[u8]) -> Result<(), Error> {
        let command = String::from_utf8_lossy(command).to_string();
        assert_eq!(self.closes.get(), 0, "send {command:?} after close");
        assert!(self.pending.is_none(), "send {command:?} with reply unread");
        self.sent.push(command.clone());

        let expectation = self
            .expectations
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command {command:?}"));
        assert_eq!(command, expectation.request);

        match expectation.reply {
            Reply::FailSend(error) => Err(error),
            reply => {
                self.pending = Some(reply);
                Ok(())
            }
        }
    }

    fn receive(&mut self) -> Result<Frame, Error> {
        match self.pending.take() {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::FailReceive(error)) => Err(error),
            Some(Reply::FailSend(_)) => unreachable!(),
            None => panic!("receive without a command sent"),
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

/// A [`Transport`] which behaves like an RCDAT: `SETATT` stores the value
/// and is acknowledged, `ATT?` reports the stored value.
#[derive(Debug)]
pub struct SimulatedAttenuator {
    attenuation: String,
    reply: Option<String>,
    pub sent: Vec<String>,
}

impl SimulatedAttenuator {
    pub fn new() -> Self {
        SimulatedAttenuator {
            attenuation: "0".to_string(),
            reply: None,
            sent: Vec::new(),
        }
    }

    fn respond(&mut self, command: &str) -> String {
        let Some(command) = command.strip_prefix(COMMAND_PREFIX) else {
            return String::new();
        };
        if let Some(value) = command
            .strip_prefix("SETATT=")
            .and_then(|v| v.strip_suffix(';'))
        {
            match value.parse::<f64>() {
                Ok(db) if (0.0..=95.0).contains(&db) => {
                    self.attenuation = value.to_string();
                    SET_ATTENUATION_ACK.to_string()
                }
                _ => "0".to_string(),
            }
        } else {
            match command {
                "SN?" => "11401230023".to_string(),
                "MN?" => "RCDAT-6000-90".to_string(),
                "FIRMWARE?" => "C9".to_string(),
                "ATT?" => self.attenuation.clone(),
                _ => String::new(),
            }
        }
    }
}

impl Transport for SimulatedAttenuator {
    fn send(&mut self, command: &[u8]) -> Result<(), Error> {
        let command = String::from_utf8_lossy(command).to_string();
        self.reply = Some(self.respond(&command));
        self.sent.push(command);
        Ok(())
    }

    fn receive(&mut self) -> Result<Frame, Error> {
        let reply = self.reply.take().unwrap_or_default();
        Ok(reply_frame(&reply, FRAME_TERMINATOR_FF))
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
