//! RCDAT command encoding and reply decoding
//!
//! Commands are ASCII strings of the form `*:<NAME>` or `*:<NAME>=<value>;`,
//! sent as a single transfer.  Every reply is a [`FRAME_SIZE`] byte frame
//! whose text payload starts at byte 1 and ends at the first `0x00` or
//! `0xff` byte.
use crate::constants::*;
use crate::Attenuation;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::fmt;

/// A single reply frame read from the device
pub type Frame = [u8; FRAME_SIZE];

/// The commands supported by this crate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Query the serial number
    SerialNumber,
    /// Query the model number
    ModelNumber,
    /// Query the firmware version
    Firmware,
    /// Set the attenuation
    SetAttenuation(Attenuation),
    /// Query the current attenuation
    GetAttenuation,
}

impl Command {
    /// The bytes to write to the device for this command
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SerialNumber => write!(f, "{COMMAND_PREFIX}SN?"),
            Command::ModelNumber => write!(f, "{COMMAND_PREFIX}MN?"),
            Command::Firmware => write!(f, "{COMMAND_PREFIX}FIRMWARE?"),
            Command::SetAttenuation(att) => write!(f, "{COMMAND_PREFIX}SETATT={att};"),
            Command::GetAttenuation => write!(f, "{COMMAND_PREFIX}ATT?"),
        }
    }
}

/// Decode the ASCII payload of a reply frame.
///
/// Byte 0 is skipped.  Each following byte is mapped directly to the
/// character with the same code point until a `0x00` or `0xff` terminator,
/// or the end of the buffer, is reached.  The terminator is not included.
pub fn decode_ascii_reply(frame: &[u8]) -> String {
    let reply: String = frame
        .iter()
        .skip(FRAME_PAYLOAD_OFFSET)
        .take_while(|&&b| b != FRAME_TERMINATOR_NUL && b != FRAME_TERMINATOR_FF)
        .map(|&b| char::from(b))
        .collect();
    trace!("decode_ascii_reply {reply:?}");
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(header: u8, payload: &[u8], terminator: u8) -> Frame {
        let mut frame = [0xaa; FRAME_SIZE];
        frame[0] = header;
        frame[1..1 + payload.len()].copy_from_slice(payload);
        frame[1 + payload.len()] = terminator;
        frame
    }

    #[test]
    fn test_decode_stops_at_nul() {
        let f = frame(0x29, b"11401230023", 0x00);
        assert_eq!(decode_ascii_reply(&f), "11401230023");
    }

    #[test]
    fn test_decode_stops_at_ff() {
        let f = frame(0x28, b"RCDAT-6000-90", 0xff);
        assert_eq!(decode_ascii_reply(&f), "RCDAT-6000-90");
    }

    #[test]
    fn test_decode_ignores_header() {
        for header in [0x00, 0x01, 0x7f, 0xff] {
            let f = frame(header, b"37.5", 0x00);
            assert_eq!(decode_ascii_reply(&f), "37.5");
        }
    }

    #[test]
    fn test_decode_immediate_terminator_is_empty() {
        assert_eq!(decode_ascii_reply(&frame(0x01, b"", 0x00)), "");
        assert_eq!(decode_ascii_reply(&frame(0x01, b"", 0xff)), "");
    }

    #[test]
    fn test_decode_every_payload_byte_maps_directly() {
        let payload: Vec<u8> = (1u8..=31).chain(224u8..=254).collect();
        let f = frame(0, &payload, 0xff);
        let expected: String = payload.iter().map(|&b| char::from(b)).collect();
        let decoded = decode_ascii_reply(&f);
        assert_eq!(decoded, expected);
        assert_eq!(decoded.chars().count(), payload.len());
    }

    #[test]
    fn test_decode_latin1_not_utf8() {
        // 0xc3 0xa9 is "é" in UTF-8, but must decode as two characters
        let f = frame(0, &[0xc3, 0xa9], 0);
        assert_eq!(decode_ascii_reply(&f), "\u{c3}\u{a9}");
    }

    #[test]
    fn test_decode_without_terminator_uses_whole_buffer() {
        let mut f = [b'9'; FRAME_SIZE];
        f[0] = 0;
        assert_eq!(decode_ascii_reply(&f).len(), FRAME_SIZE - 1);
        assert_eq!(decode_ascii_reply(&[]), "");
        assert_eq!(decode_ascii_reply(&[0x05]), "");
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(Command::SerialNumber.to_string(), "*:SN?");
        assert_eq!(Command::ModelNumber.to_string(), "*:MN?");
        assert_eq!(Command::Firmware.to_string(), "*:FIRMWARE?");
        assert_eq!(Command::GetAttenuation.to_string(), "*:ATT?");
        let att = Attenuation::new(25.0).unwrap();
        assert_eq!(Command::SetAttenuation(att).to_string(), "*:SETATT=25;");
        let att = Attenuation::new(0.25).unwrap();
        assert_eq!(Command::SetAttenuation(att).encode(), b"*:SETATT=0.25;");
    }
}
