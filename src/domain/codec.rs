//! Motor command wire format.
//!
//! A command is fixed-width ASCII: the opcode `m` followed by the left and
//! right lever values as sign-prefixed, zero-padded two-digit decimals.
//! Both fields carry the *negated* lever value: the stored value is positive
//! for "up" on screen, while on the wire a downward lever pull drives the
//! motor forward. The polarity flip is a fixed transform of the protocol,
//! applied on encode and undone nowhere (the vehicle speaks wire polarity).
//!
//! `left = +3, right = -2` encodes as `m-03+02`.

use crate::domain::models::CommandFrame;
use thiserror::Error;

/// Opcode identifying a motor command.
pub const OPCODE: u8 = b'm';

/// Encoded length in bytes: opcode plus two sign-prefixed 2-digit fields.
pub const FRAME_LEN: usize = 7;

/// Encode a lever pair into the 7-byte wire command.
///
/// Inputs are pre-clamped by the lever controller; encoding never fails for
/// values with magnitude below 100.
pub fn encode(frame: CommandFrame) -> String {
    format!("m{:+03}{:+03}", -frame.left, -frame.right)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("command must be 7 bytes, got {0}")]
    Length(usize),
    #[error("unknown opcode {0:?}")]
    Opcode(char),
    #[error("malformed value field {0:?}")]
    Field(String),
}

/// Textual inverse of [`encode`].
///
/// Returns the wire-polarity pair, i.e. the negated lever values. The
/// command protocol is one-directional; this exists for tests and
/// diagnostics.
pub fn decode(command: &str) -> Result<(i16, i16), DecodeError> {
    let bytes = command.as_bytes();
    if bytes.len() != FRAME_LEN {
        return Err(DecodeError::Length(bytes.len()));
    }
    if bytes[0] != OPCODE {
        return Err(DecodeError::Opcode(bytes[0] as char));
    }
    let left = parse_field(&bytes[1..4])?;
    let right = parse_field(&bytes[4..7])?;
    Ok((left, right))
}

fn parse_field(field: &[u8]) -> Result<i16, DecodeError> {
    let malformed = || DecodeError::Field(String::from_utf8_lossy(field).into_owned());
    let sign: i16 = match field[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(malformed()),
    };
    if !field[1].is_ascii_digit() || !field[2].is_ascii_digit() {
        return Err(malformed());
    }
    let magnitude = i16::from((field[1] - b'0') * 10 + (field[2] - b'0'));
    Ok(sign * magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lever::LEVER_LIMIT;

    fn frame(left: i16, right: i16) -> CommandFrame {
        CommandFrame { left, right }
    }

    #[test]
    fn test_encode_inverts_polarity() {
        assert_eq!(encode(frame(3, -2)), "m-03+02");
        assert_eq!(encode(frame(-4, 0)), "m+04+00");
        assert_eq!(encode(frame(0, 0)), "m+00+00");
        assert_eq!(encode(frame(10, -10)), "m-10+10");
    }

    #[test]
    fn test_encode_shape() {
        for left in -LEVER_LIMIT..=LEVER_LIMIT {
            for right in -LEVER_LIMIT..=LEVER_LIMIT {
                let command = encode(frame(left, right));
                let bytes = command.as_bytes();
                assert_eq!(bytes.len(), FRAME_LEN, "{command}");
                assert!(command.is_ascii());
                assert_eq!(bytes[0], OPCODE);
                for field in [&bytes[1..4], &bytes[4..7]] {
                    assert!(field[0] == b'+' || field[0] == b'-', "{command}");
                    assert!(field[1].is_ascii_digit() && field[2].is_ascii_digit());
                }
            }
        }
    }

    #[test]
    fn test_decode_is_sign_inverted_round_trip() {
        for left in -LEVER_LIMIT..=LEVER_LIMIT {
            for right in -LEVER_LIMIT..=LEVER_LIMIT {
                let decoded = decode(&encode(frame(left, right))).unwrap();
                assert_eq!(decoded, (-left, -right));
            }
        }
    }

    #[test]
    fn test_decode_rejects_malformed_commands() {
        assert_eq!(decode("m+00+0"), Err(DecodeError::Length(6)));
        assert_eq!(decode("x+00+00"), Err(DecodeError::Opcode('x')));
        assert_eq!(decode("m 00+00"), Err(DecodeError::Field(" 00".into())));
        assert_eq!(decode("m+0a+00"), Err(DecodeError::Field("+0a".into())));
    }
}
