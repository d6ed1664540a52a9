//! Client-to-server message grammar.
//!
//! The decoders operate on complete frames, i.e. payloads whose terminator
//! has already been stripped by the [`FrameAssembler`](crate::FrameAssembler).
//! None of them coerce bad input: an empty number, a stray sign or an
//! overflowing magnitude are all reported as [`DecodeError`]s.

use thiserror::Error;

use crate::{Position, TERMINATOR};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("{len} byte frame exceeds the {max} byte budget")]
    TooLong { len: usize, max: usize },
    #[error("expected a decimal number")]
    NotANumber,
    #[error("number out of range 0..={max}")]
    OutOfRange { max: u32 },
    #[error("malformed position report")]
    MalformedReport,
}

/// A message as the robot sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Username(Vec<u8>),
    KeyId(u32),
    Confirmation(u32),
    Report(Position),
    Secret(Vec<u8>),
}

impl ClientMessage {
    /// Wire bytes of the message, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = match self {
            ClientMessage::Username(text) | ClientMessage::Secret(text) => text.clone(),
            ClientMessage::KeyId(value) | ClientMessage::Confirmation(value) => {
                value.to_string().into_bytes()
            }
            ClientMessage::Report(position) => {
                format!("OK {} {}", position.x, position.y).into_bytes()
            }
        };
        bytes.extend_from_slice(&TERMINATOR);
        bytes
    }
}

/// Accepts any non-empty payload that fits `max` together with the terminator.
pub fn decode_text(frame: &[u8], max: usize) -> Result<&[u8], DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::Empty);
    }
    if frame.len() + TERMINATOR.len() > max {
        return Err(DecodeError::TooLong {
            len: frame.len() + TERMINATOR.len(),
            max,
        });
    }
    Ok(frame)
}

/// Parses a frame consisting only of decimal digits with a value in `0..=max`.
pub fn decode_bounded(frame: &[u8], max: u32) -> Result<u32, DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::Empty);
    }
    let value = parse_digits(frame)?;
    u32::try_from(value)
        .ok()
        .filter(|value| *value <= max)
        .ok_or(DecodeError::OutOfRange { max })
}

/// Parses `OK <x> <y>` where either coordinate may carry a leading minus.
pub fn decode_position(frame: &[u8]) -> Result<Position, DecodeError> {
    let rest = frame
        .strip_prefix(b"OK ")
        .ok_or(DecodeError::MalformedReport)?;
    let mut parts = rest.split(|byte| *byte == b' ');
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DecodeError::MalformedReport);
    };
    Ok(Position::new(parse_coordinate(x)?, parse_coordinate(y)?))
}

fn parse_digits(digits: &[u8]) -> Result<u64, DecodeError> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::NotANumber);
    }
    digits.iter().try_fold(0u64, |acc, digit| {
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(u64::from(digit - b'0')))
            .ok_or(DecodeError::OutOfRange { max: u32::MAX })
    })
}

fn parse_coordinate(text: &[u8]) -> Result<i32, DecodeError> {
    let (negative, digits) = match text.strip_prefix(b"-") {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let magnitude = parse_digits(digits).map_err(|_| DecodeError::MalformedReport)?;
    let signed = i64::try_from(magnitude).map_err(|_| DecodeError::MalformedReport)?;
    let signed = if negative { -signed } else { signed };
    i32::try_from(signed).map_err(|_| DecodeError::MalformedReport)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"Mario", 20), Ok(&b"Mario"[..]));
        assert_eq!(decode_text(&[b'x'; 18], 20).map(<[u8]>::len), Ok(18));
        assert_eq!(
            decode_text(&[b'x'; 19], 20),
            Err(DecodeError::TooLong { len: 21, max: 20 })
        );
        assert_eq!(decode_text(b"", 20), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_bounded() {
        assert_eq!(decode_bounded(b"0", 999), Ok(0));
        assert_eq!(decode_bounded(b"999", 999), Ok(999));
        assert_eq!(decode_bounded(b"65535", 65535), Ok(65535));
        assert_eq!(decode_bounded(b"007", 999), Ok(7));
    }

    #[test]
    fn test_decode_bounded_rejects_garbage() {
        assert_eq!(decode_bounded(b"", 999), Err(DecodeError::Empty));
        assert_eq!(decode_bounded(b"1000", 999), Err(DecodeError::OutOfRange { max: 999 }));
        assert_eq!(decode_bounded(b"-1", 999), Err(DecodeError::NotANumber));
        assert_eq!(decode_bounded(b"+1", 999), Err(DecodeError::NotANumber));
        assert_eq!(decode_bounded(b"12a", 999), Err(DecodeError::NotANumber));
        assert_eq!(decode_bounded(b"1 ", 999), Err(DecodeError::NotANumber));
        assert!(decode_bounded(b"99999999999999999999999", 65535).is_err());
    }

    #[test]
    fn test_decode_position() {
        assert_eq!(decode_position(b"OK 1 2"), Ok(Position::new(1, 2)));
        assert_eq!(decode_position(b"OK -3 -14"), Ok(Position::new(-3, -14)));
        assert_eq!(decode_position(b"OK 0 -0"), Ok(Position::ORIGIN));
    }

    #[test]
    fn test_decode_position_rejects_deviations() {
        let malformed: [&[u8]; 10] = [
            b"OK 1",
            b"OK 1 2 3",
            b"OK  1 2",
            b"OK 1 2 ",
            b"ok 1 2",
            b"OK 1.5 2",
            b"OK - 2",
            b"OK a b",
            b"1 2",
            b"OK 99999999999 1",
        ];
        for frame in malformed {
            assert_eq!(
                decode_position(frame),
                Err(DecodeError::MalformedReport),
                "{:?}",
                String::from_utf8_lossy(frame)
            );
        }
    }

    #[test]
    fn test_client_message_encoding() {
        assert_eq!(ClientMessage::Username(b"Mario".to_vec()).encode(), b"Mario\x07\x08");
        assert_eq!(ClientMessage::KeyId(0).encode(), b"0\x07\x08");
        assert_eq!(
            ClientMessage::Report(Position::new(-2, 5)).encode(),
            b"OK -2 5\x07\x08"
        );
    }
}
