//! Reserved frames exchanged outside the game schema.
//!
//! Tags `0xF0..=0xFF` never belong to a schema message, so a receiver can
//! tell system frames apart by their first byte alone.

use std::fmt;

use hnp_transport::ConnectionId;

use crate::reader::Reader;
use crate::{DecodeError, RoomId};

/// Lowest tag reserved for system frames.
pub const SYSTEM_TAG_MIN: u8 = 0xF0;

const TAG_JOIN: u8 = 0xF0;
const TAG_JOINED: u8 = 0xF1;
const TAG_REJECTED: u8 = 0xF2;
const TAG_CLOSING: u8 = 0xF3;

/// Returns true if the frame starts with a reserved tag.
pub fn is_system_frame(frame: &[u8]) -> bool {
    frame.first().is_some_and(|tag| *tag >= SYSTEM_TAG_MIN)
}

/// Why the server refused a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    ServerFull,
    RoomFull,
    ShuttingDown,
    /// The client was generated from a different protocol definition.
    FingerprintMismatch,
    /// The first frame was not a well-formed `JOIN`.
    BadHandshake,
}

impl RejectCode {
    pub fn code(self) -> u8 {
        match self {
            Self::ServerFull => 1,
            Self::RoomFull => 2,
            Self::ShuttingDown => 3,
            Self::FingerprintMismatch => 4,
            Self::BadHandshake => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::ServerFull),
            2 => Some(Self::RoomFull),
            3 => Some(Self::ShuttingDown),
            4 => Some(Self::FingerprintMismatch),
            5 => Some(Self::BadHandshake),
            _ => None,
        }
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServerFull => "server full",
            Self::RoomFull => "room full",
            Self::ShuttingDown => "shutting down",
            Self::FingerprintMismatch => "protocol fingerprint mismatch",
            Self::BadHandshake => "bad handshake",
        })
    }
}

/// Framework-level messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemFrame {
    /// Client → server, first frame of every connection.
    /// `room: None` asks for any room with space.
    Join {
        room: Option<RoomId>,
        fingerprint: u32,
    },

    /// Server → client: admitted.
    Joined {
        room: RoomId,
        connection: ConnectionId,
    },

    /// Server → client: admission refused; the server closes next.
    Rejected { code: RejectCode },

    /// Server → client: the room is going away.
    Closing { reason: String },
}

impl SystemFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        match self {
            Self::Join { room, fingerprint } => {
                out.push(TAG_JOIN);
                out.extend_from_slice(&room.map_or(0, |r| r.0).to_le_bytes());
                out.extend_from_slice(&fingerprint.to_le_bytes());
            }
            Self::Joined { room, connection } => {
                out.push(TAG_JOINED);
                out.extend_from_slice(&room.0.to_le_bytes());
                out.extend_from_slice(&connection.into_inner().to_le_bytes());
            }
            Self::Rejected { code } => {
                out.push(TAG_REJECTED);
                out.push(code.code());
            }
            Self::Closing { reason } => {
                let reason = truncate_utf8(reason, usize::from(u8::MAX));
                out.push(TAG_CLOSING);
                // Truncated to 255 bytes above.
                out.push(reason.len() as u8);
                out.extend_from_slice(reason.as_bytes());
            }
        }
        out
    }

    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(frame);
        let frame = match r.u8()? {
            TAG_JOIN => {
                let room = r.u32()?;
                Self::Join {
                    room: (room != 0).then_some(RoomId(room)),
                    fingerprint: r.u32()?,
                }
            }
            TAG_JOINED => Self::Joined {
                room: RoomId(r.u32()?),
                connection: ConnectionId::new(r.u32()?),
            },
            TAG_REJECTED => {
                let offset = r.position();
                let got = r.u8()?;
                let code = RejectCode::from_code(got)
                    .ok_or(DecodeError::UnknownRejectCode { offset, got })?;
                Self::Rejected { code }
            }
            TAG_CLOSING => Self::Closing {
                reason: r.string(usize::from(u8::MAX))?,
            },
            tag => return Err(DecodeError::UnknownTag { offset: 0, tag }),
        };
        r.finish()?;
        Ok(frame)
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
