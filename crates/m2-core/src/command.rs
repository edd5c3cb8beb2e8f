//! Binary control commands sent upstream to the device.
//!
//! Every command is `[u8 opcode][u8 payload length][payload]`:
//!
//! | Opcode | Command             | Payload                   |
//! |--------|---------------------|---------------------------|
//! | `0x01` | set all flags       | `u8 flags`                |
//! | `0x02` | set message flags   | `u16 id (LE)`, `u8 flags` |
//! | `0x03` | get last value      | `u16 id (LE)`             |

use bytes::{BufMut, Bytes, BytesMut};

/// Message flag: transmission disabled.
pub const FLAG_RESET: u8 = 0x00;
/// Message flag: transmission enabled.
pub const FLAG_TRANSMIT: u8 = 0x01;

const CMD_SET_ALL_MSG_FLAGS: u8 = 0x01;
const CMD_SET_MSG_FLAGS: u8 = 0x02;
const CMD_GET_MSG_LAST_VALUE: u8 = 0x03;

/// Pre-encoded "disable every message" command.
pub const DISABLE_ALL_MESSAGES: [u8; 3] = [CMD_SET_ALL_MSG_FLAGS, 1, FLAG_RESET];

/// A device control command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Set the transmit flags of every known message.
    SetAllFlags {
        /// Flag byte.
        flags: u8,
    },
    /// Set the transmit flags of one message.
    SetMessageFlags {
        /// Message id.
        id: u16,
        /// Flag byte.
        flags: u8,
    },
    /// Ask the device to resend its cached value for a message now.
    GetLastValue {
        /// Message id.
        id: u16,
    },
}

impl Command {
    /// Disable transmission of every message.
    pub fn disable_all() -> Self {
        Self::SetAllFlags { flags: FLAG_RESET }
    }

    /// Wire opcode.
    pub fn opcode(self) -> u8 {
        match self {
            Self::SetAllFlags { .. } => CMD_SET_ALL_MSG_FLAGS,
            Self::SetMessageFlags { .. } => CMD_SET_MSG_FLAGS,
            Self::GetLastValue { .. } => CMD_GET_MSG_LAST_VALUE,
        }
    }

    /// Short name for logging/metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::SetAllFlags { .. } => "set_all_flags",
            Self::SetMessageFlags { .. } => "set_message_flags",
            Self::GetLastValue { .. } => "get_last_value",
        }
    }

    /// Encode to the wire layout.
    pub fn encode(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u8(self.opcode());
        match self {
            Self::SetAllFlags { flags } => {
                buf.put_u8(1);
                buf.put_u8(flags);
            }
            Self::SetMessageFlags { id, flags } => {
                buf.put_u8(3);
                buf.put_u16_le(id);
                buf.put_u8(flags);
            }
            Self::GetLastValue { id } => {
                buf.put_u8(2);
                buf.put_u16_le(id);
            }
        }
        buf.freeze()
    }
}

/// Commands that (re)enable a message.
///
/// The last-value request comes first so a fresh value arrives immediately
/// instead of on the next natural transmission cycle.
pub fn enable_message(id: u16) -> [Command; 2] {
    [
        Command::GetLastValue { id },
        Command::SetMessageFlags {
            id,
            flags: FLAG_TRANSMIT,
        },
    ]
}

/// Commands that disable a message.
pub fn disable_message(id: u16) -> [Command; 1] {
    [Command::SetMessageFlags {
        id,
        flags: FLAG_RESET,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_set_all_flags() {
        let enable = Command::SetAllFlags {
            flags: FLAG_TRANSMIT,
        };
        assert_eq!(&enable.encode()[..], &[0x01, 0x01, 0x01]);
        assert_eq!(&Command::disable_all().encode()[..], &DISABLE_ALL_MESSAGES);
    }

    #[test]
    fn encode_set_message_flags() {
        let cmd = Command::SetMessageFlags {
            id: 0x0102,
            flags: FLAG_TRANSMIT,
        };
        assert_eq!(&cmd.encode()[..], &[0x02, 0x03, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn encode_get_last_value() {
        let cmd = Command::GetLastValue { id: 0x3D2 };
        assert_eq!(&cmd.encode()[..], &[0x03, 0x02, 0xD2, 0x03]);
    }

    #[test]
    fn enable_sequence_requests_last_value_first() {
        let encoded: Vec<Vec<u8>> = enable_message(10)
            .iter()
            .map(|c| c.encode().to_vec())
            .collect();
        assert_eq!(
            encoded,
            vec![vec![0x03, 0x02, 10, 0], vec![0x02, 0x03, 10, 0, 0x01]]
        );
    }

    #[test]
    fn disable_sequence() {
        let encoded: Vec<Vec<u8>> = disable_message(10)
            .iter()
            .map(|c| c.encode().to_vec())
            .collect();
        assert_eq!(encoded, vec![vec![0x02, 0x03, 10, 0, 0x00]]);
    }

    #[test]
    fn length_byte_matches_payload() {
        for cmd in [
            Command::disable_all(),
            Command::SetMessageFlags { id: 7, flags: 1 },
            Command::GetLastValue { id: 7 },
        ] {
            let bytes = cmd.encode();
            assert_eq!(usize::from(bytes[1]), bytes.len() - 2, "{}", cmd.name());
            assert_eq!(bytes[0], cmd.opcode());
        }
    }
}
