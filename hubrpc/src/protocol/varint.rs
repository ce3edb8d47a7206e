//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Variable-length size prefix used by the binary hub protocol.
//!
//! Each binary message is preceded by its payload length encoded as a
//! little-endian base-128 varint. Bit 7 of every byte is a continuation flag
//! and the low seven bits carry the value, least significant group first.
//!
//! # Protocol
//!
//! ```text
//! +------------------------+-------------------------+
//! | Length (1 to 5 bytes)  | MessagePack payload     |
//! +------------------------+-------------------------+
//! ```
//!
//! The header never exceeds five bytes, which caps a single message at
//! `2^31 - 1` bytes. The fifth byte may only carry the top four value bits.
//!
//! # Examples
//!
//! ```rust
//! use bytes::BytesMut;
//! use hubrpc::protocol::varint::{read_length_prefix, write_length_prefix};
//!
//! let mut buf = BytesMut::new();
//! write_length_prefix(300, &mut buf).unwrap();
//! assert_eq!(&buf[..], &[0xAC, 0x02]);
//!
//! assert_eq!(read_length_prefix(&buf).unwrap(), Some((300, 2)));
//! ```

use crate::protocol::ProtocolError;
use bytes::{BufMut, BytesMut};

/// Maximum number of bytes in a length prefix.
pub const MAX_LENGTH_PREFIX_SIZE: usize = 5;

/// Largest payload length a prefix can describe.
pub const MAX_MESSAGE_LENGTH: usize = i32::MAX as usize;

/// Appends the varint encoding of `length` to `out`.
///
/// # Errors
///
/// Returns [`ProtocolError::LengthHeaderOverflow`] when `length` exceeds
/// [`MAX_MESSAGE_LENGTH`].
pub fn write_length_prefix(length: usize, out: &mut BytesMut) -> Result<(), ProtocolError> {
    if length > MAX_MESSAGE_LENGTH {
        return Err(ProtocolError::LengthHeaderOverflow);
    }

    let mut remaining = length;
    loop {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining > 0 {
            byte |= 0x80;
        }
        out.put_u8(byte);
        if remaining == 0 {
            return Ok(());
        }
    }
}

/// Reads a length prefix from the start of `buf`.
///
/// Returns `Ok(Some((length, header_size)))` when a complete prefix is
/// present, or `Ok(None)` when `buf` ends inside the prefix and more bytes
/// are needed.
///
/// # Errors
///
/// Returns [`ProtocolError::LengthHeaderOverflow`] when the fifth byte still
/// has its continuation bit set or carries bits beyond the 31-bit range.
pub fn read_length_prefix(buf: &[u8]) -> Result<Option<(usize, usize)>, ProtocolError> {
    let mut length: usize = 0;

    for (index, &byte) in buf.iter().take(MAX_LENGTH_PREFIX_SIZE).enumerate() {
        length |= ((byte & 0x7F) as usize) << (index * 7);

        if index == MAX_LENGTH_PREFIX_SIZE - 1 {
            if byte & 0x80 != 0 || byte > 0x07 {
                return Err(ProtocolError::LengthHeaderOverflow);
            }
            return Ok(Some((length, MAX_LENGTH_PREFIX_SIZE)));
        }

        if byte & 0x80 == 0 {
            return Ok(Some((length, index + 1)));
        }
    }

    Ok(None)
}
