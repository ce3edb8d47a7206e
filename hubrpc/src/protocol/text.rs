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

//! Record-separator framing for text messages.
//!
//! Text messages, including the handshake, are terminated by the ASCII record
//! separator `0x1E`. A buffer may hold several complete records followed by a
//! partial one; the partial record stays in the buffer until the next chunk
//! arrives.

use bytes::{Bytes, BytesMut};

/// The ASCII record separator that terminates every text message.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Appends the record separator to an encoded message.
pub fn write_record(payload: &[u8], out: &mut BytesMut) {
    out.extend_from_slice(payload);
    out.extend_from_slice(&[RECORD_SEPARATOR]);
}

/// Splits the next complete record off the front of `buffer`.
///
/// The returned bytes exclude the separator. Returns `None`, leaving the
/// buffer untouched, when no separator has arrived yet.
///
/// # Examples
///
/// ```rust
/// use bytes::BytesMut;
/// use hubrpc::protocol::text::take_record;
///
/// let mut buffer = BytesMut::from(&b"{}\x1e{\"ty"[..]);
/// assert_eq!(take_record(&mut buffer).unwrap(), &b"{}"[..]);
/// assert!(take_record(&mut buffer).is_none());
/// assert_eq!(&buffer[..], b"{\"ty");
/// ```
pub fn take_record(buffer: &mut BytesMut) -> Option<Bytes> {
    let position = buffer.iter().position(|&byte| byte == RECORD_SEPARATOR)?;
    let mut record = buffer.split_to(position + 1);
    record.truncate(position);
    Some(record.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_records_in_one_buffer() {
        let mut buffer = BytesMut::from(&b"a\x1ebb\x1e\x1e"[..]);
        assert_eq!(take_record(&mut buffer).unwrap(), &b"a"[..]);
        assert_eq!(take_record(&mut buffer).unwrap(), &b"bb"[..]);
        assert_eq!(take_record(&mut buffer).unwrap(), &b""[..]);
        assert!(take_record(&mut buffer).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_write_record_appends_separator() {
        let mut out = BytesMut::new();
        write_record(b"{}", &mut out);
        assert_eq!(&out[..], b"{}\x1e");
    }
}
