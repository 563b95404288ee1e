//! Inbound framing: CRLF line reassembly and reply-line parsing.
//!
//! SMTP replies are CRLF-terminated lines of the form `250 OK` (final) or
//! `250-SIZE 35882577` (continuation). The [`LineAssembler`] turns an
//! arbitrary sequence of byte chunks into complete lines;
//! [`parse_reply_line`] turns one line into a [`Reply`] record.

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Reassembles CRLF-terminated lines from a stream of byte chunks.
///
/// Bare CR and bare LF are ordinary data; a line ends only at a CRLF pair.
/// Emitted lines keep their terminating CRLF, and the internal buffer
/// never retains a complete line between calls.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: BytesMut,
}

impl LineAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of received bytes and returns every line the chunk
    /// completed, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(position) = find_crlf(&self.buffer) {
            let line = self.buffer.split_to(position + 2);
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Discards any partially assembled line.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Finds the position of the first CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses one CRLF-terminated reply line into a [`Reply`].
///
/// The first three characters must be decimal digits; the fourth must be
/// a space (final line) or `-` (continuation). The remainder, CRLF
/// excluded, becomes the reply text.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] for anything that does not follow
/// the reply grammar. The session treats that as fatal.
pub fn parse_reply_line(line: &str) -> Result<Reply> {
    let malformed = || Error::MalformedReply(line.trim_end().to_string());
    if !line.ends_with("\r\n") {
        return Err(malformed());
    }
    // Validate by byte so multi-byte characters in the code position are
    // a malformed reply, not a slice outside a char boundary.
    let Some(code_bytes) = line.as_bytes().get(..3) else {
        return Err(malformed());
    };
    if !code_bytes.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    let code: u16 = line[..3].parse().map_err(|_| malformed())?;
    let last = match line.as_bytes().get(3).copied() {
        Some(b' ') => true,
        Some(b'-') => false,
        _ => return Err(malformed()),
    };
    // Three ASCII digits and an ASCII separator put both slice bounds on
    // char boundaries; the CRLF check covers the tail.
    let text = line[4..line.len() - 2].to_string();
    Ok(Reply::new(ReplyCode::new(code), last, text))
}
