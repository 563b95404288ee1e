//! Message body normalization for DATA transmission.

/// Prepares a message body for transmission inside a `DATA` payload.
///
/// Line endings are normalized to CRLF (a bare LF becomes CRLF, a bare CR
/// is dropped), lines beginning with `.` get an extra `.` prepended so
/// the bare-dot terminator stays unambiguous (RFC 5321 section 4.5.2),
/// and a trailing CRLF is appended if a non-empty body lacks one. An
/// empty body stays empty.
#[must_use]
pub fn normalize_body(body: &str) -> String {
    let mut output = String::with_capacity(body.len() + 16);
    let mut at_line_start = true;
    for ch in body.chars() {
        match ch {
            '\n' => {
                output.push_str("\r\n");
                at_line_start = true;
            }
            '\r' => {}
            ch => {
                if at_line_start {
                    at_line_start = false;
                    if ch == '.' {
                        output.push('.');
                    }
                }
                output.push(ch);
            }
        }
    }
    if !at_line_start {
        output.push_str("\r\n");
    }
    output
}
