//! SMTP reply types.

/// One reply line received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status code.
    pub code: ReplyCode,
    /// `true` when the code was followed by a space, marking the final
    /// line of a possibly multi-line reply; `false` for a `-` separator.
    pub last: bool,
    /// Human-readable remainder of the line, with the CRLF stripped.
    pub text: String,
}

impl Reply {
    /// Creates a new reply line record.
    #[must_use]
    pub fn new(code: ReplyCode, last: bool, text: impl Into<String>) -> Self {
        Self {
            code,
            last,
            text: text.into(),
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 454 Temporary authentication failure
    pub const TEMP_AUTH_FAILURE: Self = Self(454);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::manual_string_new)]
mod tests {
    use super::*;

    #[test]
    fn success_codes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::SERVICE_READY.is_success());
        assert!(ReplyCode::CLOSING.is_success());
        assert!(!ReplyCode::OK.is_transient());
        assert!(!ReplyCode::OK.is_permanent());
        assert!(!ReplyCode::OK.is_intermediate());
    }

    #[test]
    fn intermediate_codes() {
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(!ReplyCode::START_DATA.is_success());
    }

    #[test]
    fn transient_errors() {
        assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
        assert!(ReplyCode::TEMP_AUTH_FAILURE.is_transient());
    }

    #[test]
    fn permanent_errors() {
        assert!(ReplyCode::SYNTAX_ERROR.is_permanent());
        assert!(ReplyCode::AUTH_FAILED.is_permanent());
        assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
        assert!(ReplyCode::TRANSACTION_FAILED.is_permanent());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ReplyCode::OK), "250");
        assert_eq!(format!("{}", ReplyCode::new(354)), "354");
    }

    #[test]
    fn reply_record() {
        let reply = Reply::new(ReplyCode::OK, false, "SIZE 35882577");
        assert_eq!(reply.code.as_u16(), 250);
        assert!(!reply.last);
        assert_eq!(reply.text, "SIZE 35882577");
    }
}
