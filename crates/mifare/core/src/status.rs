//! Status codes returned by every card operation

use derive_more::Display;
use tracing::Level;

/// Outcome of a protocol operation between the reader and the card
///
/// Any value other than [`StatusCode::Ok`] is a failure. Payloads returned
/// alongside a failing status must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StatusCode {
    /// Success
    #[display("Ok")]
    Ok,
    /// Error in communication
    #[display("Error")]
    Error,
    /// Collision detected
    #[display("Collision")]
    Collision,
    /// Timeout in communication
    #[display("Timeout")]
    Timeout,
    /// A buffer is not big enough
    #[display("NoRoom")]
    NoRoom,
    /// Internal error in the code
    #[display("InternalError")]
    InternalError,
    /// Invalid argument
    #[display("Invalid")]
    Invalid,
    /// The CRC_A does not match
    #[display("CrcWrong")]
    CrcWrong,
    /// A MIFARE PICC responded with NAK
    #[display("MifareNack")]
    MifareNack,
}

impl StatusCode {
    /// Every status code, in wire-code order
    pub const ALL: [Self; 9] = [
        Self::Ok,
        Self::Error,
        Self::Collision,
        Self::Timeout,
        Self::NoRoom,
        Self::InternalError,
        Self::Invalid,
        Self::CrcWrong,
        Self::MifareNack,
    ];

    /// Check if this status indicates success
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Stable name of the status
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Error => "Error",
            Self::Collision => "Collision",
            Self::Timeout => "Timeout",
            Self::NoRoom => "NoRoom",
            Self::InternalError => "InternalError",
            Self::Invalid => "Invalid",
            Self::CrcWrong => "CrcWrong",
            Self::MifareNack => "MifareNack",
        }
    }

    /// Get a description of this status
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ok => "Success.",
            Self::Error => "Error in communication.",
            Self::Collision => "Collision detected.",
            Self::Timeout => "Timeout in communication.",
            Self::NoRoom => "A buffer is not big enough.",
            Self::InternalError => "Internal error in the code. Should not happen.",
            Self::Invalid => "Invalid argument.",
            Self::CrcWrong => "The CRC_A does not match.",
            Self::MifareNack => "A MIFARE PICC responded with NAK.",
        }
    }

    /// Numeric code used by MFRC522 style drivers
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::Collision => 2,
            Self::Timeout => 3,
            Self::NoRoom => 4,
            Self::InternalError => 5,
            Self::Invalid => 6,
            Self::CrcWrong => 7,
            Self::MifareNack => 0xFF,
        }
    }

    /// Parse a numeric driver code
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Collision),
            3 => Some(Self::Timeout),
            4 => Some(Self::NoRoom),
            5 => Some(Self::InternalError),
            6 => Some(Self::Invalid),
            7 => Some(Self::CrcWrong),
            0xFF => Some(Self::MifareNack),
            _ => None,
        }
    }

    /// Get the appropriate tracing level for this status
    pub const fn tracing_level(self) -> Level {
        match self {
            Self::Ok => Level::DEBUG,
            // Card left the field or two cards answered; the poll loop retries
            Self::Timeout | Self::Collision => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Emit a tracing event for the outcome of `operation` at this status' level
    pub fn trace(self, operation: &'static str) {
        let status = self.name();
        let level = self.tracing_level();
        if level == Level::DEBUG {
            tracing::debug!(operation, status, "Operation succeeded");
        } else if level == Level::INFO {
            tracing::info!(operation, status, "Operation did not complete");
        } else {
            tracing::warn!(
                operation,
                status,
                description = self.description(),
                "Operation failed"
            );
        }
    }
}

/// Look up the display name of a status code
pub const fn status_name(status: StatusCode) -> &'static str {
    status.name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ok_is_success() {
        for status in StatusCode::ALL {
            assert_eq!(status.is_ok(), status == StatusCode::Ok);
        }
    }

    #[test]
    fn test_names_are_stable() {
        let names: Vec<_> = StatusCode::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "Ok",
                "Error",
                "Collision",
                "Timeout",
                "NoRoom",
                "InternalError",
                "Invalid",
                "CrcWrong",
                "MifareNack"
            ]
        );
        assert_eq!(status_name(StatusCode::MifareNack), "MifareNack");
        assert_eq!(StatusCode::CrcWrong.to_string(), "CrcWrong");
    }

    #[test]
    fn test_codes_round_trip() {
        for status in StatusCode::ALL {
            assert_eq!(StatusCode::from_code(status.code()), Some(status));
        }
        assert_eq!(StatusCode::from_code(0x42), None);
    }

    #[test]
    fn test_tracing_levels() {
        assert_eq!(StatusCode::Ok.tracing_level(), Level::DEBUG);
        assert_eq!(StatusCode::Timeout.tracing_level(), Level::INFO);
        assert_eq!(StatusCode::MifareNack.tracing_level(), Level::WARN);
        for status in StatusCode::ALL {
            status.trace("test");
        }
    }

    #[test]
    fn test_display_matches_name() {
        for status in StatusCode::ALL {
            assert_eq!(status.to_string(), status.name());
        }
    }
}
