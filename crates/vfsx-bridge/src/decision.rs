// decision.rs — Decision Interpreter.
//
// The decision service answers with the ASCII text of a small signed
// integer. Only two codes mean anything specific: 0 (proceed) and -2
// (denied). Every other code, and anything that does not parse, blocks the
// operation as an error.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::protocol::{FAIL_AUTHORIZATION, SUCCESS_TRANSPARENT};

/// The bridge's verdict on one gated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The caller may perform the real operation.
    Proceed,
    /// The service refused the operation for this user.
    Denied,
    /// No usable answer was obtained. The operation must not proceed.
    Error,
}

impl Decision {
    /// Translate into what the interception layer returns for the real call.
    ///
    /// `Denied` becomes a permission error (EPERM), `Error` a generic I/O
    /// error (EIO).
    pub fn into_io_result(self) -> io::Result<()> {
        match self {
            Decision::Proceed => Ok(()),
            Decision::Denied => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "operation denied by decision service",
            )),
            Decision::Error => Err(io::Error::new(
                io::ErrorKind::Other,
                "decision service unavailable or returned an error",
            )),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Decision::Proceed => "proceed",
            Decision::Denied => "denied",
            Decision::Error => "error",
        };
        f.write_str(label)
    }
}

/// Map a response code to a decision.
pub fn interpret(code: i32) -> Decision {
    match code {
        SUCCESS_TRANSPARENT => Decision::Proceed,
        FAIL_AUTHORIZATION => Decision::Denied,
        _ => Decision::Error,
    }
}

/// Parse a response frame as a signed decimal integer.
///
/// The frame is read up to the first NUL and trimmed of ASCII whitespace, so
/// `"0"`, `"0  "` and `"0\0\0"` all parse as 0. Anything else that is not a
/// plain integer is a protocol error.
pub fn parse_response(frame: &[u8]) -> Result<i32, BridgeError> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
    std::str::from_utf8(&frame[..end])
        .ok()
        .map(str::trim)
        .and_then(|text| text.parse::<i32>().ok())
        .ok_or_else(|| BridgeError::Protocol { raw: frame.to_vec() })
}

/// Parse and interpret in one step; unparseable frames are `Error`.
pub fn interpret_frame(frame: &[u8]) -> Decision {
    parse_response(frame).map(interpret).unwrap_or(Decision::Error)
}
