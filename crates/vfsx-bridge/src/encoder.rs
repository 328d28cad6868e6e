// encoder.rs — Message Encoder.
//
// Renders an OperationDescriptor as
//
//   <operation>:<user>:<origin>[:<target>[,<arg>...]]
//
// and checks that the text plus its NUL terminator fits one request frame.
// Oversized messages are rejected, never truncated: a cut-off rename would
// silently lose its destination path.

use std::fmt::Write as _;

use crate::error::BridgeError;
use crate::operation::OperationDescriptor;
use crate::protocol::{MAX_MESSAGE_LEN, REQUEST_FRAME_SIZE};

/// An encoded request, guaranteed to fit one request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    text: String,
}

impl WireMessage {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The fixed-size request frame: message bytes, NUL, zero fill.
    pub fn to_frame(&self) -> [u8; REQUEST_FRAME_SIZE] {
        // Zero-initialised, so the terminator and padding come for free.
        let mut frame = [0u8; REQUEST_FRAME_SIZE];
        frame[..self.text.len()].copy_from_slice(self.text.as_bytes());
        frame
    }
}

impl std::fmt::Display for WireMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Encode a descriptor into its wire message.
///
/// The caller must keep `:` and `,` out of the operation, user, and origin
/// fields; they are not escaped. NUL bytes anywhere are rejected.
pub fn encode(descriptor: &OperationDescriptor) -> Result<WireMessage, BridgeError> {
    let mut text = String::with_capacity(REQUEST_FRAME_SIZE);
    text.push_str(descriptor.operation().as_str());
    text.push(':');
    text.push_str(descriptor.user());
    text.push(':');
    text.push_str(descriptor.origin());

    let args = descriptor.args();
    if descriptor.target().is_some() || !args.is_empty() {
        text.push(':');
        text.push_str(descriptor.target().unwrap_or(""));
        for arg in args {
            // Writing into a String cannot fail.
            let _ = write!(text, ",{}", arg);
        }
    }

    if text.as_bytes().contains(&0) {
        return Err(BridgeError::EmbeddedNul);
    }
    if text.len() > MAX_MESSAGE_LEN {
        return Err(BridgeError::MessageTooLarge {
            len: text.len(),
            capacity: MAX_MESSAGE_LEN,
        });
    }

    Ok(WireMessage { text })
}
