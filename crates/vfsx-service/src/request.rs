// request.rs — Decoding request frames and encoding response frames.
//
// The inverse of the bridge's encoder. A request frame carries
//
//   operation:user:origin[:target[,arg...]]
//
// followed by a NUL and zero fill. The fourth field is split on commas: the
// first element is the target path, the rest are the auxiliary arguments,
// kept as text because their meaning depends on the operation.

use vfsx_bridge::protocol::RESPONSE_FRAME_SIZE;
use vfsx_bridge::Operation;

use crate::error::ServiceError;

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub user: String,
    pub origin: String,
    /// `None` for session-level operations such as connect/disconnect.
    pub target: Option<String>,
    pub args: Vec<String>,
}

impl Request {
    /// Session key: requests from the same user on the same share.
    pub fn session_key(&self) -> (String, String) {
        (self.origin.clone(), self.user.clone())
    }
}

/// Decode one request frame (or a bare message without the padding).
pub fn decode_request(frame: &[u8]) -> Result<Request, ServiceError> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
    let text = std::str::from_utf8(&frame[..end]).map_err(|e| ServiceError::Malformed {
        reason: format!("not UTF-8: {}", e),
    })?;

    // At most four fields: paths in the fourth field may themselves contain ':'.
    let mut fields = text.splitn(4, ':');
    let operation = fields.next().unwrap_or_default();
    let (Some(user), Some(origin)) = (fields.next(), fields.next()) else {
        return Err(ServiceError::Malformed {
            reason: format!("expected at least 3 ':'-separated fields in {:?}", text),
        });
    };
    if operation.is_empty() {
        return Err(ServiceError::Malformed {
            reason: "empty operation".to_string(),
        });
    }

    let (target, args) = match fields.next() {
        Some(rest) => {
            let mut parts = rest.split(',');
            let target = parts.next().filter(|t| !t.is_empty()).map(str::to_string);
            (target, parts.map(str::to_string).collect())
        }
        None => (None, Vec::new()),
    };

    Ok(Request {
        operation: Operation::parse(operation),
        user: user.to_string(),
        origin: origin.to_string(),
        target,
        args,
    })
}

/// Render a response code as a space-padded 3-byte frame.
pub fn encode_response(code: i32) -> Result<[u8; RESPONSE_FRAME_SIZE], ServiceError> {
    let text = format!("{:<width$}", code, width = RESPONSE_FRAME_SIZE);
    if text.len() > RESPONSE_FRAME_SIZE {
        return Err(ServiceError::CodeOutOfRange { code });
    }
    let mut frame = [0u8; RESPONSE_FRAME_SIZE];
    frame.copy_from_slice(text.as_bytes());
    Ok(frame)
}
