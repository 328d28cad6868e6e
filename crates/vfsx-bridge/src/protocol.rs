// protocol.rs — Wire constants shared by the bridge and the decision service.
//
// Framing is by fixed capacity, not by delimiter or length prefix: every
// request is exactly REQUEST_FRAME_SIZE bytes and every response exactly
// RESPONSE_FRAME_SIZE bytes.

/// Size of one request frame: message text, a NUL terminator, zero fill.
pub const REQUEST_FRAME_SIZE: usize = 512;

/// Longest message text that still leaves room for the NUL terminator.
pub const MAX_MESSAGE_LEN: usize = REQUEST_FRAME_SIZE - 1;

/// Size of one response frame: ASCII text of a small signed integer.
pub const RESPONSE_FRAME_SIZE: usize = 3;

/// Default rendezvous path of the decision service.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/vfsx-socket";

/// The operation may proceed.
pub const SUCCESS_TRANSPARENT: i32 = 0;

/// General failure. The operation must not proceed.
pub const FAIL_ERROR: i32 = -1;

/// The user is not authorized. The operation must not proceed.
pub const FAIL_AUTHORIZATION: i32 = -2;

/// The service has no handler for the operation. Treated as an error.
pub const FAIL_NOT_IMPLEMENTED: i32 = -3;
