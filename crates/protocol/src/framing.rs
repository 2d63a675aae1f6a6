/// Maximum byte length of one length-delimited frame.
///
/// The default `tokio_util::codec::LengthDelimitedCodec` limit is too small
/// for responses that carry a full log window, which would surface on the
/// console as a frame decode error mid-session.
///
/// Both sides of the control channel must use the same limit.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;
