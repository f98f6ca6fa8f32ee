//! Protocol modules.
//!
//! - `frame`: binary envelope codec (4-byte header, optional sequence,
//!   length-prefixed payload).
//! - `payload`: gzip + JSON transcoding of the envelope body.
//! - `event`: classification of decoded server frames.
//! - `request`: the session descriptor sent in the config frame.
//!
//! All parsers are panic-free: malformed input is reported as `FrameError`
//! instead of panicking or indexing raw buffers.

pub mod event;
pub mod frame;
pub mod payload;
pub mod request;
