//! Multiplexing session core
//!
//! One encrypted transport connection carries many logical channels,
//! each identified by a 16-bit id. This module implements the framing
//! codec, the per-channel state machine with flow control, and the
//! session dispatcher that routes frames between the transport and the
//! channels.

mod channel;
mod flow;
pub mod frame;
mod session;

pub use flow::FlowControl;
pub use frame::{Frame, FrameCodec, FrameType};
pub use session::{MuxConfig, MuxSession};
