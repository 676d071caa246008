//! SOCKS5 protocol support
//!
//! Pure, incremental parsing and reply building for the subset of
//! RFC 1928 the proxy speaks: NO_AUTH method selection and the CONNECT
//! command with IPv4, domain, and IPv6 address types. The parsers
//! operate on byte slices because the handshake arrives in arbitrary
//! pieces on CHANNEL_REQUEST frames rather than on a socket.

mod addr;
mod consts;
mod parser;
mod reply;

pub use addr::{ConnectRequest, TargetAddr};
pub use consts::*;
pub use parser::{parse_connect_request, parse_method_request};
pub use reply::{build_connect_reply, build_method_response};
