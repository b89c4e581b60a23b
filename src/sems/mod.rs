//! The intercepted SEMS portal protocol: framing, packet layouts, and
//! per-direction handlers.

pub mod batsignal;
pub mod frame;
pub mod inbound;
pub mod outbound;
pub mod packet;

use crate::error::Result;

/// Implemented by both direction handlers. Takes a whole frame; returns
/// replacement frame bytes when the packet was rewritten, None to forward
/// the original. CPU-only: implementations must not block.
pub trait PacketHandler: Send + Sync {
    fn handle_packet(&self, data: &[u8]) -> Result<Option<Vec<u8>>>;
}
