//! Framed reading of one direction of the intercepted stream.
//!
//! The decoder is non-destructive on partial input: a prefix is never
//! consumed until the declared length (and then the whole frame) is
//! buffered. Corrupt input resynchronises by skipping to the next
//! occurrence of the first prefix byte.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::Error;
use crate::sems::packet::{INBOUND_PREFIX, KEEPALIVE, OUTBOUND_PREFIX};

/// One item recovered from the byte stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FrameEvent {
    /// A complete frame: prefix, length, packet type, body, CRC.
    Frame(Bytes),
    /// The two-byte inbound keepalive. Forwarded unmodified.
    Keepalive,
    /// Unrecognised bytes were discarded up to the next plausible frame
    /// start; carries the discard count for logging.
    ResyncSkipped(usize),
}

pub struct FrameDecoder {
    prefix: &'static [u8],
    keepalive: bool,
}

impl FrameDecoder {
    /// Decoder for the device-to-portal direction.
    pub fn outbound() -> Self {
        Self {
            prefix: OUTBOUND_PREFIX,
            keepalive: false,
        }
    }

    /// Decoder for the portal-to-device direction. Only this direction
    /// carries keepalives.
    pub fn inbound() -> Self {
        Self {
            prefix: INBOUND_PREFIX,
            keepalive: true,
        }
    }

    pub fn prefix(&self) -> &'static [u8] {
        self.prefix
    }
}

impl Decoder for FrameDecoder {
    type Item = FrameEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameEvent>, Error> {
        if src.len() < self.prefix.len() {
            return Ok(None);
        }
        if self.keepalive && src[..KEEPALIVE.len()] == KEEPALIVE {
            src.advance(KEEPALIVE.len());
            return Ok(Some(FrameEvent::Keepalive));
        }
        if src.starts_with(self.prefix) {
            let header_len = self.prefix.len() + 4;
            if src.len() < header_len {
                return Ok(None);
            }
            let declared = u32::from_be_bytes([
                src[self.prefix.len()],
                src[self.prefix.len() + 1],
                src[self.prefix.len() + 2],
                src[self.prefix.len() + 3],
            ]) as usize;
            // header, packet type, CRC, declared length, and the
            // off-by-one in the length field
            let total = header_len + 2 + declared + 1;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }
            return Ok(Some(FrameEvent::Frame(src.split_to(total).freeze())));
        }
        // neither keepalive nor prefix: skip forward to the next occurrence
        // of the first prefix byte so the stream can recover
        let skip = match src[1..].iter().position(|b| *b == self.prefix[0]) {
            Some(i) => i + 1,
            None => src.len(),
        };
        src.advance(skip);
        Ok(Some(FrameEvent::ResyncSkipped(skip)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::ByteOrder;
    use crate::sems::packet::{build_frame, PacketType};

    fn drain(decoder: &mut FrameDecoder, buf: &mut BytesMut) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        while let Some(event) = decoder.decode(buf).unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn partial_header_is_not_consumed() {
        let mut decoder = FrameDecoder::outbound();
        let mut buf = BytesMut::from(&b"POSTGW\x00\x00"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn keepalive_is_inbound_only() {
        let mut inbound = FrameDecoder::inbound();
        let mut buf = BytesMut::from(&[0x01u8, 0x02][..]);
        assert_eq!(
            inbound.decode(&mut buf).unwrap(),
            Some(FrameEvent::Keepalive)
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn resync_makes_progress_on_false_prefix_byte() {
        let mut decoder = FrameDecoder::inbound();
        // starts with 'G' but is not "GW": must not loop forever
        let mut buf = BytesMut::from(&b"GXGW"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(FrameEvent::ResyncSkipped(2))
        );
        assert_eq!(&buf[..], b"GW");
    }

    #[test]
    fn two_frames_no_residue() {
        let mut decoder = FrameDecoder::inbound();
        let frame = build_frame(
            INBOUND_PREFIX,
            PacketType([0x01, 0x16]),
            &[0u8; 48],
            ByteOrder::Little,
        );
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame);
        buf.extend_from_slice(&frame);
        let events = drain(&mut decoder, &mut buf);
        assert_eq!(
            events,
            vec![
                FrameEvent::Frame(Bytes::from(frame.clone())),
                FrameEvent::Frame(Bytes::from(frame)),
            ]
        );
        assert!(buf.is_empty());
    }
}
