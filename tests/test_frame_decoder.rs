mod common;
use common::*;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use sems_mitm_exporter::sems::frame::{FrameDecoder, FrameEvent};

fn drain(decoder: &mut FrameDecoder, buf: &mut BytesMut) -> Vec<FrameEvent> {
    let mut events = Vec::new();
    while let Some(event) = decoder.decode(buf).expect("decoder is infallible") {
        events.push(event);
    }
    events
}

#[test]
fn two_frames_in_order_with_no_residue() {
    let mut decoder = FrameDecoder::outbound();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&METER_METRICS_FRAME);
    buf.extend_from_slice(&METER_METRICS_FRAME);

    let events = drain(&mut decoder, &mut buf);
    assert_eq!(
        events,
        vec![
            FrameEvent::Frame(Bytes::copy_from_slice(&METER_METRICS_FRAME)),
            FrameEvent::Frame(Bytes::copy_from_slice(&METER_METRICS_FRAME)),
        ]
    );
    assert!(buf.is_empty());
}

#[test]
fn junk_before_a_frame_is_counted_and_skipped() {
    let junk = b"telemetry";
    let mut decoder = FrameDecoder::outbound();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(junk);
    buf.extend_from_slice(&METER_METRICS_FRAME);

    let events = drain(&mut decoder, &mut buf);
    assert_eq!(
        events,
        vec![
            FrameEvent::ResyncSkipped(junk.len()),
            FrameEvent::Frame(Bytes::copy_from_slice(&METER_METRICS_FRAME)),
        ]
    );
    assert!(buf.is_empty());
}

#[test]
fn keepalive_then_frame() {
    let frame = inbound_ack_frame([0x03, 0x04], [0; 16]);
    let mut decoder = FrameDecoder::inbound();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x01, 0x02]);
    buf.extend_from_slice(&frame);

    let events = drain(&mut decoder, &mut buf);
    assert_eq!(
        events,
        vec![
            FrameEvent::Keepalive,
            FrameEvent::Frame(Bytes::from(frame)),
        ]
    );
    assert!(buf.is_empty());
}

#[test]
fn split_frame_across_reads_is_reassembled() {
    let mut decoder = FrameDecoder::outbound();
    let mut buf = BytesMut::new();
    // feed the frame a few bytes at a time; nothing may be consumed until
    // the whole frame is buffered
    for chunk in METER_METRICS_FRAME.chunks(7) {
        let before = buf.len();
        buf.extend_from_slice(chunk);
        if buf.len() < METER_METRICS_FRAME.len() {
            assert_eq!(decoder.decode(&mut buf).unwrap(), None);
            assert_eq!(buf.len(), before + chunk.len());
        }
    }
    assert_eq!(
        decoder.decode(&mut buf).unwrap(),
        Some(FrameEvent::Frame(Bytes::copy_from_slice(
            &METER_METRICS_FRAME
        )))
    );
    assert!(buf.is_empty());
}
