mod common;
use common::*;

use std::sync::Arc;

use sems_mitm_exporter::error::Error;
use sems_mitm_exporter::metrics::{self, Recorder};
use sems_mitm_exporter::sems::inbound::InboundHandler;
use sems_mitm_exporter::sems::PacketHandler;

fn handler(telemetry: Arc<Recorder>) -> InboundHandler {
    InboundHandler::new("test/inbound".into(), telemetry)
}

#[test]
fn metrics_ack_never_rewrites() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(recorder);
    // the portal acks under every meter tag, including 03 03
    for tag in [[0x03, 0x04], [0x03, 0x45], [0x03, 0x03], [0x01, 0x04], [0x01, 0x45]] {
        let frame = inbound_ack_frame(tag, [0; 16]);
        assert_eq!(handler.handle_packet(&frame).expect("ack handles cleanly"), None);
    }
}

#[test]
fn metrics_nack_handles_cleanly() {
    let mut nack = [0u8; 16];
    nack[0] = 0x02;
    let recorder = Arc::new(Recorder::default());
    let handler = handler(recorder);
    let frame = inbound_ack_frame([0x03, 0x04], nack);
    assert_eq!(handler.handle_packet(&frame).unwrap(), None);
}

#[test]
fn time_sync_response_handles_cleanly() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(recorder);
    // same shape under the meter and inverter response tags; note 01 03
    // means time-sync *response* in this direction
    for tag in [[0x01, 0x16], [0x01, 0x03]] {
        let frame = inbound_time_sync_resp_frame(tag, [0x17, 0x0b, 0x1a, 0x16, 0x04, 0x21]);
        assert_eq!(handler.handle_packet(&frame).unwrap(), None);
    }
}

#[test]
fn unknown_packet_type_is_counted_and_errors() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(recorder.clone());
    let frame = inbound_ack_frame([0x09, 0x09], [0; 16]);
    assert!(matches!(
        handler.handle_packet(&frame),
        Err(Error::UnknownPacketType([0x09, 0x09]))
    ));
    assert_eq!(
        recorder.counters.lock().unwrap().as_slice(),
        [metrics::INBOUND_UNKNOWN_PACKETS_TOTAL.to_string()]
    );
}

#[test]
fn truncated_body_is_rejected() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(recorder);
    let mut frame = inbound_ack_frame([0x03, 0x04], [0; 16]);
    // shorten the body without fixing up the declared length
    frame.truncate(frame.len() - 4);
    sems_mitm_exporter::crc::append(&mut frame, sems_mitm_exporter::crc::ByteOrder::Little);
    assert!(matches!(
        handler.handle_packet(&frame),
        Err(Error::BadLength { .. })
    ));
}
