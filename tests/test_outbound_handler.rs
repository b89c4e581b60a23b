mod common;
use common::*;

use std::sync::Arc;

use chrono::TimeZone;

use sems_mitm_exporter::crc::{self, ByteOrder};
use sems_mitm_exporter::error::Error;
use sems_mitm_exporter::metrics::{self, Recorder};
use sems_mitm_exporter::sems::batsignal::{FixedClock, SystemClock};
use sems_mitm_exporter::sems::outbound::OutboundHandler;
use sems_mitm_exporter::sems::packet::{
    build_frame, MeterMetricsPacket, PacketType, OUTBOUND_PREFIX,
};
use sems_mitm_exporter::sems::PacketHandler;
use sems_mitm_exporter::timestamp::china_standard_time;

fn handler(batsignal: bool, telemetry: Arc<Recorder>) -> OutboundHandler {
    let noon = china_standard_time()
        .with_ymd_and_hms(2023, 11, 26, 12, 0, 0)
        .unwrap();
    OutboundHandler::new("test/outbound".into(), batsignal, telemetry, Arc::new(FixedClock(noon)))
}

#[test]
fn meter_metrics_are_observed_and_forwarded_unchanged() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(false, recorder.clone());

    let rewrite = handler
        .handle_packet(&METER_METRICS_FRAME)
        .expect("captured frame handles cleanly");
    assert_eq!(rewrite, None);

    assert_eq!(
        recorder.gauge_value(metrics::POWER_GENERATION_WATTS),
        Some(2601.0)
    );
    assert_eq!(
        recorder.gauge_value(metrics::POWER_EXPORT_WATTS),
        Some(1557.0)
    );
    assert_eq!(
        recorder.gauge_value(metrics::ENERGY_IMPORT_TOTAL),
        Some(80155.0)
    );
    let gauges = recorder.gauges.lock().unwrap();
    let (_, labels, _) = &gauges[0];
    assert_eq!(labels.device, "meter");
    assert_eq!(labels.model, "HK1000");
    assert_eq!(labels.serial, "01234567");
}

#[test]
fn batsignal_rewrites_a_valid_same_length_frame() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(true, recorder);

    let rewritten = handler
        .handle_packet(&METER_METRICS_FRAME)
        .expect("captured frame handles cleanly")
        .expect("batsignal mode produces a replacement frame");

    assert_eq!(rewritten.len(), METER_METRICS_FRAME.len());
    crc::validate(&rewritten, ByteOrder::Big).expect("replacement frame re-authenticates");
    // header untouched
    assert_eq!(&rewritten[..12], meter_metrics_header());

    // at noon the curves pin the two power fields
    let packet = MeterMetricsPacket::parse(&rewritten[12..164]).unwrap();
    assert_eq!(packet.metrics.power_generation_watts, 2250);
    assert_eq!(packet.metrics.power_export_watts, -3000);
    // everything else rides along unchanged
    let original = MeterMetricsPacket::parse(meter_metrics_body()).unwrap();
    assert_eq!(packet.envelope, original.envelope);
    assert_eq!(
        packet.metrics.energy_export_decawatt_hours_total,
        original.metrics.energy_export_decawatt_hours_total
    );
}

#[test]
fn unknown_packet_type_is_counted_and_errors() {
    let recorder = Arc::new(Recorder::default());
    let handler = OutboundHandler::new(
        "test/outbound".into(),
        false,
        recorder.clone(),
        Arc::new(SystemClock),
    );

    // envelope + one ciphertext block under an unrecognised tag
    let mut body = vec![0u8; 32];
    body[..8].copy_from_slice(&DEVICE_ID);
    body[8..16].copy_from_slice(&DEVICE_SERIAL);
    body.extend_from_slice(&[0u8; 16]);
    let frame = build_frame(OUTBOUND_PREFIX, PacketType([0x07, 0x07]), &body, ByteOrder::Big);

    let result = handler.handle_packet(&frame);
    assert!(matches!(result, Err(Error::UnknownPacketType([0x07, 0x07]))));
    assert_eq!(
        recorder.counters.lock().unwrap().as_slice(),
        [metrics::OUTBOUND_UNKNOWN_PACKETS_TOTAL.to_string()]
    );
}

#[test]
fn unknown_device_id_is_an_error() {
    let recorder = Arc::new(Recorder::default());
    let handler = handler(false, recorder);

    let mut packet = MeterMetricsPacket::parse(meter_metrics_body()).unwrap();
    packet.envelope.device_id = *b"XXXXXXXX";
    let body = packet.bytes().unwrap();
    let frame = build_frame(
        OUTBOUND_PREFIX,
        PacketType([0x03, 0x04]),
        &body,
        ByteOrder::Big,
    );

    assert!(matches!(
        handler.handle_packet(&frame),
        Err(Error::UnknownDeviceId(_))
    ));
}
