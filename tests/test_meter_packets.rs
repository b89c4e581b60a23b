mod common;
use common::*;

use sems_mitm_exporter::crc::ByteOrder;
use sems_mitm_exporter::sems::outbound::METER_METRICS_0;
use sems_mitm_exporter::sems::packet::{split_frame, MeterMetricsPacket, OUTBOUND_PREFIX};
use sems_mitm_exporter::timestamp::Timestamp;

#[test]
fn split_validates_crc_and_length() {
    let (header, body) = split_frame(OUTBOUND_PREFIX, ByteOrder::Big, &METER_METRICS_FRAME)
        .expect("captured frame is valid");
    assert_eq!(header.length, 0x99);
    assert_eq!(header.packet_type, METER_METRICS_0);
    assert_eq!(body, meter_metrics_body());
}

#[test]
fn corrupt_crc_is_rejected() {
    let mut frame = METER_METRICS_FRAME;
    frame[165] ^= 0xff;
    assert!(split_frame(OUTBOUND_PREFIX, ByteOrder::Big, &frame).is_err());
}

#[test]
fn unmarshals_captured_metrics() {
    let packet = MeterMetricsPacket::parse(meter_metrics_body()).expect("valid body");

    assert_eq!(packet.envelope.device_id, DEVICE_ID);
    assert_eq!(packet.envelope.device_serial, DEVICE_SERIAL);
    assert_eq!(
        packet.envelope.timestamp,
        Timestamp([0x17, 0x09, 0x12, 0x09, 0x09, 0x1b])
    );
    assert_eq!(
        packet.envelope.iv[..6],
        [0x17, 0x09, 0x12, 0x09, 0x09, 0x1b]
    );

    let m = &packet.metrics;
    assert_eq!(m.packet_type, [0x04, 0x08, 0x00, 0x08, 0x17, 0x00, 0x00]);
    assert_eq!(m.energy_export_decawatt_hours_total, 27078);
    assert_eq!(m.energy_generation_decawatt_hours_total, 57941);
    assert_eq!(
        m.sum_of_energy_generation_and_export_decawatt_hours_total,
        78340
    );
    assert_eq!(m.energy_import_decawatt_hours_total, 80155);
    assert_eq!(
        m.sum_of_energy_import_less_generation_decawatt_hours_total,
        7948
    );
    assert_eq!(m.unknown_int_5, 137365568);
    assert_eq!(m.unknown_int_6, 2438);
    assert_eq!(m.unknown_int_7, 2440);
    assert_eq!(m.unknown_int_9, 660);
    assert_eq!(m.unknown_int_10, 1092);
    assert_eq!(m.power_export_watts, 1557);
    assert_eq!(m.power_generation_watts, 2601);
    assert_eq!(m.sum_of_power_generation_and_export_watts, 4159);
}

#[test]
fn marshal_reproduces_captured_bytes() {
    let packet = MeterMetricsPacket::parse(meter_metrics_body()).expect("valid body");
    let bytes = packet.bytes().expect("aligned cleartext encrypts");
    assert_eq!(bytes, meter_metrics_body());
}
