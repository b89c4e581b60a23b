#![allow(dead_code)]

use sems_mitm_exporter::crc::ByteOrder;
use sems_mitm_exporter::sems::packet::{
    build_frame, Envelope, InboundMetricsAck, InboundMetricsAckPacket, InboundTimeSyncResp,
    InboundTimeSyncRespPacket, PacketType, INBOUND_PREFIX,
};
use sems_mitm_exporter::timestamp::Timestamp;

/// A complete outbound meter metrics frame captured from an HK1000,
/// device ID `91000HKU`, serial rewritten to `01234567`.
pub const METER_METRICS_FRAME: [u8; 166] = [
    // prefix, length, packet type
    0x50, 0x4f, 0x53, 0x54, 0x47, 0x57, 0x00, 0x00, 0x00, 0x99, 0x03, 0x04,
    // envelope
    0x00, 0x00, 0x39, 0x31, 0x30, 0x30, 0x30, 0x48, 0x4b, 0x55, 0x30, 0x31, 0x32, 0x33, 0x34,
    0x35, 0x36, 0x37, 0x17, 0x09, 0x12, 0x09, 0x09, 0x1b, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x17, 0x09, 0x12, 0x09, 0x09, 0x1b,
    // ciphertext
    0xde, 0xde, 0x93, 0x57, 0xfe, 0x05, 0x28, 0x76, 0x42, 0xac, 0x63, 0xcf, 0xdd, 0x7a, 0xae,
    0x6d, 0xca, 0x77, 0x85, 0xca, 0x23, 0x99, 0x4c, 0x72, 0x7d, 0x33, 0x59, 0x81, 0x3b, 0xc8,
    0xf2, 0x37, 0x22, 0x69, 0x71, 0x9d, 0xc8, 0x46, 0x62, 0xa2, 0xc0, 0xef, 0xe7, 0x44, 0xb3,
    0x58, 0x2a, 0x2f, 0xbd, 0x2f, 0x68, 0x4c, 0xe0, 0x98, 0x0b, 0x24, 0xbf, 0x04, 0xc4, 0x4f,
    0xa8, 0x01, 0x81, 0x8c, 0xf6, 0x5f, 0x05, 0x52, 0x73, 0x86, 0x32, 0xaa, 0x16, 0xd2, 0x9f,
    0xfe, 0x0e, 0x52, 0xb3, 0xcc, 0x9f, 0x0a, 0xaf, 0xef, 0x6d, 0x28, 0xce, 0xad, 0x52, 0xe7,
    0x9f, 0x7f, 0x9b, 0xe3, 0x3c, 0xa0, 0x1b, 0x22, 0xc9, 0x59, 0x33, 0x04, 0xf2, 0x39, 0x8d,
    0xd1, 0x20, 0xfc, 0x88, 0xaa, 0x1d, 0x99,
    // CRC, big-endian
    0x4b, 0xcd,
];

pub const DEVICE_ID: [u8; 8] = *b"91000HKU";
pub const DEVICE_SERIAL: [u8; 8] = *b"01234567";

/// Header bytes of [`METER_METRICS_FRAME`].
pub fn meter_metrics_header() -> &'static [u8] {
    &METER_METRICS_FRAME[..12]
}

/// Body bytes of [`METER_METRICS_FRAME`]: envelope plus ciphertext.
pub fn meter_metrics_body() -> &'static [u8] {
    &METER_METRICS_FRAME[12..164]
}

fn test_envelope() -> Envelope {
    Envelope {
        device_id: DEVICE_ID,
        device_serial: DEVICE_SERIAL,
        iv: [0x11; 16],
    }
}

/// Builds an inbound metrics ack/nack frame with the given tag and
/// 16-byte ack payload.
pub fn inbound_ack_frame(tag: [u8; 2], payload: [u8; 16]) -> Vec<u8> {
    let packet = InboundMetricsAckPacket {
        envelope: test_envelope(),
        ack: InboundMetricsAck { data: payload },
    };
    let body = packet.bytes().expect("aligned cleartext encrypts");
    build_frame(INBOUND_PREFIX, PacketType(tag), &body, ByteOrder::Little)
}

/// Builds an inbound time-sync response frame carrying the given
/// wire timestamp.
pub fn inbound_time_sync_resp_frame(tag: [u8; 2], timestamp: [u8; 6]) -> Vec<u8> {
    let packet = InboundTimeSyncRespPacket {
        envelope: test_envelope(),
        time_sync_resp: InboundTimeSyncResp {
            packet_type: [0x00, 0x01, 0x16, 0x00],
            timestamp: Timestamp(timestamp),
            unknown_bytes: [0; 6],
        },
    };
    let body = packet.bytes().expect("aligned cleartext encrypts");
    build_frame(INBOUND_PREFIX, PacketType(tag), &body, ByteOrder::Little)
}
