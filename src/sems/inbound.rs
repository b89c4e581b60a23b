//! Handler for the portal-to-device direction. Never rewrites.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::crc::ByteOrder;
use crate::devices;
use crate::error::{Error, Result};
use crate::metrics::{self, Labels, Telemetry};
use crate::sems::packet::{
    split_frame, Envelope, InboundMetricsAckPacket, InboundTimeSyncRespPacket, PacketType,
    INBOUND_PREFIX, METRICS_ACK_DATA, METRICS_NACK_DATA,
};
use crate::sems::PacketHandler;

/// CRC byte order of this direction. Yes, it differs from outbound.
pub const CRC_BYTE_ORDER: ByteOrder = ByteOrder::Little;

// HK1000 smart meter inbound packet types. The portal acks metrics with
// the same tag the device sent them under; 03 03 is included since one
// firmware revision acks through it as well.
pub const METER_METRICS_ACK_0: PacketType = PacketType([0x03, 0x04]);
pub const METER_METRICS_ACK_1: PacketType = PacketType([0x03, 0x45]);
pub const METER_METRICS_ACK_2: PacketType = PacketType([0x03, 0x03]);
pub const METER_TIME_SYNC_RESP: PacketType = PacketType([0x01, 0x16]);
// DNS G3 inverter inbound packet types. 01 03 means time-sync *response*
// in this direction; the same tag outbound is the time-sync request.
pub const INVERTER_METRICS_ACK_0: PacketType = PacketType([0x01, 0x04]);
pub const INVERTER_METRICS_ACK_1: PacketType = PacketType([0x01, 0x45]);
pub const INVERTER_TIME_SYNC_RESP: PacketType = PacketType([0x01, 0x03]);

pub struct InboundHandler {
    tag: String,
    telemetry: Arc<dyn Telemetry>,
}

impl InboundHandler {
    pub fn new(tag: String, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { tag, telemetry }
    }

    fn handle_metrics_ack(&self, body: &[u8]) -> Result<()> {
        let packet = InboundMetricsAckPacket::parse(body)?;
        let device = devices::lookup(&packet.envelope.device_id)?;
        let labels = Labels {
            device: device.kind.as_str().to_string(),
            model: device.model.to_string(),
            serial: String::from_utf8_lossy(&packet.envelope.device_serial).into_owned(),
        };
        match packet.ack.data {
            METRICS_ACK_DATA => debug!(
                "{}: metrics ack device={} model={} serial={}",
                self.tag, labels.device, labels.model, labels.serial,
            ),
            METRICS_NACK_DATA => warn!(
                "{}: metrics nack. bad metrics CRC? device={} model={} serial={}",
                self.tag, labels.device, labels.model, labels.serial,
            ),
            other => warn!(
                "{}: unknown cleartext in metrics ack {:02x?} device={} model={} serial={}",
                self.tag, other, labels.device, labels.model, labels.serial,
            ),
        }
        Ok(())
    }

    fn handle_time_sync_resp(&self, body: &[u8]) -> Result<()> {
        let packet = InboundTimeSyncRespPacket::parse(body)?;
        debug!(
            "{}: time sync response timestamp={}",
            self.tag, packet.time_sync_resp.timestamp,
        );
        Ok(())
    }

    /// Decrypts and logs the cleartext of an unrecognised inbound packet.
    fn handle_unknown(&self, body: &[u8]) -> Result<()> {
        info!("{}: unknown packet body {:02x?}", self.tag, body);
        self.telemetry.inc(metrics::INBOUND_UNKNOWN_PACKETS_TOTAL);
        let (envelope, ciphertext) = Envelope::split(body)?;
        let cleartext = crate::crypto::decrypt(&envelope.iv, ciphertext)?;
        info!("{}: unknown packet cleartext {:02x?}", self.tag, cleartext);
        Ok(())
    }
}

impl PacketHandler for InboundHandler {
    fn handle_packet(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let (header, body) = split_frame(INBOUND_PREFIX, CRC_BYTE_ORDER, data)?;
        match header.packet_type {
            METER_METRICS_ACK_0 | METER_METRICS_ACK_1 | METER_METRICS_ACK_2
            | INVERTER_METRICS_ACK_0 | INVERTER_METRICS_ACK_1 => {
                self.handle_metrics_ack(body)?;
                Ok(None)
            }
            METER_TIME_SYNC_RESP | INVERTER_TIME_SYNC_RESP => {
                self.handle_time_sync_resp(body)?;
                Ok(None)
            }
            unknown => {
                if let Err(err) = self.handle_unknown(body) {
                    warn!("{}: couldn't decode unknown packet: {err}", self.tag);
                }
                Err(Error::UnknownPacketType(unknown.0))
            }
        }
    }
}
