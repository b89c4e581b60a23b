//! Handler for the device-to-portal direction.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::crc::{self, ByteOrder};
use crate::devices;
use crate::error::{Error, Result};
use crate::metrics::{self, Labels, Telemetry};
use crate::sems::batsignal::{self, Clock};
use crate::sems::packet::{
    split_frame, Envelope, Header, InverterMetrics0Packet, InverterMetrics1Packet,
    InverterTimeSyncPacket, MeterMetricsPacket, MeterTimeSyncPacket, PacketType,
    TimeSyncRespAckPacket, OUTBOUND_PREFIX,
};
use crate::sems::PacketHandler;

/// CRC byte order of this direction. Yes, it differs from inbound.
pub const CRC_BYTE_ORDER: ByteOrder = ByteOrder::Big;

// HK1000 smart meter outbound packet types
pub const METER_TIME_SYNC: PacketType = PacketType([0x03, 0x03]);
pub const METER_METRICS_0: PacketType = PacketType([0x03, 0x04]);
/// Possibly stale/cached metrics the device could not deliver earlier,
/// e.g. after network problems.
pub const METER_METRICS_1: PacketType = PacketType([0x03, 0x45]);
pub const METER_TIME_SYNC_RESP_ACK: PacketType = PacketType([0x03, 0x10]);
// DNS G3 inverter outbound packet types
pub const INVERTER_TIME_SYNC: PacketType = PacketType([0x01, 0x03]);
pub const INVERTER_METRICS_0: PacketType = PacketType([0x01, 0x04]);
pub const INVERTER_METRICS_1: PacketType = PacketType([0x01, 0x45]);
pub const INVERTER_TIME_SYNC_RESP_ACK: PacketType = PacketType([0x01, 0x10]);

fn device_labels(device_id: &[u8; 8], device_serial: &[u8; 8]) -> Result<Labels> {
    let device = devices::lookup(device_id)?;
    Ok(Labels {
        device: device.kind.as_str().to_string(),
        model: device.model.to_string(),
        serial: String::from_utf8_lossy(device_serial).into_owned(),
    })
}

pub struct OutboundHandler {
    tag: String,
    batsignal: bool,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
}

impl OutboundHandler {
    pub fn new(
        tag: String,
        batsignal: bool,
        telemetry: Arc<dyn Telemetry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tag,
            batsignal,
            telemetry,
            clock,
        }
    }

    fn handle_meter_time_sync(&self, body: &[u8]) -> Result<()> {
        let packet = MeterTimeSyncPacket::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: meter time sync device={} model={} serial={} addr={} version={}",
            self.tag,
            labels.device,
            labels.model,
            labels.serial,
            String::from_utf8_lossy(&packet.time_sync.outbound_addr),
            String::from_utf8_lossy(&packet.time_sync.version),
        );
        Ok(())
    }

    fn handle_meter_metrics(&self, header_data: &[u8], body: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut packet = MeterMetricsPacket::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: meter metrics device={} model={} serial={}",
            self.tag, labels.device, labels.model, labels.serial,
        );
        let m = &packet.metrics;
        self.telemetry.gauge(
            metrics::ENERGY_EXPORT_TOTAL,
            &labels,
            m.energy_export_decawatt_hours_total.into(),
        );
        self.telemetry.gauge(
            metrics::ENERGY_GENERATION_TOTAL,
            &labels,
            m.energy_generation_decawatt_hours_total.into(),
        );
        self.telemetry.gauge(
            metrics::SUM_ENERGY_GENERATION_AND_EXPORT_TOTAL,
            &labels,
            m.sum_of_energy_generation_and_export_decawatt_hours_total
                .into(),
        );
        self.telemetry.gauge(
            metrics::ENERGY_IMPORT_TOTAL,
            &labels,
            m.energy_import_decawatt_hours_total.into(),
        );
        self.telemetry.gauge(
            metrics::SUM_ENERGY_IMPORT_LESS_GENERATION_TOTAL,
            &labels,
            m.sum_of_energy_import_less_generation_decawatt_hours_total
                .into(),
        );
        self.telemetry
            .gauge(metrics::POWER_EXPORT_WATTS, &labels, m.power_export_watts.into());
        self.telemetry.gauge(
            metrics::POWER_GENERATION_WATTS,
            &labels,
            m.power_generation_watts.into(),
        );
        self.telemetry.gauge(
            metrics::SUM_POWER_GENERATION_AND_EXPORT_WATTS,
            &labels,
            m.sum_of_power_generation_and_export_watts.into(),
        );
        for (index, value) in m.unknown_ints() {
            self.telemetry
                .gauge(&metrics::meter_unknown_gauge_name(index), &labels, value);
        }
        if !self.batsignal {
            return Ok(None);
        }
        // mutate the packet to summon batman to the SEMS portal
        let new_body = batsignal::rewrite(self.clock.as_ref(), &mut packet)?;
        let mut frame = Vec::with_capacity(header_data.len() + new_body.len() + 2);
        frame.extend_from_slice(header_data);
        frame.extend_from_slice(&new_body);
        crc::append(&mut frame, CRC_BYTE_ORDER);
        Ok(Some(frame))
    }

    fn handle_time_sync_resp_ack(&self, body: &[u8]) -> Result<()> {
        let packet = TimeSyncRespAckPacket::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: time sync response ack device={} model={} serial={} data={:02x?}",
            self.tag, labels.device, labels.model, labels.serial, packet.ack.data,
        );
        Ok(())
    }

    fn handle_inverter_metrics_0(&self, body: &[u8]) -> Result<()> {
        let packet = InverterMetrics0Packet::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: inverter metrics device={} model={} serial={}",
            self.tag, labels.device, labels.model, labels.serial,
        );
        let m = &packet.metrics;
        self.telemetry.gauge(
            metrics::INVERTER_VOLTAGE_INPUT_DC,
            &labels,
            m.common_0.voltage_input_dc_decivolts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_CURRENT_INPUT_DC,
            &labels,
            m.common_0.current_input_dc_deciamps.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_VOLTAGE_OUTPUT_AC,
            &labels,
            m.common_0.voltage_output_ac_decivolts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_CURRENT_OUTPUT_AC,
            &labels,
            m.common_0.current_output_ac_deciamps.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_FREQUENCY_OUTPUT_AC,
            &labels,
            m.common_0.frequency_output_ac_centihertz.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_POWER_OUTPUT_WATTS,
            &labels,
            m.common_0.power_output_watts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_INTERNAL_TEMPERATURE,
            &labels,
            m.common_1.internal_temperature_decidegrees_celsius.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_ENERGY_OUTPUT_DAY,
            &labels,
            m.common_1.energy_output_hectowatt_hours_today.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_ENERGY_OUTPUT_TOTAL,
            &labels,
            m.common_1.energy_output_hectowatt_hours_total.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_UPTIME_HOURS_TOTAL,
            &labels,
            m.common_1.uptime_hours_total.into(),
        );
        self.telemetry
            .gauge(metrics::INVERTER_RSSI_PERCENT, &labels, m.rssi_percent.into());
        self.telemetry
            .inc_counter(metrics::INVERTER_METRICS_PACKETS_TOTAL, &labels);
        for (index, value) in m.unknown_ints() {
            self.telemetry
                .gauge(&metrics::inverter_unknown_gauge_name(index), &labels, value);
        }
        Ok(())
    }

    fn handle_inverter_metrics_1(&self, body: &[u8]) -> Result<()> {
        let packet = InverterMetrics1Packet::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: inverter metrics device={} model={} serial={}",
            self.tag, labels.device, labels.model, labels.serial,
        );
        let m = &packet.metrics;
        self.telemetry.gauge(
            metrics::INVERTER_VOLTAGE_INPUT_DC,
            &labels,
            m.common_0.voltage_input_dc_decivolts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_CURRENT_INPUT_DC,
            &labels,
            m.common_0.current_input_dc_deciamps.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_VOLTAGE_OUTPUT_AC,
            &labels,
            m.common_0.voltage_output_ac_decivolts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_CURRENT_OUTPUT_AC,
            &labels,
            m.common_0.current_output_ac_deciamps.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_FREQUENCY_OUTPUT_AC,
            &labels,
            m.common_0.frequency_output_ac_centihertz.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_POWER_OUTPUT_WATTS,
            &labels,
            m.common_0.power_output_watts.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_ENERGY_OUTPUT_DAY,
            &labels,
            m.common_1.energy_output_hectowatt_hours_today.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_ENERGY_OUTPUT_TOTAL,
            &labels,
            m.common_1.energy_output_hectowatt_hours_total.into(),
        );
        self.telemetry.gauge(
            metrics::INVERTER_UPTIME_HOURS_TOTAL,
            &labels,
            m.common_1.uptime_hours_total.into(),
        );
        self.telemetry
            .gauge(metrics::INVERTER_RSSI_PERCENT, &labels, m.rssi_percent.into());
        self.telemetry
            .inc_counter(metrics::INVERTER_METRICS_PACKETS_TOTAL, &labels);
        Ok(())
    }

    fn handle_inverter_time_sync(&self, body: &[u8]) -> Result<()> {
        let packet = InverterTimeSyncPacket::parse(body)?;
        let labels = device_labels(
            &packet.envelope.device_id,
            &packet.envelope.device_serial,
        )?;
        debug!(
            "{}: inverter time sync device={} model={} serial={} domain={} version={}",
            self.tag,
            labels.device,
            labels.model,
            labels.serial,
            String::from_utf8_lossy(&packet.time_sync.outbound_domain),
            String::from_utf8_lossy(&packet.time_sync.version),
        );
        self.telemetry
            .inc_counter(metrics::INVERTER_TIME_SYNC_PACKETS_TOTAL, &labels);
        Ok(())
    }

    /// Assumes the packet is a metrics packet with a weird packet type, so
    /// tries to decrypt and log it as such. The device occasionally does
    /// send metrics with an unknown type header.
    fn handle_unknown(&self, body: &[u8]) -> Result<()> {
        info!("{}: unknown packet body {:02x?}", self.tag, body);
        self.telemetry.inc(metrics::OUTBOUND_UNKNOWN_PACKETS_TOTAL);
        let (envelope, ciphertext) = Envelope::split(body)?;
        let cleartext = crate::crypto::decrypt(&envelope.iv, ciphertext)?;
        info!("{}: unknown packet cleartext {:02x?}", self.tag, cleartext);
        Ok(())
    }
}

impl PacketHandler for OutboundHandler {
    fn handle_packet(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let (header, body) = split_frame(OUTBOUND_PREFIX, CRC_BYTE_ORDER, data)?;
        match header.packet_type {
            METER_TIME_SYNC => {
                self.handle_meter_time_sync(body)?;
                Ok(None)
            }
            METER_METRICS_0 | METER_METRICS_1 => {
                let header_data = &data[..Header::size(OUTBOUND_PREFIX)];
                self.handle_meter_metrics(header_data, body)
            }
            METER_TIME_SYNC_RESP_ACK | INVERTER_TIME_SYNC_RESP_ACK => {
                self.handle_time_sync_resp_ack(body)?;
                Ok(None)
            }
            INVERTER_METRICS_0 => {
                self.handle_inverter_metrics_0(body)?;
                Ok(None)
            }
            INVERTER_METRICS_1 => {
                self.handle_inverter_metrics_1(body)?;
                Ok(None)
            }
            INVERTER_TIME_SYNC => {
                self.handle_inverter_time_sync(body)?;
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
