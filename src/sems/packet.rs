//! Binary layouts for every recognised packet variant.
//!
//! Frame structure on the wire, both directions:
//! prefix | length u32 BE | packet type [2] | body | CRC u16.
//! The declared length is body length + 1, and the CRC byte order differs
//! per direction. Packet bodies are a plaintext envelope (device identity
//! plus the AES IV) followed by AES-128-CBC ciphertext.

use bytes::{Buf, BufMut};

use crate::crc::{self, ByteOrder};
use crate::crypto;
use crate::error::{Error, Result};
use crate::timestamp::Timestamp;

/// Frame prefix on the device-to-portal direction.
pub const OUTBOUND_PREFIX: &[u8] = b"POSTGW";
/// Frame prefix on the portal-to-device direction.
pub const INBOUND_PREFIX: &[u8] = b"GW";
/// Two-byte keepalive occasionally sent by the portal. Not a frame: no
/// length, no CRC, no envelope.
pub const KEEPALIVE: [u8; 2] = [0x01, 0x02];

/// Two-byte packet type tag from the frame header.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PacketType(pub [u8; 2]);

fn take<const N: usize>(buf: &mut &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    buf.copy_to_slice(&mut bytes);
    bytes
}

fn take_timestamp(buf: &mut &[u8]) -> Timestamp {
    Timestamp(take::<6>(buf))
}

// Header {{{

/// Parsed frame header: prefix, declared length, packet type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub length: u32,
    pub packet_type: PacketType,
}

impl Header {
    /// Header size on the wire for the given direction prefix.
    pub fn size(prefix: &[u8]) -> usize {
        prefix.len() + 4 + 2
    }

    pub fn parse(prefix: &[u8], data: &[u8]) -> Result<Self> {
        if data.len() < Self::size(prefix) {
            return Err(Error::BadLength {
                expected: Self::size(prefix),
                got: data.len(),
            });
        }
        if !data.starts_with(prefix) {
            return Err(Error::UnknownPrefix(0));
        }
        let mut buf = &data[prefix.len()..];
        let length = buf.get_u32();
        let packet_type = PacketType(take::<2>(&mut buf));
        Ok(Self {
            length,
            packet_type,
        })
    }
}

/// Validates the CRC of a whole frame and splits it into header and body.
/// The body excludes the packet type (it lives in the header) and the two
/// trailing CRC bytes, and must match the declared length less one.
pub fn split_frame<'a>(
    prefix: &[u8],
    bo: ByteOrder,
    data: &'a [u8],
) -> Result<(Header, &'a [u8])> {
    crc::validate(data, bo)?;
    let header = Header::parse(prefix, data)?;
    if data.len() < Header::size(prefix) + 2 {
        return Err(Error::BadLength {
            expected: Header::size(prefix) + 2,
            got: data.len(),
        });
    }
    let body = &data[Header::size(prefix)..data.len() - 2];
    if header.length == 0 {
        return Err(Error::BadLength {
            expected: 1,
            got: 0,
        });
    }
    let expected = header.length as usize - 1;
    if body.len() != expected {
        return Err(Error::BadLength {
            expected,
            got: body.len(),
        });
    }
    Ok((header, body))
}

/// Assembles a complete frame around a body: prefix, declared length
/// (body + 1), packet type, body, CRC in the direction's byte order.
pub fn build_frame(
    prefix: &[u8],
    packet_type: PacketType,
    body: &[u8],
    bo: ByteOrder,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(Header::size(prefix) + body.len() + 2);
    frame.extend_from_slice(prefix);
    frame.put_u32(body.len() as u32 + 1);
    frame.extend_from_slice(&packet_type.0);
    frame.extend_from_slice(body);
    crc::append(&mut frame, bo);
    frame
}

// }}}

// Envelopes {{{

/// Plaintext wrapper, with a timestamp, around the ciphertext. Used by
/// most outbound variants.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimestampedEnvelope {
    pub alignment: [u8; 2],
    pub device_id: [u8; 8],
    pub device_serial: [u8; 8],
    pub iv: [u8; 16],
    pub timestamp: Timestamp,
}

impl TimestampedEnvelope {
    pub const SIZE: usize = 40;

    /// Splits a packet body into the envelope and the trailing ciphertext.
    pub fn split(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return Err(Error::BadLength {
                expected: Self::SIZE,
                got: data.len(),
            });
        }
        let (mut env, ciphertext) = data.split_at(Self::SIZE);
        let envelope = Self {
            alignment: take::<2>(&mut env),
            device_id: take::<8>(&mut env),
            device_serial: take::<8>(&mut env),
            iv: take::<16>(&mut env),
            timestamp: take_timestamp(&mut env),
        };
        Ok((envelope, ciphertext))
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.alignment);
        buf.extend_from_slice(&self.device_id);
        buf.extend_from_slice(&self.device_serial);
        buf.extend_from_slice(&self.iv);
        buf.extend_from_slice(self.timestamp.as_bytes());
    }
}

/// Plaintext wrapper without a timestamp. Used by all inbound variants and
/// the outbound time-sync-response ack.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Envelope {
    pub device_id: [u8; 8],
    pub device_serial: [u8; 8],
    pub iv: [u8; 16],
}

impl Envelope {
    pub const SIZE: usize = 32;

    pub fn split(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return Err(Error::BadLength {
                expected: Self::SIZE,
                got: data.len(),
            });
        }
        let (mut env, ciphertext) = data.split_at(Self::SIZE);
        let envelope = Self {
            device_id: take::<8>(&mut env),
            device_serial: take::<8>(&mut env),
            iv: take::<16>(&mut env),
        };
        Ok((envelope, ciphertext))
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.device_id);
        buf.extend_from_slice(&self.device_serial);
        buf.extend_from_slice(&self.iv);
    }
}

// }}}

fn check_size(kind: &'static str, expected: usize, data: &[u8]) -> Result<()> {
    if data.len() != expected {
        return Err(Error::BadLayout {
            kind,
            got: data.len(),
        });
    }
    Ok(())
}

// MeterMetrics {{{

/// Cleartext body of an outbound meter metrics packet. All content fields
/// are big-endian.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MeterMetrics {
    pub packet_type: [u8; 7],
    pub energy_export_decawatt_hours_total: i32,
    pub unknown_bytes_1: [u8; 2],
    pub energy_generation_decawatt_hours_total: i32,
    pub unknown_bytes_2: [u8; 8],
    pub sum_of_energy_generation_and_export_decawatt_hours_total: i32,
    pub unknown_bytes_3: [u8; 2],
    pub energy_import_decawatt_hours_total: i32,
    pub unknown_bytes_4: [u8; 16],
    pub sum_of_energy_import_less_generation_decawatt_hours_total: i16,
    pub unknown_int_5: i32,
    pub unknown_int_6: i16,
    pub unknown_int_7: i16,
    pub unknown_int_8: i16,
    pub unknown_int_9: i32,
    pub unknown_int_10: i32,
    pub unknown_int_11: i32,
    pub power_export_watts: i32,
    pub power_generation_watts: i32,
    pub unknown_int_12: i32,
    pub sum_of_power_generation_and_export_watts: i32,
    pub unknown_bytes_5: [u8; 21],
}

impl MeterMetrics {
    pub const SIZE: usize = 112;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("MeterMetrics", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<7>(&mut buf),
            energy_export_decawatt_hours_total: buf.get_i32(),
            unknown_bytes_1: take::<2>(&mut buf),
            energy_generation_decawatt_hours_total: buf.get_i32(),
            unknown_bytes_2: take::<8>(&mut buf),
            sum_of_energy_generation_and_export_decawatt_hours_total: buf.get_i32(),
            unknown_bytes_3: take::<2>(&mut buf),
            energy_import_decawatt_hours_total: buf.get_i32(),
            unknown_bytes_4: take::<16>(&mut buf),
            sum_of_energy_import_less_generation_decawatt_hours_total: buf.get_i16(),
            unknown_int_5: buf.get_i32(),
            unknown_int_6: buf.get_i16(),
            unknown_int_7: buf.get_i16(),
            unknown_int_8: buf.get_i16(),
            unknown_int_9: buf.get_i32(),
            unknown_int_10: buf.get_i32(),
            unknown_int_11: buf.get_i32(),
            power_export_watts: buf.get_i32(),
            power_generation_watts: buf.get_i32(),
            unknown_int_12: buf.get_i32(),
            sum_of_power_generation_and_export_watts: buf.get_i32(),
            unknown_bytes_5: take::<21>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.put_i32(self.energy_export_decawatt_hours_total);
        buf.extend_from_slice(&self.unknown_bytes_1);
        buf.put_i32(self.energy_generation_decawatt_hours_total);
        buf.extend_from_slice(&self.unknown_bytes_2);
        buf.put_i32(self.sum_of_energy_generation_and_export_decawatt_hours_total);
        buf.extend_from_slice(&self.unknown_bytes_3);
        buf.put_i32(self.energy_import_decawatt_hours_total);
        buf.extend_from_slice(&self.unknown_bytes_4);
        buf.put_i16(self.sum_of_energy_import_less_generation_decawatt_hours_total);
        buf.put_i32(self.unknown_int_5);
        buf.put_i16(self.unknown_int_6);
        buf.put_i16(self.unknown_int_7);
        buf.put_i16(self.unknown_int_8);
        buf.put_i32(self.unknown_int_9);
        buf.put_i32(self.unknown_int_10);
        buf.put_i32(self.unknown_int_11);
        buf.put_i32(self.power_export_watts);
        buf.put_i32(self.power_generation_watts);
        buf.put_i32(self.unknown_int_12);
        buf.put_i32(self.sum_of_power_generation_and_export_watts);
        buf.extend_from_slice(&self.unknown_bytes_5);
        buf
    }

    /// Unknown integer fields with apparently stable meaning, as
    /// (index, value) pairs for gauge observation.
    pub fn unknown_ints(&self) -> Vec<(u8, f64)> {
        vec![
            (5, self.unknown_int_5 as f64),
            (6, self.unknown_int_6 as f64),
            (7, self.unknown_int_7 as f64),
            (8, self.unknown_int_8 as f64),
            (9, self.unknown_int_9 as f64),
            (10, self.unknown_int_10 as f64),
            (11, self.unknown_int_11 as f64),
            (12, self.unknown_int_12 as f64),
        ]
    }
}

/// Body of an outbound meter metrics packet: timestamped envelope plus
/// encrypted metrics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeterMetricsPacket {
    pub envelope: TimestampedEnvelope,
    pub metrics: MeterMetrics,
}

impl MeterMetricsPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = TimestampedEnvelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let metrics = MeterMetrics::parse(&cleartext)?;
        Ok(Self { envelope, metrics })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TimestampedEnvelope::SIZE + MeterMetrics::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.metrics.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// MeterTimeSync {{{

/// Cleartext body of an outbound meter time-sync packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MeterTimeSync {
    pub packet_type: [u8; 7],
    /// Outbound TCP address. Null-terminated ASCII.
    pub outbound_addr: [u8; 40],
    pub unknown_bytes_1: [u8; 6],
    /// Serial number? ASCII.
    pub unknown_bytes_2: [u8; 16],
    pub unknown_int_0: i32,
    pub unknown_bytes_3: [u8; 4],
    /// Version numbers? Null-terminated ASCII.
    pub version: [u8; 19],
}

impl MeterTimeSync {
    pub const SIZE: usize = 96;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("MeterTimeSync", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<7>(&mut buf),
            outbound_addr: take::<40>(&mut buf),
            unknown_bytes_1: take::<6>(&mut buf),
            unknown_bytes_2: take::<16>(&mut buf),
            unknown_int_0: buf.get_i32(),
            unknown_bytes_3: take::<4>(&mut buf),
            version: take::<19>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.extend_from_slice(&self.outbound_addr);
        buf.extend_from_slice(&self.unknown_bytes_1);
        buf.extend_from_slice(&self.unknown_bytes_2);
        buf.put_i32(self.unknown_int_0);
        buf.extend_from_slice(&self.unknown_bytes_3);
        buf.extend_from_slice(&self.version);
        buf
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeterTimeSyncPacket {
    pub envelope: TimestampedEnvelope,
    pub time_sync: MeterTimeSync,
}

impl MeterTimeSyncPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = TimestampedEnvelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let time_sync = MeterTimeSync::parse(&cleartext)?;
        Ok(Self {
            envelope,
            time_sync,
        })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TimestampedEnvelope::SIZE + MeterTimeSync::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.time_sync.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// TimeSyncRespAck {{{

/// Cleartext body of an outbound time-sync-response ack. The payload is a
/// fixed-looking 16 bytes; it is logged, never asserted on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeSyncRespAck {
    pub data: [u8; 16],
}

impl TimeSyncRespAck {
    pub const SIZE: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("TimeSyncRespAck", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            data: take::<16>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// Outbound time-sync-response ack: note the envelope has no timestamp,
/// unlike the other outbound variants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSyncRespAckPacket {
    pub envelope: Envelope,
    pub ack: TimeSyncRespAck,
}

impl TimeSyncRespAckPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = Envelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let ack = TimeSyncRespAck::parse(&cleartext)?;
        Ok(Self { envelope, ack })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Envelope::SIZE + TimeSyncRespAck::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.ack.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// Inverter metrics common blocks {{{

/// First common block of fields shared by both inverter metrics variants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InverterMetricsCommon0 {
    pub inner_timestamp: Timestamp,
    pub voltage_input_dc_decivolts: i16,
    pub current_input_dc_deciamps: i16,
    pub unknown_bytes_1: [u8; 8],
    pub unknown_bytes_2: [u8; 18],
    pub voltage_output_ac_decivolts: i16,
    pub unknown_bytes_3: [u8; 4],
    pub current_output_ac_deciamps: i16,
    pub unknown_bytes_4: [u8; 4],
    pub frequency_output_ac_centihertz: i16,
    pub unknown_bytes_5: [u8; 4],
    pub unknown_int_0: i16,
    pub power_output_watts: i16,
    pub unknown_int_1: i16,
}

impl InverterMetricsCommon0 {
    pub const SIZE: usize = 60;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            inner_timestamp: take_timestamp(buf),
            voltage_input_dc_decivolts: buf.get_i16(),
            current_input_dc_deciamps: buf.get_i16(),
            unknown_bytes_1: take::<8>(buf),
            unknown_bytes_2: take::<18>(buf),
            voltage_output_ac_decivolts: buf.get_i16(),
            unknown_bytes_3: take::<4>(buf),
            current_output_ac_deciamps: buf.get_i16(),
            unknown_bytes_4: take::<4>(buf),
            frequency_output_ac_centihertz: buf.get_i16(),
            unknown_bytes_5: take::<4>(buf),
            unknown_int_0: buf.get_i16(),
            power_output_watts: buf.get_i16(),
            unknown_int_1: buf.get_i16(),
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.inner_timestamp.as_bytes());
        buf.put_i16(self.voltage_input_dc_decivolts);
        buf.put_i16(self.current_input_dc_deciamps);
        buf.extend_from_slice(&self.unknown_bytes_1);
        buf.extend_from_slice(&self.unknown_bytes_2);
        buf.put_i16(self.voltage_output_ac_decivolts);
        buf.extend_from_slice(&self.unknown_bytes_3);
        buf.put_i16(self.current_output_ac_deciamps);
        buf.extend_from_slice(&self.unknown_bytes_4);
        buf.put_i16(self.frequency_output_ac_centihertz);
        buf.extend_from_slice(&self.unknown_bytes_5);
        buf.put_i16(self.unknown_int_0);
        buf.put_i16(self.power_output_watts);
        buf.put_i16(self.unknown_int_1);
    }

    fn unknown_ints(&self) -> Vec<(u8, f64)> {
        vec![
            (0, self.unknown_int_0 as f64),
            (1, self.unknown_int_1 as f64),
        ]
    }
}

/// Second common block of inverter metrics fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InverterMetricsCommon1 {
    pub unknown_int_2: i16,
    pub unknown_int_3: i16,
    pub unknown_bytes_6: [u8; 2],
    pub unknown_int_4: i16,
    pub unknown_bytes_7: [u8; 4],
    pub unknown_int_5: i16,
    pub unknown_bytes_8: [u8; 2],
    pub internal_temperature_decidegrees_celsius: i16,
    pub unknown_bytes_9: [u8; 4],
    pub energy_output_hectowatt_hours_today: i16,
    pub energy_output_hectowatt_hours_total: i32,
    pub uptime_hours_total: i32,
    pub unknown_int_7: i16,
    pub unknown_int_8: i16,
    pub unknown_int_9: i16,
}

impl InverterMetricsCommon1 {
    pub const SIZE: usize = 38;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            unknown_int_2: buf.get_i16(),
            unknown_int_3: buf.get_i16(),
            unknown_bytes_6: take::<2>(buf),
            unknown_int_4: buf.get_i16(),
            unknown_bytes_7: take::<4>(buf),
            unknown_int_5: buf.get_i16(),
            unknown_bytes_8: take::<2>(buf),
            internal_temperature_decidegrees_celsius: buf.get_i16(),
            unknown_bytes_9: take::<4>(buf),
            energy_output_hectowatt_hours_today: buf.get_i16(),
            energy_output_hectowatt_hours_total: buf.get_i32(),
            uptime_hours_total: buf.get_i32(),
            unknown_int_7: buf.get_i16(),
            unknown_int_8: buf.get_i16(),
            unknown_int_9: buf.get_i16(),
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_i16(self.unknown_int_2);
        buf.put_i16(self.unknown_int_3);
        buf.extend_from_slice(&self.unknown_bytes_6);
        buf.put_i16(self.unknown_int_4);
        buf.extend_from_slice(&self.unknown_bytes_7);
        buf.put_i16(self.unknown_int_5);
        buf.extend_from_slice(&self.unknown_bytes_8);
        buf.put_i16(self.internal_temperature_decidegrees_celsius);
        buf.extend_from_slice(&self.unknown_bytes_9);
        buf.put_i16(self.energy_output_hectowatt_hours_today);
        buf.put_i32(self.energy_output_hectowatt_hours_total);
        buf.put_i32(self.uptime_hours_total);
        buf.put_i16(self.unknown_int_7);
        buf.put_i16(self.unknown_int_8);
        buf.put_i16(self.unknown_int_9);
    }

    fn unknown_ints(&self) -> Vec<(u8, f64)> {
        vec![
            (2, self.unknown_int_2 as f64),
            (3, self.unknown_int_3 as f64),
            (4, self.unknown_int_4 as f64),
            (5, self.unknown_int_5 as f64),
            (7, self.unknown_int_7 as f64),
            (8, self.unknown_int_8 as f64),
            (9, self.unknown_int_9 as f64),
        ]
    }
}

/// Third common block of inverter metrics fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InverterMetricsCommon2 {
    pub unknown_int_10: i16,
    pub unknown_int_11: i16,
    pub unknown_int_12: i16,
    pub unknown_int_13: i16,
    pub unknown_int_14: i16,
    pub unknown_bytes_10: [u8; 2],
    pub unknown_int_15: i32,
    pub unknown_int_16: i32,
    pub unknown_int_17: i16,
    pub unknown_int_18: i16,
    pub unknown_int_19: i16,
    pub unknown_int_20: i16,
    pub unknown_bytes_11: [u8; 4],
    pub unknown_int_21: i32,
    pub unknown_bytes_12: [u8; 8],
}

impl InverterMetricsCommon2 {
    pub const SIZE: usize = 44;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            unknown_int_10: buf.get_i16(),
            unknown_int_11: buf.get_i16(),
            unknown_int_12: buf.get_i16(),
            unknown_int_13: buf.get_i16(),
            unknown_int_14: buf.get_i16(),
            unknown_bytes_10: take::<2>(buf),
            unknown_int_15: buf.get_i32(),
            unknown_int_16: buf.get_i32(),
            unknown_int_17: buf.get_i16(),
            unknown_int_18: buf.get_i16(),
            unknown_int_19: buf.get_i16(),
            unknown_int_20: buf.get_i16(),
            unknown_bytes_11: take::<4>(buf),
            unknown_int_21: buf.get_i32(),
            unknown_bytes_12: take::<8>(buf),
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_i16(self.unknown_int_10);
        buf.put_i16(self.unknown_int_11);
        buf.put_i16(self.unknown_int_12);
        buf.put_i16(self.unknown_int_13);
        buf.put_i16(self.unknown_int_14);
        buf.extend_from_slice(&self.unknown_bytes_10);
        buf.put_i32(self.unknown_int_15);
        buf.put_i32(self.unknown_int_16);
        buf.put_i16(self.unknown_int_17);
        buf.put_i16(self.unknown_int_18);
        buf.put_i16(self.unknown_int_19);
        buf.put_i16(self.unknown_int_20);
        buf.extend_from_slice(&self.unknown_bytes_11);
        buf.put_i32(self.unknown_int_21);
        buf.extend_from_slice(&self.unknown_bytes_12);
    }

    fn unknown_ints(&self) -> Vec<(u8, f64)> {
        vec![
            (10, self.unknown_int_10 as f64),
            (11, self.unknown_int_11 as f64),
            (12, self.unknown_int_12 as f64),
            (13, self.unknown_int_13 as f64),
            (14, self.unknown_int_14 as f64),
            (15, self.unknown_int_15 as f64),
            (16, self.unknown_int_16 as f64),
            (17, self.unknown_int_17 as f64),
            (18, self.unknown_int_18 as f64),
            (19, self.unknown_int_19 as f64),
            (20, self.unknown_int_20 as f64),
            (21, self.unknown_int_21 as f64),
        ]
    }
}

/// Fourth common block of inverter metrics fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InverterMetricsCommon3 {
    pub unknown_int_22: i16,
    pub unknown_int_23: i16,
    pub unknown_int_24: i16,
    pub unknown_bytes_13: [u8; 56],
    pub unknown_int_25: i16,
    pub unknown_int_26: i16,
    pub unknown_int_27: i16,
    pub unknown_int_28: i16,
    pub unknown_int_29: i16,
    pub unknown_int_30: i16,
    pub unknown_bytes_14: [u8; 10],
    pub unknown_int_31: i16,
    pub unknown_int_32: i16,
}

impl InverterMetricsCommon3 {
    pub const SIZE: usize = 88;

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            unknown_int_22: buf.get_i16(),
            unknown_int_23: buf.get_i16(),
            unknown_int_24: buf.get_i16(),
            unknown_bytes_13: take::<56>(buf),
            unknown_int_25: buf.get_i16(),
            unknown_int_26: buf.get_i16(),
            unknown_int_27: buf.get_i16(),
            unknown_int_28: buf.get_i16(),
            unknown_int_29: buf.get_i16(),
            unknown_int_30: buf.get_i16(),
            unknown_bytes_14: take::<10>(buf),
            unknown_int_31: buf.get_i16(),
            unknown_int_32: buf.get_i16(),
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.put_i16(self.unknown_int_22);
        buf.put_i16(self.unknown_int_23);
        buf.put_i16(self.unknown_int_24);
        buf.extend_from_slice(&self.unknown_bytes_13);
        buf.put_i16(self.unknown_int_25);
        buf.put_i16(self.unknown_int_26);
        buf.put_i16(self.unknown_int_27);
        buf.put_i16(self.unknown_int_28);
        buf.put_i16(self.unknown_int_29);
        buf.put_i16(self.unknown_int_30);
        buf.extend_from_slice(&self.unknown_bytes_14);
        buf.put_i16(self.unknown_int_31);
        buf.put_i16(self.unknown_int_32);
    }

    fn unknown_ints(&self) -> Vec<(u8, f64)> {
        vec![
            (22, self.unknown_int_22 as f64),
            (23, self.unknown_int_23 as f64),
            (24, self.unknown_int_24 as f64),
            (25, self.unknown_int_25 as f64),
            (26, self.unknown_int_26 as f64),
            (27, self.unknown_int_27 as f64),
            (28, self.unknown_int_28 as f64),
            (29, self.unknown_int_29 as f64),
            (30, self.unknown_int_30 as f64),
            (31, self.unknown_int_31 as f64),
            (32, self.unknown_int_32 as f64),
        ]
    }
}

// }}}

// InverterMetrics0 {{{

/// Cleartext body of an outbound inverter metrics packet, variant 0.
/// The first five bytes differ by a single byte between the two variants,
/// so presumably an inner packet type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InverterMetrics0 {
    pub packet_type: [u8; 5],
    pub unknown_bytes_0: [u8; 16],
    pub common_0: InverterMetricsCommon0,
    pub unknown_bytes_15: [u8; 6],
    pub common_1: InverterMetricsCommon1,
    pub unknown_bytes_16: [u8; 2],
    pub unknown_int_33: i16,
    pub unknown_bytes_17: [u8; 16],
    pub rssi_percent: i16,
    pub unknown_bytes_18: [u8; 4],
    pub common_2: InverterMetricsCommon2,
    pub unknown_bytes_19: [u8; 8],
    pub unknown_int_34: i16,
    pub unknown_int_35: i16,
    pub unknown_int_36: i16,
    /// ASCII.
    pub unknown_bytes_20: [u8; 12],
    pub unknown_int_37: i16,
    pub unknown_int_38: i16,
    pub unknown_int_39: i16,
    pub unknown_bytes_21: [u8; 2],
    pub unknown_bytes_22: [u8; 16],
    pub unknown_int_40: i16,
    pub unknown_int_41: i16,
    pub unknown_bytes_23: [u8; 4],
    pub unknown_int_42: i16,
    pub unknown_int_43: i16,
    pub unknown_bytes_24: [u8; 74],
    pub unknown_bytes_25: [u8; 2],
    pub unknown_int_44: i16,
    pub unknown_int_45: i16,
    pub unknown_bytes_26: [u8; 28],
    pub unknown_bytes_27: [u8; 4],
    pub common_3: InverterMetricsCommon3,
    pub unknown_int_46: i16,
    pub unknown_int_47: i16,
    pub unknown_bytes_28: [u8; 14],
    pub unknown_int_48: i16,
    pub unknown_int_49: i16,
    pub unknown_bytes_29: [u8; 4],
    pub unknown_int_50: i16,
    pub unknown_int_51: i16,
    pub unknown_bytes_30: [u8; 2],
    pub unknown_bytes_31: [u8; 7],
}

impl InverterMetrics0 {
    pub const SIZE: usize = 496;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("InverterMetrics0", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<5>(&mut buf),
            unknown_bytes_0: take::<16>(&mut buf),
            common_0: InverterMetricsCommon0::read(&mut buf),
            unknown_bytes_15: take::<6>(&mut buf),
            common_1: InverterMetricsCommon1::read(&mut buf),
            unknown_bytes_16: take::<2>(&mut buf),
            unknown_int_33: buf.get_i16(),
            unknown_bytes_17: take::<16>(&mut buf),
            rssi_percent: buf.get_i16(),
            unknown_bytes_18: take::<4>(&mut buf),
            common_2: InverterMetricsCommon2::read(&mut buf),
            unknown_bytes_19: take::<8>(&mut buf),
            unknown_int_34: buf.get_i16(),
            unknown_int_35: buf.get_i16(),
            unknown_int_36: buf.get_i16(),
            unknown_bytes_20: take::<12>(&mut buf),
            unknown_int_37: buf.get_i16(),
            unknown_int_38: buf.get_i16(),
            unknown_int_39: buf.get_i16(),
            unknown_bytes_21: take::<2>(&mut buf),
            unknown_bytes_22: take::<16>(&mut buf),
            unknown_int_40: buf.get_i16(),
            unknown_int_41: buf.get_i16(),
            unknown_bytes_23: take::<4>(&mut buf),
            unknown_int_42: buf.get_i16(),
            unknown_int_43: buf.get_i16(),
            unknown_bytes_24: take::<74>(&mut buf),
            unknown_bytes_25: take::<2>(&mut buf),
            unknown_int_44: buf.get_i16(),
            unknown_int_45: buf.get_i16(),
            unknown_bytes_26: take::<28>(&mut buf),
            unknown_bytes_27: take::<4>(&mut buf),
            common_3: InverterMetricsCommon3::read(&mut buf),
            unknown_int_46: buf.get_i16(),
            unknown_int_47: buf.get_i16(),
            unknown_bytes_28: take::<14>(&mut buf),
            unknown_int_48: buf.get_i16(),
            unknown_int_49: buf.get_i16(),
            unknown_bytes_29: take::<4>(&mut buf),
            unknown_int_50: buf.get_i16(),
            unknown_int_51: buf.get_i16(),
            unknown_bytes_30: take::<2>(&mut buf),
            unknown_bytes_31: take::<7>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.extend_from_slice(&self.unknown_bytes_0);
        self.common_0.write(&mut buf);
        buf.extend_from_slice(&self.unknown_bytes_15);
        self.common_1.write(&mut buf);
        buf.extend_from_slice(&self.unknown_bytes_16);
        buf.put_i16(self.unknown_int_33);
        buf.extend_from_slice(&self.unknown_bytes_17);
        buf.put_i16(self.rssi_percent);
        buf.extend_from_slice(&self.unknown_bytes_18);
        self.common_2.write(&mut buf);
        buf.extend_from_slice(&self.unknown_bytes_19);
        buf.put_i16(self.unknown_int_34);
        buf.put_i16(self.unknown_int_35);
        buf.put_i16(self.unknown_int_36);
        buf.extend_from_slice(&self.unknown_bytes_20);
        buf.put_i16(self.unknown_int_37);
        buf.put_i16(self.unknown_int_38);
        buf.put_i16(self.unknown_int_39);
        buf.extend_from_slice(&self.unknown_bytes_21);
        buf.extend_from_slice(&self.unknown_bytes_22);
        buf.put_i16(self.unknown_int_40);
        buf.put_i16(self.unknown_int_41);
        buf.extend_from_slice(&self.unknown_bytes_23);
        buf.put_i16(self.unknown_int_42);
        buf.put_i16(self.unknown_int_43);
        buf.extend_from_slice(&self.unknown_bytes_24);
        buf.extend_from_slice(&self.unknown_bytes_25);
        buf.put_i16(self.unknown_int_44);
        buf.put_i16(self.unknown_int_45);
        buf.extend_from_slice(&self.unknown_bytes_26);
        buf.extend_from_slice(&self.unknown_bytes_27);
        self.common_3.write(&mut buf);
        buf.put_i16(self.unknown_int_46);
        buf.put_i16(self.unknown_int_47);
        buf.extend_from_slice(&self.unknown_bytes_28);
        buf.put_i16(self.unknown_int_48);
        buf.put_i16(self.unknown_int_49);
        buf.extend_from_slice(&self.unknown_bytes_29);
        buf.put_i16(self.unknown_int_50);
        buf.put_i16(self.unknown_int_51);
        buf.extend_from_slice(&self.unknown_bytes_30);
        buf.extend_from_slice(&self.unknown_bytes_31);
        buf
    }

    /// All unknown integer fields as (index, value) pairs for gauge
    /// observation. Variant 0 exposes the full set.
    pub fn unknown_ints(&self) -> Vec<(u8, f64)> {
        let mut ints = self.common_0.unknown_ints();
        ints.extend(self.common_1.unknown_ints());
        ints.extend(self.common_2.unknown_ints());
        ints.extend(self.common_3.unknown_ints());
        ints.extend([
            (33, self.unknown_int_33 as f64),
            (34, self.unknown_int_34 as f64),
            (35, self.unknown_int_35 as f64),
            (36, self.unknown_int_36 as f64),
            (37, self.unknown_int_37 as f64),
            (38, self.unknown_int_38 as f64),
            (39, self.unknown_int_39 as f64),
            (40, self.unknown_int_40 as f64),
            (41, self.unknown_int_41 as f64),
            (42, self.unknown_int_42 as f64),
            (43, self.unknown_int_43 as f64),
            (44, self.unknown_int_44 as f64),
            (45, self.unknown_int_45 as f64),
            (46, self.unknown_int_46 as f64),
            (47, self.unknown_int_47 as f64),
            (48, self.unknown_int_48 as f64),
            (49, self.unknown_int_49 as f64),
            (50, self.unknown_int_50 as f64),
            (51, self.unknown_int_51 as f64),
        ]);
        ints.sort_unstable_by_key(|(i, _)| *i);
        ints
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InverterMetrics0Packet {
    pub envelope: TimestampedEnvelope,
    pub metrics: InverterMetrics0,
}

impl InverterMetrics0Packet {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = TimestampedEnvelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let metrics = InverterMetrics0::parse(&cleartext)?;
        Ok(Self { envelope, metrics })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TimestampedEnvelope::SIZE + InverterMetrics0::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.metrics.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// InverterMetrics1 {{{

/// Cleartext body of an outbound inverter metrics packet, variant 1.
/// Possibly stale/cached metrics retransmitted after network problems.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InverterMetrics1 {
    pub packet_type: [u8; 5],
    pub unknown_bytes_32: [u8; 14],
    pub common_0: InverterMetricsCommon0,
    pub unknown_int_53: i16,
    pub unknown_int_54: i16,
    pub common_1: InverterMetricsCommon1,
    pub unknown_int_55: i16,
    pub unknown_bytes_33: [u8; 16],
    pub rssi_percent: i16,
    pub unknown_int_56: i16,
    pub unknown_int_57: i16,
    pub unknown_bytes_34: [u8; 2],
    pub common_2: InverterMetricsCommon2,
    pub unknown_int_58: i16,
    pub unknown_int_59: i16,
    pub unknown_bytes_35: [u8; 20],
    pub unknown_int_60: i16,
    pub unknown_int_61: i16,
    pub unknown_int_62: i16,
    pub unknown_int_63: i16,
    pub unknown_int_64: i16,
    pub unknown_int_65: i16,
    pub unknown_bytes_36: [u8; 18],
    pub unknown_int_66: i16,
    pub unknown_int_67: i16,
    pub unknown_int_68: i16,
    pub common_3: InverterMetricsCommon3,
    pub unknown_int_69: i16,
    pub unknown_int_70: i16,
    pub unknown_bytes_37: [u8; 9],
}

impl InverterMetrics1 {
    pub const SIZE: usize = 352;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("InverterMetrics1", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<5>(&mut buf),
            unknown_bytes_32: take::<14>(&mut buf),
            common_0: InverterMetricsCommon0::read(&mut buf),
            unknown_int_53: buf.get_i16(),
            unknown_int_54: buf.get_i16(),
            common_1: InverterMetricsCommon1::read(&mut buf),
            unknown_int_55: buf.get_i16(),
            unknown_bytes_33: take::<16>(&mut buf),
            rssi_percent: buf.get_i16(),
            unknown_int_56: buf.get_i16(),
            unknown_int_57: buf.get_i16(),
            unknown_bytes_34: take::<2>(&mut buf),
            common_2: InverterMetricsCommon2::read(&mut buf),
            unknown_int_58: buf.get_i16(),
            unknown_int_59: buf.get_i16(),
            unknown_bytes_35: take::<20>(&mut buf),
            unknown_int_60: buf.get_i16(),
            unknown_int_61: buf.get_i16(),
            unknown_int_62: buf.get_i16(),
            unknown_int_63: buf.get_i16(),
            unknown_int_64: buf.get_i16(),
            unknown_int_65: buf.get_i16(),
            unknown_bytes_36: take::<18>(&mut buf),
            unknown_int_66: buf.get_i16(),
            unknown_int_67: buf.get_i16(),
            unknown_int_68: buf.get_i16(),
            common_3: InverterMetricsCommon3::read(&mut buf),
            unknown_int_69: buf.get_i16(),
            unknown_int_70: buf.get_i16(),
            unknown_bytes_37: take::<9>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.extend_from_slice(&self.unknown_bytes_32);
        self.common_0.write(&mut buf);
        buf.put_i16(self.unknown_int_53);
        buf.put_i16(self.unknown_int_54);
        self.common_1.write(&mut buf);
        buf.put_i16(self.unknown_int_55);
        buf.extend_from_slice(&self.unknown_bytes_33);
        buf.put_i16(self.rssi_percent);
        buf.put_i16(self.unknown_int_56);
        buf.put_i16(self.unknown_int_57);
        buf.extend_from_slice(&self.unknown_bytes_34);
        self.common_2.write(&mut buf);
        buf.put_i16(self.unknown_int_58);
        buf.put_i16(self.unknown_int_59);
        buf.extend_from_slice(&self.unknown_bytes_35);
        buf.put_i16(self.unknown_int_60);
        buf.put_i16(self.unknown_int_61);
        buf.put_i16(self.unknown_int_62);
        buf.put_i16(self.unknown_int_63);
        buf.put_i16(self.unknown_int_64);
        buf.put_i16(self.unknown_int_65);
        buf.extend_from_slice(&self.unknown_bytes_36);
        buf.put_i16(self.unknown_int_66);
        buf.put_i16(self.unknown_int_67);
        buf.put_i16(self.unknown_int_68);
        self.common_3.write(&mut buf);
        buf.put_i16(self.unknown_int_69);
        buf.put_i16(self.unknown_int_70);
        buf.extend_from_slice(&self.unknown_bytes_37);
        buf
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InverterMetrics1Packet {
    pub envelope: TimestampedEnvelope,
    pub metrics: InverterMetrics1,
}

impl InverterMetrics1Packet {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = TimestampedEnvelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let metrics = InverterMetrics1::parse(&cleartext)?;
        Ok(Self { envelope, metrics })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TimestampedEnvelope::SIZE + InverterMetrics1::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.metrics.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// InverterTimeSync {{{

/// Cleartext body of an outbound inverter time-sync packet. Almost all of
/// the 736 bytes are unidentified; the ASCII islands are the interesting
/// part.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InverterTimeSync {
    pub packet_type: [u8; 7],
    pub unknown_bytes_0: [u8; 22],
    /// Version number? Null-terminated ASCII.
    pub version: [u8; 16],
    pub unknown_bytes_1: [u8; 206],
    /// Outbound domain name. ASCII.
    pub outbound_domain: [u8; 52],
    pub unknown_bytes_2: [u8; 20],
    /// Device model. Null-terminated ASCII.
    pub device_model: [u8; 32],
    pub unknown_bytes_3: [u8; 381],
}

impl InverterTimeSync {
    pub const SIZE: usize = 736;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("InverterTimeSync", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<7>(&mut buf),
            unknown_bytes_0: take::<22>(&mut buf),
            version: take::<16>(&mut buf),
            unknown_bytes_1: take::<206>(&mut buf),
            outbound_domain: take::<52>(&mut buf),
            unknown_bytes_2: take::<20>(&mut buf),
            device_model: take::<32>(&mut buf),
            unknown_bytes_3: take::<381>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.extend_from_slice(&self.unknown_bytes_0);
        buf.extend_from_slice(&self.version);
        buf.extend_from_slice(&self.unknown_bytes_1);
        buf.extend_from_slice(&self.outbound_domain);
        buf.extend_from_slice(&self.unknown_bytes_2);
        buf.extend_from_slice(&self.device_model);
        buf.extend_from_slice(&self.unknown_bytes_3);
        buf
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InverterTimeSyncPacket {
    pub envelope: TimestampedEnvelope,
    pub time_sync: InverterTimeSync,
}

impl InverterTimeSyncPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = TimestampedEnvelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let time_sync = InverterTimeSync::parse(&cleartext)?;
        Ok(Self {
            envelope,
            time_sync,
        })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TimestampedEnvelope::SIZE + InverterTimeSync::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.time_sync.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

// Inbound packets {{{

/// Metrics ACK payload sent by the portal on successful receipt.
pub const METRICS_ACK_DATA: [u8; 16] = [0; 16];
/// Metrics NACK payload sent on unsuccessful receipt (e.g. bad CRC).
pub const METRICS_NACK_DATA: [u8; 16] = [
    0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

/// Inbound metrics ACK cleartext.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InboundMetricsAck {
    pub data: [u8; 16],
}

impl InboundMetricsAck {
    pub const SIZE: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("InboundMetricsAck", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            data: take::<16>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InboundMetricsAckPacket {
    pub envelope: Envelope,
    pub ack: InboundMetricsAck,
}

impl InboundMetricsAckPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = Envelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let ack = InboundMetricsAck::parse(&cleartext)?;
        Ok(Self { envelope, ack })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Envelope::SIZE + InboundMetricsAck::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.ack.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

/// Cleartext body of an inbound time-sync response.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InboundTimeSyncResp {
    pub packet_type: [u8; 4],
    pub timestamp: Timestamp,
    pub unknown_bytes: [u8; 6],
}

impl InboundTimeSyncResp {
    pub const SIZE: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        check_size("InboundTimeSyncResp", Self::SIZE, data)?;
        let mut buf = data;
        Ok(Self {
            packet_type: take::<4>(&mut buf),
            timestamp: take_timestamp(&mut buf),
            unknown_bytes: take::<6>(&mut buf),
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.packet_type);
        buf.extend_from_slice(self.timestamp.as_bytes());
        buf.extend_from_slice(&self.unknown_bytes);
        buf
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InboundTimeSyncRespPacket {
    pub envelope: Envelope,
    pub time_sync_resp: InboundTimeSyncResp,
}

impl InboundTimeSyncRespPacket {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let (envelope, ciphertext) = Envelope::split(body)?;
        let cleartext = crypto::decrypt(&envelope.iv, ciphertext)?;
        let time_sync_resp = InboundTimeSyncResp::parse(&cleartext)?;
        Ok(Self {
            envelope,
            time_sync_resp,
        })
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Envelope::SIZE + InboundTimeSyncResp::SIZE);
        self.envelope.write(&mut buf);
        let ciphertext = crypto::encrypt(&self.envelope.iv, &self.time_sync_resp.bytes())?;
        buf.extend_from_slice(&ciphertext);
        Ok(buf)
    }
}

// }}}

#[cfg(test)]
mod tests {
    use super::*;

    // every cleartext layout must consume a buffer of exactly its declared
    // size, and re-serialise to the identical bytes
    #[test]
    fn cleartext_sizes_and_roundtrips() {
        let data: Vec<u8> = (0..=255u8).cycle().take(736).collect();

        let m = MeterMetrics::parse(&data[..MeterMetrics::SIZE]).unwrap();
        assert_eq!(m.bytes(), &data[..MeterMetrics::SIZE]);

        let t = MeterTimeSync::parse(&data[..MeterTimeSync::SIZE]).unwrap();
        assert_eq!(t.bytes(), &data[..MeterTimeSync::SIZE]);

        let a = TimeSyncRespAck::parse(&data[..TimeSyncRespAck::SIZE]).unwrap();
        assert_eq!(a.bytes(), &data[..TimeSyncRespAck::SIZE]);

        let i0 = InverterMetrics0::parse(&data[..InverterMetrics0::SIZE]).unwrap();
        assert_eq!(i0.bytes(), &data[..InverterMetrics0::SIZE]);

        let i1 = InverterMetrics1::parse(&data[..InverterMetrics1::SIZE]).unwrap();
        assert_eq!(i1.bytes(), &data[..InverterMetrics1::SIZE]);

        let ts = InverterTimeSync::parse(&data[..InverterTimeSync::SIZE]).unwrap();
        assert_eq!(ts.bytes(), &data[..InverterTimeSync::SIZE]);

        let ack = InboundMetricsAck::parse(&data[..InboundMetricsAck::SIZE]).unwrap();
        assert_eq!(ack.bytes(), &data[..InboundMetricsAck::SIZE]);

        let tr = InboundTimeSyncResp::parse(&data[..InboundTimeSyncResp::SIZE]).unwrap();
        assert_eq!(tr.bytes(), &data[..InboundTimeSyncResp::SIZE]);
    }

    #[test]
    fn cleartext_sizes_are_block_aligned() {
        for size in [
            MeterMetrics::SIZE,
            MeterTimeSync::SIZE,
            TimeSyncRespAck::SIZE,
            InverterMetrics0::SIZE,
            InverterMetrics1::SIZE,
            InverterTimeSync::SIZE,
            InboundMetricsAck::SIZE,
            InboundTimeSyncResp::SIZE,
        ] {
            assert_eq!(size % 16, 0, "cleartext size {size} not block-aligned");
        }
    }

    #[test]
    fn wrong_size_is_bad_layout() {
        assert!(matches!(
            MeterMetrics::parse(&[0u8; 111]),
            Err(Error::BadLayout { .. })
        ));
        assert!(matches!(
            InverterMetrics0::parse(&[0u8; 352]),
            Err(Error::BadLayout { .. })
        ));
    }

    #[test]
    fn inverter_unknown_ints_cover_expected_indices() {
        let data = vec![0u8; InverterMetrics0::SIZE];
        let metrics = InverterMetrics0::parse(&data).unwrap();
        let indices: Vec<u8> = metrics.unknown_ints().iter().map(|(i, _)| *i).collect();
        // 0..=51 with 6 missing: no field carries that index on the wire
        let expected: Vec<u8> = (0..=51).filter(|i| *i != 6).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn header_roundtrip_and_split() {
        let body = vec![0xaau8; 48];
        let frame = build_frame(
            OUTBOUND_PREFIX,
            PacketType([0x03, 0x10]),
            &body,
            ByteOrder::Big,
        );
        assert_eq!(frame.len(), OUTBOUND_PREFIX.len() + 4 + 2 + 48 + 2);
        let (header, split_body) = split_frame(OUTBOUND_PREFIX, ByteOrder::Big, &frame).unwrap();
        assert_eq!(header.length, 49);
        assert_eq!(header.packet_type, PacketType([0x03, 0x10]));
        assert_eq!(split_body, &body[..]);
    }
}
