use chrono::{DateTime, FixedOffset, TimeZone};

/// Timezone the devices report in: China Standard Time (+08:00).
pub fn china_standard_time() -> FixedOffset {
    FixedOffset::east_opt(8 * 60 * 60).expect("+08:00 is a valid offset")
}

/// Six-byte wire timestamp: year offset from 2000, month, day, hour,
/// minute, second, in fixed +08:00.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Timestamp(pub [u8; 6]);

impl Timestamp {
    pub const SIZE: usize = 6;

    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Converts to an absolute instant. Returns None when the raw fields
    /// do not name a real calendar date; the wire format does not forbid
    /// that, so parsing never rejects on it.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        china_standard_time()
            .with_ymd_and_hms(
                2000 + i32::from(self.0[0]),
                u32::from(self.0[1]),
                u32::from(self.0[2]),
                u32::from(self.0[3]),
                u32::from(self.0[4]),
                u32::from(self.0[5]),
            )
            .single()
    }

    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Self {
        use chrono::{Datelike, Timelike};
        let local = dt.with_timezone(&china_standard_time());
        Self([
            (local.year() - 2000).clamp(0, 255) as u8,
            local.month() as u8,
            local.day() as u8,
            local.hour() as u8,
            local.minute() as u8,
            local.second() as u8,
        ])
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            None => write!(f, "{:02x?}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_observed_timestamp() {
        let ts = Timestamp([0x17, 0x0b, 0x1a, 0x16, 0x04, 0x21]);
        let dt = ts.to_datetime().unwrap();
        let expected = china_standard_time()
            .with_ymd_and_hms(2023, 11, 26, 22, 4, 33)
            .unwrap();
        assert_eq!(dt, expected);
    }

    #[test]
    fn roundtrips_through_datetime() {
        let ts = Timestamp([0x17, 0x09, 0x12, 0x09, 0x09, 0x1b]);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(Timestamp::from_datetime(&dt), ts);
    }

    #[test]
    fn nonsense_date_does_not_panic() {
        let ts = Timestamp([0x17, 0x0d, 0x20, 0x19, 0x3c, 0x3c]);
        assert_eq!(ts.to_datetime(), None);
        // display falls back to the raw bytes
        assert!(format!("{ts}").starts_with('['));
    }
}
