//! Batsignal mode: rewrites outbound meter metrics so the portal's plot
//! traces the Batman curve over the day, centred on local noon.
//! <https://www.pacifict.com/Examples/Batman/>
//!
//! Doubles as a demonstration that intercepted packets can be modified in
//! flight and re-authenticated with a valid trailing CRC.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::metrics::{BATSIGNAL_BOTTOM, BATSIGNAL_TOP};
use crate::sems::packet::MeterMetricsPacket;
use crate::timestamp::china_standard_time;

/// Injectable wall clock, so tests can pin the curve at noon.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Clock reading system time in the device timezone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&china_standard_time())
    }
}

/// Clock pinned to a fixed instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Hours either side of local noon, the curve's x axis.
fn hours_from_noon(now: &DateTime<FixedOffset>) -> f64 {
    f64::from(now.hour()) + f64::from(now.minute()) / 60.0 - 12.0
}

/// Positive y value of the Batman function at x.
pub fn top(x: f64) -> f64 {
    let a = x.abs();
    if a > 3.0 && a < 7.0 {
        3.0 * (1.0 - (x / 7.0).powi(2)).sqrt()
    } else if a > 1.0 && a <= 3.0 {
        6.0 * 10.0_f64.sqrt() / 7.0 - 0.5 * a + 1.5
            - (3.0 * 10.0_f64.sqrt() / 7.0) * (4.0 - (a - 1.0).powi(2)).sqrt()
    } else if a > 0.75 && a <= 1.0 {
        9.0 - 8.0 * a
    } else if a > 0.5 && a <= 0.75 {
        3.0 * a + 0.75
    } else if a <= 0.5 {
        2.25
    } else {
        0.0
    }
}

/// Negative y value of the Batman function at x.
pub fn bottom(x: f64) -> f64 {
    let a = x.abs();
    if a > 4.0 && a < 7.0 {
        -3.0 * (1.0 - (x / 7.0).powi(2)).sqrt()
    } else if a <= 4.0 {
        a / 2.0 - (3.0 * 33.0_f64.sqrt() - 7.0) / 112.0 * (x * x) - 3.0
            + (1.0 - ((a - 2.0).abs() - 1.0).powi(2)).sqrt()
    } else {
        0.0
    }
}

/// Samples the top curve at the clock's current time.
pub fn sample_top(clock: &dyn Clock) -> f64 {
    top(hours_from_noon(&clock.now()))
}

/// Samples the bottom curve at the clock's current time.
pub fn sample_bottom(clock: &dyn Clock) -> f64 {
    bottom(hours_from_noon(&clock.now()))
}

/// Replaces the two power fields of a decoded meter metrics packet with
/// curve samples and re-serialises the body: same IV, same length, fresh
/// ciphertext. The caller re-frames and re-CRCs the result.
pub fn rewrite(clock: &dyn Clock, packet: &mut MeterMetricsPacket) -> Result<Vec<u8>> {
    let now = clock.now();
    let x = hours_from_noon(&now);
    packet.metrics.power_generation_watts = (1000.0 * top(x)).round() as i32;
    packet.metrics.power_export_watts = (1000.0 * bottom(x)).round() as i32;
    packet.bytes()
}

/// Periodically samples the curves into the batsignal gauges so the
/// scrape endpoint draws the insignia even between metrics packets.
pub async fn run_curve_sampler(shutdown: CancellationToken) {
    let clock = SystemClock;
    let mut interval = tokio::time::interval(Duration::from_secs(15));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {
                BATSIGNAL_TOP.set(sample_top(&clock));
                BATSIGNAL_BOTTOM.set(sample_bottom(&clock));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> f64 {
        let now = china_standard_time()
            .with_ymd_and_hms(2023, 11, 26, hour, minute, 0)
            .unwrap();
        hours_from_noon(&now)
    }

    #[test]
    fn noon_values() {
        let x = at(12, 0);
        assert_eq!(x, 0.0);
        assert_eq!(top(x), 2.25);
        assert_eq!(bottom(x), -3.0);
    }

    #[test]
    fn wing_values() {
        // x = 2: on the lower edge of the top wing arc
        let x = at(14, 0);
        let expected_top = 6.0 * 10.0_f64.sqrt() / 7.0 - 1.0 + 1.5
            - (3.0 * 10.0_f64.sqrt() / 7.0) * 3.0_f64.sqrt();
        assert!((top(x) - expected_top).abs() < 1e-12);
        let expected_bottom =
            1.0 - (3.0 * 33.0_f64.sqrt() - 7.0) / 112.0 * 4.0 - 3.0 + 1.0;
        assert!((bottom(x) - expected_bottom).abs() < 1e-12);
    }

    #[test]
    fn outside_the_cape_is_flat() {
        assert_eq!(top(at(4, 0)), 0.0);
        assert_eq!(bottom(at(20, 0)), 0.0);
        assert_eq!(top(at(19, 0)), 0.0);
    }

    #[test]
    fn curves_are_symmetric() {
        for (morning, evening) in [((9, 30), (14, 30)), ((7, 15), (16, 45)), ((11, 20), (12, 40))]
        {
            assert!((top(at(morning.0, morning.1)) - top(at(evening.0, evening.1))).abs() < 1e-12);
            assert!(
                (bottom(at(morning.0, morning.1)) - bottom(at(evening.0, evening.1))).abs()
                    < 1e-12
            );
        }
    }
}
