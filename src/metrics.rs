//! Metric registration and the scrape endpoint.
//!
//! Handlers record observations through the [`Telemetry`] trait so the
//! protocol layer never names prometheus types; the prometheus
//! implementation resolves metric names through tables built once at
//! first use. Unknown-field gauges are generated from index tables
//! rather than declared longhand.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use log::warn;
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, GaugeVec, IntCounter, IntCounterVec, TextEncoder,
};
use tokio_util::sync::CancellationToken;

pub const METRICS_PORT: u16 = 14028;
const METRICS_TIMEOUT: Duration = Duration::from_secs(2);

pub const LABEL_NAMES: &[&str] = &["device", "model", "serial"];

// meter gauges
pub const ENERGY_EXPORT_TOTAL: &str = "energy_export_decawatt_hours_total";
pub const ENERGY_GENERATION_TOTAL: &str = "energy_generation_decawatt_hours_total";
pub const SUM_ENERGY_GENERATION_AND_EXPORT_TOTAL: &str =
    "sum_of_energy_generation_and_export_decawatt_hours_total";
pub const ENERGY_IMPORT_TOTAL: &str = "energy_import_decawatt_hours_total";
pub const SUM_ENERGY_IMPORT_LESS_GENERATION_TOTAL: &str =
    "sum_of_energy_import_less_generation_decawatt_hours_total";
pub const POWER_EXPORT_WATTS: &str = "power_export_watts";
pub const POWER_GENERATION_WATTS: &str = "power_generation_watts";
pub const SUM_POWER_GENERATION_AND_EXPORT_WATTS: &str =
    "sum_of_power_generation_and_export_watts";

// inverter gauges
pub const INVERTER_VOLTAGE_INPUT_DC: &str = "inverter_input_voltage_dc_decivolts";
pub const INVERTER_CURRENT_INPUT_DC: &str = "inverter_input_current_dc_deciamps";
pub const INVERTER_VOLTAGE_OUTPUT_AC: &str = "inverter_output_voltage_ac_decivolts";
pub const INVERTER_CURRENT_OUTPUT_AC: &str = "inverter_output_current_ac_deciamps";
pub const INVERTER_FREQUENCY_OUTPUT_AC: &str = "inverter_output_frequency_ac_centihertz";
pub const INVERTER_POWER_OUTPUT_WATTS: &str = "inverter_power_output_watts";
pub const INVERTER_INTERNAL_TEMPERATURE: &str =
    "inverter_internal_temperature_decidegrees_celsius";
pub const INVERTER_ENERGY_OUTPUT_DAY: &str = "inverter_energy_output_hectowatt_hours_day";
pub const INVERTER_ENERGY_OUTPUT_TOTAL: &str = "inverter_energy_output_hectowatt_hours_total";
pub const INVERTER_UPTIME_HOURS_TOTAL: &str = "inverter_uptime_hours_total";
pub const INVERTER_RSSI_PERCENT: &str = "inverter_rssi_percent";

// counters
pub const INBOUND_UNKNOWN_PACKETS_TOTAL: &str = "inbound_unknown_packets_total";
pub const OUTBOUND_UNKNOWN_PACKETS_TOTAL: &str = "outbound_unknown_packets_total";
pub const INVERTER_TIME_SYNC_PACKETS_TOTAL: &str = "inverter_time_sync_packets_total";
pub const INVERTER_METRICS_PACKETS_TOTAL: &str = "inverter_metrics_packets_total";

/// Indices of the unknown meter metric fields exposed as gauges.
pub const METER_UNKNOWN_INDICES: [u8; 8] = [5, 6, 7, 8, 9, 10, 11, 12];

/// Indices of the unknown inverter metric fields exposed as gauges. There
/// is no field 6 in the reverse-engineered layout.
pub fn inverter_unknown_indices() -> impl Iterator<Item = u8> {
    (0..=51).filter(|i| *i != 6)
}

pub fn meter_unknown_gauge_name(index: u8) -> String {
    format!("meter_unknown_int_{index}")
}

pub fn inverter_unknown_gauge_name(index: u8) -> String {
    format!("inverter_unknown_int_{index}")
}

/// Observation labels shared by every device-scoped metric.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Labels {
    pub device: String,
    pub model: String,
    pub serial: String,
}

impl Labels {
    fn values(&self) -> [&str; 3] {
        [&self.device, &self.model, &self.serial]
    }
}

/// Sink for named observations. Decouples the packet handlers from the
/// metrics library.
pub trait Telemetry: Send + Sync {
    fn gauge(&self, name: &str, labels: &Labels, value: f64);
    fn inc_counter(&self, name: &str, labels: &Labels);
    fn inc(&self, name: &str);
}

static NAMED_GAUGES: &[(&str, &str)] = &[
    (ENERGY_EXPORT_TOTAL, "Cumulative energy exported to the grid."),
    (ENERGY_GENERATION_TOTAL, "Cumulative energy generated."),
    (
        SUM_ENERGY_GENERATION_AND_EXPORT_TOTAL,
        "Sum of cumulative energy generated and exported.",
    ),
    (ENERGY_IMPORT_TOTAL, "Cumulative energy imported from the grid."),
    (
        SUM_ENERGY_IMPORT_LESS_GENERATION_TOTAL,
        "Cumulative energy imported less energy generated.",
    ),
    (POWER_EXPORT_WATTS, "Power exported to the grid."),
    (POWER_GENERATION_WATTS, "Power generated."),
    (
        SUM_POWER_GENERATION_AND_EXPORT_WATTS,
        "Sum of power generated and exported.",
    ),
    (INVERTER_VOLTAGE_INPUT_DC, "Input DC voltage to inverter."),
    (INVERTER_CURRENT_INPUT_DC, "Input DC current to inverter."),
    (INVERTER_VOLTAGE_OUTPUT_AC, "Output AC voltage from inverter."),
    (INVERTER_CURRENT_OUTPUT_AC, "Output AC current from inverter."),
    (
        INVERTER_FREQUENCY_OUTPUT_AC,
        "Output AC frequency from inverter.",
    ),
    (INVERTER_POWER_OUTPUT_WATTS, "Power output from inverter."),
    (
        INVERTER_INTERNAL_TEMPERATURE,
        "Internal temperature of inverter.",
    ),
    (INVERTER_ENERGY_OUTPUT_DAY, "Cumulative energy output today."),
    (INVERTER_ENERGY_OUTPUT_TOTAL, "Cumulative energy output total."),
    (INVERTER_UPTIME_HOURS_TOTAL, "Inverter total operation time."),
    (
        INVERTER_RSSI_PERCENT,
        "Inverter WLAN received signal strength indicator.",
    ),
];

static GAUGES: Lazy<HashMap<String, GaugeVec>> = Lazy::new(|| {
    let mut gauges = HashMap::new();
    for (name, help) in NAMED_GAUGES {
        let gauge = register_gauge_vec!(*name, *help, LABEL_NAMES)
            .expect("gauge registration is infallible at startup");
        gauges.insert((*name).to_string(), gauge);
    }
    for index in METER_UNKNOWN_INDICES {
        let name = meter_unknown_gauge_name(index);
        let gauge = register_gauge_vec!(name.clone(), "Unidentified meter field.", LABEL_NAMES)
            .expect("gauge registration is infallible at startup");
        gauges.insert(name, gauge);
    }
    for index in inverter_unknown_indices() {
        let name = inverter_unknown_gauge_name(index);
        let gauge =
            register_gauge_vec!(name.clone(), "Unidentified inverter field.", LABEL_NAMES)
                .expect("gauge registration is infallible at startup");
        gauges.insert(name, gauge);
    }
    gauges
});

static COUNTER_VECS: Lazy<HashMap<String, IntCounterVec>> = Lazy::new(|| {
    let mut counters = HashMap::new();
    for (name, help) in [
        (
            INVERTER_TIME_SYNC_PACKETS_TOTAL,
            "Count of outbound time sync packets.",
        ),
        (
            INVERTER_METRICS_PACKETS_TOTAL,
            "Count of outbound metrics packets.",
        ),
    ] {
        let counter = register_int_counter_vec!(name, help, LABEL_NAMES)
            .expect("counter registration is infallible at startup");
        counters.insert(name.to_string(), counter);
    }
    counters
});

static COUNTERS: Lazy<HashMap<String, IntCounter>> = Lazy::new(|| {
    let mut counters = HashMap::new();
    for (name, help) in [
        (
            INBOUND_UNKNOWN_PACKETS_TOTAL,
            "Count of inbound unknown packets.",
        ),
        (
            OUTBOUND_UNKNOWN_PACKETS_TOTAL,
            "Count of outbound unknown packets.",
        ),
    ] {
        let counter = register_int_counter!(name, help)
            .expect("counter registration is infallible at startup");
        counters.insert(name.to_string(), counter);
    }
    counters
});

/// Curve gauges only registered when batsignal mode is active.
pub static BATSIGNAL_TOP: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("batsignal_top", "Top of the batsignal")
        .expect("gauge registration is infallible at startup")
});
pub static BATSIGNAL_BOTTOM: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("batsignal_bottom", "Bottom of the batsignal")
        .expect("gauge registration is infallible at startup")
});

/// Telemetry implementation backed by the process-wide prometheus
/// registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Prometheus;

impl Telemetry for Prometheus {
    fn gauge(&self, name: &str, labels: &Labels, value: f64) {
        match GAUGES.get(name) {
            Some(gauge) => gauge.with_label_values(&labels.values()).set(value),
            None => warn!("observation for unregistered gauge {name}"),
        }
    }

    fn inc_counter(&self, name: &str, labels: &Labels) {
        match COUNTER_VECS.get(name) {
            Some(counter) => counter.with_label_values(&labels.values()).inc(),
            None => warn!("observation for unregistered counter {name}"),
        }
    }

    fn inc(&self, name: &str) {
        match COUNTERS.get(name) {
            Some(counter) => counter.inc(),
            None => warn!("observation for unregistered counter {name}"),
        }
    }
}

/// Telemetry implementation that records observations in memory. Backs
/// handler tests.
#[derive(Debug, Default)]
pub struct Recorder {
    pub gauges: Mutex<Vec<(String, Labels, f64)>>,
    pub counters: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        self.gauges
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, v)| *v)
    }
}

impl Telemetry for Recorder {
    fn gauge(&self, name: &str, labels: &Labels, value: f64) {
        self.gauges
            .lock()
            .unwrap()
            .push((name.to_string(), labels.clone(), value));
    }

    fn inc_counter(&self, name: &str, _labels: &Labels) {
        self.counters.lock().unwrap().push(name.to_string());
    }

    fn inc(&self, name: &str) {
        self.counters.lock().unwrap().push(name.to_string());
    }
}

fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn scrape_handler() -> Result<String, StatusCode> {
    gather_text().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serves the prometheus scrape endpoint until the token is cancelled.
pub async fn serve_scrape_endpoint(shutdown: CancellationToken) -> anyhow::Result<()> {
    let router = Router::new().route("/metrics", get(scrape_handler));
    let addr = SocketAddr::from(([0, 0, 0, 0], METRICS_PORT));
    axum::Server::try_bind(&addr)?
        .http1_header_read_timeout(METRICS_TIMEOUT)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
