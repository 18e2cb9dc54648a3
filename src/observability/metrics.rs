use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub predictions_total: IntCounterVec,
    pub recommendation_latency_seconds: HistogramVec,
    pub bookings_total: IntCounterVec,
    pub available_drivers: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let predictions_total = IntCounterVec::new(
            Opts::new("predictions_total", "Price predictions served, by source"),
            &["source"],
        )
        .expect("valid predictions_total metric");

        let recommendation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "recommendation_latency_seconds",
                "Latency of mandi recommendation requests in seconds",
            ),
            &["outcome"],
        )
        .expect("valid recommendation_latency_seconds metric");

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Transport bookings by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let available_drivers = IntGauge::new(
            "available_drivers",
            "Drivers currently available for booking",
        )
        .expect("valid available_drivers metric");

        registry
            .register(Box::new(predictions_total.clone()))
            .expect("register predictions_total");
        registry
            .register(Box::new(recommendation_latency_seconds.clone()))
            .expect("register recommendation_latency_seconds");
        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(available_drivers.clone()))
            .expect("register available_drivers");

        Self {
            registry,
            predictions_total,
            recommendation_latency_seconds,
            bookings_total,
            available_drivers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
