use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::geocode::ReverseGeocoder;
use crate::models::booking::Booking;
use crate::models::driver::Driver;
use crate::models::farmer::Farmer;
use crate::models::market::Market;
use crate::models::price::PriceRecord;
use crate::models::tracking::TrackingEvent;
use crate::observability::metrics::Metrics;
use crate::pricing::PriceEstimator;

pub struct AppState {
    pub config: Config,
    pub markets: DashMap<Uuid, Market>,
    pub prices: DashMap<Uuid, PriceRecord>,
    pub drivers: DashMap<Uuid, Driver>,
    pub farmers: DashMap<Uuid, Farmer>,
    pub bookings: DashMap<Uuid, Booking>,
    pub estimator: PriceEstimator,
    pub geocoder: Option<Arc<dyn ReverseGeocoder>>,
    pub tracking_events_tx: broadcast::Sender<TrackingEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: Config,
        estimator: PriceEstimator,
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
    ) -> Self {
        let (tracking_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            config,
            markets: DashMap::new(),
            prices: DashMap::new(),
            drivers: DashMap::new(),
            farmers: DashMap::new(),
            bookings: DashMap::new(),
            estimator,
            geocoder,
            tracking_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn market_snapshot(&self) -> Vec<Market> {
        self.markets
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn price_snapshot(&self) -> Vec<PriceRecord> {
        self.prices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn driver_snapshot(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Looks up a driver's storage key by the human-facing code.
    pub fn driver_key(&self, driver_id: &str) -> Option<Uuid> {
        self.drivers
            .iter()
            .find(|entry| entry.value().driver_id == driver_id)
            .map(|entry| *entry.key())
    }

    pub fn refresh_available_drivers_gauge(&self) {
        let available = self
            .drivers
            .iter()
            .filter(|entry| entry.value().is_available)
            .count();
        self.metrics.available_drivers.set(available as i64);
    }
}
