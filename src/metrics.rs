use once_cell::sync::Lazy;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Registry, TextEncoder};

pub static METRICS: Lazy<LoaderMetrics> = Lazy::new(LoaderMetrics::init);

pub struct LoaderMetrics {
    pub registry: Registry,
    pub batches_total: Counter<u64>,
    pub batch_entities: Histogram<u64>,
    pub orphan_rows_total: Counter<u64>,
    pub fetch_duration: Histogram<f64>,
    _provider: Option<SdkMeterProvider>,
}

impl LoaderMetrics {
    pub fn init() -> Self {
        let registry = Registry::new();
        let (provider, meter): (Option<SdkMeterProvider>, Meter) =
            match opentelemetry_prometheus::exporter().with_registry(registry.clone()).build() {
                Ok(exporter) => {
                    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
                    let meter = provider.meter("lifeguard_bulk");
                    (Some(provider), meter)
                }
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, using the global meter: {e}");
                    (None, global::meter("lifeguard_bulk"))
                }
            };

        let batches_total = meter
            .u64_counter("lifeguard_bulk_batches_total")
            .with_description("Batch relation loads executed")
            .build();

        let batch_entities = meter
            .u64_histogram("lifeguard_bulk_batch_entities")
            .with_description("Owners resolved per batch load")
            .build();

        let orphan_rows_total = meter
            .u64_counter("lifeguard_bulk_orphan_rows_total")
            .with_description("Fetched rows that matched no owner of their batch")
            .build();

        let fetch_duration = meter
            .f64_histogram("lifeguard_bulk_fetch_duration_seconds")
            .with_description("Duration of batch fetches")
            .build();

        Self {
            registry,
            batches_total,
            batch_entities,
            orphan_rows_total,
            fetch_duration,
            _provider: provider,
        }
    }

    pub fn record_batch(&self, relation: &str, owners: usize, orphan_rows: usize) {
        let attrs = [KeyValue::new("relation", relation.to_string())];
        self.batches_total.add(1, &attrs);
        self.batch_entities.record(owners as u64, &attrs);
        if orphan_rows > 0 {
            self.orphan_rows_total.add(orphan_rows as u64, &attrs);
        }
    }

    pub fn record_fetch(&self, elapsed: std::time::Duration) {
        self.fetch_duration.record(elapsed.as_secs_f64(), &[]);
    }

    /// Current metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
