use lazy_static::lazy_static;
use metrics_core::{Builder, Drain, Observe};
use metrics_runtime::observers::PrometheusBuilder;
use metrics_runtime::Controller;
use std::error::Error;
use std::sync::{Arc, Mutex};

lazy_static! {
    static ref METRICS: Arc<Mutex<Option<Metrics>>> = Arc::new(Mutex::new(None));
}

struct Metrics {
    controller: Controller,
    builder: PrometheusBuilder,
}

impl Metrics {
    fn new() -> Metrics {
        let receiver = metrics_runtime::Receiver::builder()
            .build()
            .expect("Metrics initialization failure");
        let controller = receiver.controller();
        receiver.install();

        Metrics {
            controller,
            builder: PrometheusBuilder::new().set_quantiles(&[0.0, 0.5, 0.9, 0.99, 1.0]),
        }
    }

    fn export(&mut self) -> String {
        let mut observer = self.builder.build();
        self.controller.observe(&mut observer);
        observer.drain()
    }
}

/// Installs the process-wide metrics receiver. Safe to call more than once,
/// later calls are ignored.
pub fn init_metrics() {
    let mut lock = METRICS.lock().expect("Failed to lock metrics");
    match lock.as_mut() {
        Some(_) => {
            log::warn!("Metrics already initialized - skipping initialization");
        }
        None => {
            *lock = Some(Metrics::new());
        }
    }
}

pub fn export_metrics_to_prometheus() -> Result<String, Box<dyn Error>> {
    let mut lock = METRICS.lock().expect("Failed to lock metrics");
    match lock.as_mut() {
        Some(metrics) => Ok(metrics.export()),
        None => Err("Metric exporter uninitialized".into()),
    }
}
