mod metrics;

pub use metrics::{MetricsCSV, TrainLogger};
