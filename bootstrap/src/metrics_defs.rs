use metrics::Unit;
use shared::metrics_defs::{MetricDef, MetricType};

pub const BOOTSTRAP_DURATION: MetricDef = MetricDef {
    name: "bootstrap.duration",
    metric_type: MetricType::Histogram,
    unit: Unit::Seconds,
    description: "Time to resolve identity, toast and collaborators for one page load",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    unit: Unit::Count,
    description: "Number of requests currently being bootstrapped",
};

pub const SESSIONS_ORPHANED: MetricDef = MetricDef {
    name: "session.orphaned",
    metric_type: MetricType::Counter,
    unit: Unit::Count,
    description: "Sessions that referenced a user missing from the user store and were invalidated",
};

pub const TOASTS_MALFORMED: MetricDef = MetricDef {
    name: "toast.malformed",
    metric_type: MetricType::Counter,
    unit: Unit::Count,
    description: "Toast cookies that failed signature or payload decoding",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BOOTSTRAP_DURATION,
    REQUESTS_INFLIGHT,
    SESSIONS_ORPHANED,
    TOASTS_MALFORMED,
];
