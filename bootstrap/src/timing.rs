//! Per-request phase timings rendered as a `Server-Timing` header.
//!
//! A [`Timings`] recorder is created at the start of one request, shared by
//! reference between the sub-operations of that request, and rendered once
//! when the response headers are assembled. Recording the same phase name
//! more than once appends a new entry rather than replacing the previous one,
//! so repeated work (e.g. a query issued twice) shows up as repeated metric
//! descriptors under the same name.
//!
//! ```text
//! root_loader;dur=12.3,getUserId;dur=0.4;desc="getUserId in root",find_user;dur=7.9;desc="find user in root"
//! ```

use http::HeaderName;
use http::header::{HeaderValue, InvalidHeaderValue};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

pub const SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

#[derive(Clone, Debug, PartialEq)]
pub struct TimingEntry {
    pub desc: Option<String>,
    pub duration_ms: f64,
}

/// Open-ended phase covering the whole recorder lifetime, measured at render time.
#[derive(Debug)]
struct RootPhase {
    name: String,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct Timings {
    root: Option<RootPhase>,
    phases: Mutex<IndexMap<String, Vec<TimingEntry>>>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder whose first descriptor spans from now until [`Timings::render`].
    pub fn with_root(name: impl Into<String>) -> Self {
        Self {
            root: Some(RootPhase {
                name: name.into(),
                started: Instant::now(),
            }),
            phases: Mutex::default(),
        }
    }

    /// Appends one entry for `phase`.
    pub fn record(&self, phase: &str, desc: Option<&str>, duration: Duration) {
        let entry = TimingEntry {
            desc: desc.map(str::to_owned),
            duration_ms: duration.as_secs_f64() * 1000.0,
        };
        tracing::trace!(phase, duration_ms = entry.duration_ms, "Recorded timing");

        self.phases
            .lock()
            .entry(phase.to_owned())
            .or_default()
            .push(entry);
    }

    /// Awaits `fut`, records how long it took under `phase`, and returns its output untouched.
    ///
    /// The entry is recorded whether the output is a success or an error.
    pub async fn time<F, T>(&self, phase: &str, desc: Option<&str>, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = fut.await;
        self.record(phase, desc, started.elapsed());
        output
    }

    /// Synchronous counterpart of [`Timings::time`].
    pub fn time_sync<F, T>(&self, phase: &str, desc: Option<&str>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let started = Instant::now();
        let output = f();
        self.record(phase, desc, started.elapsed());
        output
    }

    /// Entries recorded so far for `phase`, in call order.
    pub fn entries(&self, phase: &str) -> Vec<TimingEntry> {
        self.phases.lock().get(phase).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.phases.lock().is_empty()
    }

    pub fn render(&self) -> String {
        let mut descriptors = Vec::new();

        if let Some(root) = &self.root {
            let elapsed = root.started.elapsed().as_secs_f64() * 1000.0;
            descriptors.push(descriptor(&root.name, elapsed, None));
        }

        let phases = self.phases.lock();
        for (name, entries) in phases.iter() {
            for entry in entries {
                descriptors.push(descriptor(name, entry.duration_ms, entry.desc.as_deref()));
            }
        }

        descriptors.join(",")
    }

    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.render())
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn descriptor(name: &str, duration_ms: f64, desc: Option<&str>) -> String {
    let mut out = format!("{};dur={duration_ms:.1}", metric_name(name));
    if let Some(desc) = desc.filter(|d| !d.is_empty()) {
        out.push_str(";desc=\"");
        out.push_str(&escape_desc(desc));
        out.push('"');
    }
    out
}

/// Metric names must be HTTP tokens. Only the rendered header is rewritten: phases stay
/// keyed by their original name, so `entries("find user")` still finds them.
fn metric_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_desc(desc: &str) -> String {
    let mut out = String::with_capacity(desc.len());
    for c in desc.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_repeated_phase_appends() {
        let timings = Timings::new();
        timings.record("query", Some("first"), Duration::from_millis(3));
        timings.record("other", None, Duration::from_millis(1));
        timings.record("query", Some("second"), Duration::from_millis(5));
        timings.record("query", None, Duration::from_millis(2));

        let entries = timings.entries("query");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].desc.as_deref(), Some("first"));
        assert_eq!(entries[1].desc.as_deref(), Some("second"));
        assert_eq!(entries[2].desc, None);

        let rendered = timings.render();
        let descriptors: Vec<&str> = rendered.split(',').collect();
        assert_eq!(
            descriptors,
            vec![
                "query;dur=3.0;desc=\"first\"",
                "query;dur=5.0;desc=\"second\"",
                "query;dur=2.0",
                "other;dur=1.0",
            ]
        );
    }

    #[test]
    fn test_render_format() {
        let timings = Timings::new();
        timings.record("find user", Some("say \"hi\""), Duration::from_micros(1200));

        assert_eq!(timings.render(), "find_user;dur=1.2;desc=\"say \\\"hi\\\"\"");
        // only the rendered name is rewritten
        assert_eq!(timings.entries("find user").len(), 1);
        assert!(timings.entries("find_user").is_empty());
        assert!(timings.header_value().is_ok());
        assert_eq!(timings.to_string(), timings.render());
    }

    #[test]
    fn test_non_ascii_description_stays_header_safe() {
        let timings = Timings::new();
        timings.record("lookup", Some("café\n"), Duration::from_millis(1));

        assert_eq!(timings.render(), "lookup;dur=1.0;desc=\"caf??\"");
        assert!(timings.header_value().is_ok());
    }

    #[test]
    fn test_root_phase_rendered_first() {
        let timings = Timings::with_root("root loader");
        timings.record("getUserId", None, Duration::from_millis(1));

        let rendered = timings.render();
        assert!(rendered.starts_with("root_loader;dur="));
        assert!(rendered.ends_with(",getUserId;dur=1.0"));
        assert!(Timings::new().is_empty());
        assert!(!timings.is_empty());
    }

    #[tokio::test]
    async fn test_time_is_transparent() {
        let timings = Timings::new();

        let ok: Result<u32, String> = timings.time("work", Some("ok"), async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = timings
            .time("work", Some("err"), async { Err("boom".to_string()) })
            .await;
        assert_eq!(err, Err("boom".to_string()));

        let sync = timings.time_sync("work", None, || "value");
        assert_eq!(sync, "value");

        assert_eq!(timings.entries("work").len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_phases_in_one_request() {
        let timings = Timings::new();

        let (a, b) = tokio::join!(
            timings.time("db", Some("a"), async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                1
            }),
            timings.time("db", Some("b"), async { 2 }),
        );
        assert_eq!((a, b), (1, 2));

        let entries = timings.entries("db");
        assert_eq!(entries.len(), 2);
        // b completes first
        assert_eq!(entries[0].desc.as_deref(), Some("b"));
        assert_eq!(entries[1].desc.as_deref(), Some("a"));
    }

    #[test]
    fn test_parallel_threads_do_not_lose_entries() {
        let timings = Arc::new(Timings::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let timings = timings.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        timings.record("work", None, Duration::from_micros(10));
                    }
                });
            }
        });

        assert_eq!(timings.entries("work").len(), 400);
        assert_eq!(timings.render().split(',').count(), 400);
    }
}
