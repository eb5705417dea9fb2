//! The event and warning queues from `spec.md` §4.1 ("Events", "Warnings").
//!
//! The real event-queue *consumer* (a telemetry sink) is out of scope per
//! `spec.md` §1; what's in scope is the shape of what gets pushed and the
//! "push-one-value capability" contract a consumer is handed. We model
//! that capability as a plain `Fn` trait object rather than a channel, so
//! a caller can wire it to a channel, a counter, a log line, or anything
//! else without this crate committing to one.

use std::fmt;
use std::sync::Arc;

/// One entry of the event enum named in `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    HostnameLookup,
    HostnameResolved,
    Connecting,
    Connected,
    StartTls,
    TlsEstablished,
    PacketRead,
    PacketSent,
    HttpSendMessage,
    HttpMessageReceived,
    HttpContentLength,
    HttpRedirect,
    HttpChunkedStart,
    HttpChunkSize,
    HttpChunkedDataReceived,
    HttpChunkedEnd,
    HttpFootersReceived,
    ChannelClosed,
    FtpSendMessage,
    FtpMessageReceived,
}

/// A single event pushed to the event queue. Every event carries at least
/// `kind` (the spec's `event` enum), `source` (component id) and `id`
/// (object id); `detail` carries whatever event-specific fields `spec.md`
/// names for that kind (e.g. `read`/`total_read`/`total_to_read` for
/// `packet-read`), represented as `Dict` since this crate doesn't have a
/// structured per-event payload type to spare.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub source: u32,
    pub id: u64,
    pub detail: crate::value::Dict,
}

impl Event {
    pub fn new(kind: EventKind, source: u32, id: u64) -> Self {
        Event {
            kind,
            source,
            id,
            detail: crate::value::Dict::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        crate::value::dict_set(&mut self.detail, key, value);
        self
    }
}

/// The two warning kinds from `spec.md` §4.1 ("Warnings").
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// One atomic operation exceeded `warningThresholdUs`.
    Timeout { measured_us: u64, threshold_us: u64 },
    /// A transfer of at least 1 kB observed throughput below
    /// `warningThresholdBps`, over an interval of at least `minEventUs`.
    Throughput { bytes_per_sec: f64, threshold_bps: f64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Timeout { measured_us, threshold_us } => {
                write!(f, "timeout-warning: {}us over threshold {}us", measured_us, threshold_us)
            }
            Warning::Throughput { bytes_per_sec, threshold_bps } => {
                write!(f, "throughput-warning: {:.1}B/s under threshold {:.1}B/s", bytes_per_sec, threshold_bps)
            }
        }
    }
}

/// A "push one value" sink for [`Event`]s, shared (and reference-counted)
/// across the sockets that feed it — per `spec.md` §5, two FTP sockets may
/// share one event queue.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// A sink for [`Warning`]s, carrying the caller-supplied opaque `arg`
/// alongside the measurement, as `spec.md` requires.
pub type WarningSink = Arc<dyn Fn(Warning, Option<String>) + Send + Sync>;
