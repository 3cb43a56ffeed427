//! Line-protocol encoder for the time-series backend.
//!
//! Each sample becomes three RESP-style simple strings:
//!
//! ```text
//! +cpu.user host=web-1 region=eu\r\n
//! +20240102T030405\r\n
//! +0.25\r\n
//! ```
//!
//! The encoder is independent of the connection layer; its output is what
//! producers hand to [`ConnectionPool::write`](crate::ConnectionPool::write).

use bytes::{BufMut, Bytes, BytesMut};
use chrono::DateTime;
use std::fmt::Write;

use crate::error::{Result, TsdbError};

/// Label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A `name=value` label of a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Build the series line (`<metric>[ tag=value]*`) from a label set.
///
/// Labels whose value contains a space are left out; the backend splits tags
/// on spaces.
pub fn series_name(labels: &[Label]) -> Result<String> {
    let metric = labels
        .iter()
        .find(|l| l.name == METRIC_NAME_LABEL)
        .map(|l| l.value.as_str())
        .ok_or_else(|| TsdbError::Encode(format!("missing {} label", METRIC_NAME_LABEL)))?;

    let mut name = String::from(metric);
    for label in labels.iter().filter(|l| l.name != METRIC_NAME_LABEL) {
        if label.value.contains(' ') {
            continue;
        }
        // Writing to a String cannot fail.
        let _ = write!(name, " {}={}", label.name, label.value);
    }
    Ok(name)
}

/// Encode every non-NaN sample of one series, one buffer per sample.
pub fn encode_series(labels: &[Label], samples: &[Sample]) -> Result<Vec<Bytes>> {
    let series = series_name(labels)?;
    samples
        .iter()
        .filter(|s| !s.value.is_nan())
        .map(|s| encode_sample(&series, s))
        .collect()
}

/// Encode one sample under an already built series line.
pub fn encode_sample(series: &str, sample: &Sample) -> Result<Bytes> {
    let timestamp = DateTime::from_timestamp_millis(sample.timestamp_ms).ok_or_else(|| {
        TsdbError::Encode(format!("timestamp out of range: {}", sample.timestamp_ms))
    })?;

    let mut buf = BytesMut::with_capacity(series.len() + 48);
    put_simple_string(&mut buf, series);
    put_simple_string(&mut buf, &timestamp.format(TIMESTAMP_FORMAT).to_string());
    put_simple_string(&mut buf, &sample.value.to_string());
    Ok(buf.freeze())
}

fn put_simple_string(buf: &mut BytesMut, s: &str) {
    buf.put_u8(b'+');
    buf.put_slice(s.as_bytes());
    buf.put_slice(b"\r\n");
}
