//! Incremental JSON array encoding for streamed query responses.
//!
//! Query results can span arbitrarily long intervals, so the response body is
//! encoded one element at a time with a single pending element of lookahead:
//! JSON arrays forbid trailing commas, so the previous element's separator can
//! only be written once the next element is known to exist. Memory stays O(1)
//! in the stream length.
//!
//! Elements are `{"x": "<ISO-8601>", "y": <value-or-vector>}` objects. The
//! sync encoder is drained on a blocking task and bridged into the response
//! body through a bounded channel; when the client goes away the receive side
//! drops, the producer stops, and the underlying read handle is released.

use axum::body::Body;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

use tidemark_core::{EngineError, EngineResult};

/// One element of a streamed response: timestamp plus the already-projected
/// `y` value (full vector or a single channel's scalar).
pub type Point = (DateTime<Utc>, Value);

enum State {
    Open,
    Streaming,
    Closed,
}

/// Lazy JSON array encoder with one pending element of lookahead.
pub struct JsArray<I> {
    inner: I,
    pending: Option<Point>,
    state: State,
}

impl<I> JsArray<I>
where
    I: Iterator<Item = EngineResult<Point>>,
{
    /// Wrap a point stream for encoding.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: None,
            state: State::Open,
        }
    }
}

fn format_element((timestamp, y): &Point) -> String {
    format!("\t{{\"x\": \"{}\", \"y\": {}}}", timestamp.to_rfc3339(), y)
}

impl<I> Iterator for JsArray<I>
where
    I: Iterator<Item = EngineResult<Point>>,
{
    type Item = EngineResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Open => match self.inner.next() {
                None => {
                    self.state = State::Closed;
                    Some(Ok(Bytes::from_static(b"[]")))
                }
                Some(Err(err)) => {
                    self.state = State::Closed;
                    Some(Err(err))
                }
                Some(Ok(point)) => {
                    self.pending = Some(point);
                    self.state = State::Streaming;
                    Some(Ok(Bytes::from_static(b"[\n")))
                }
            },
            State::Streaming => match self.inner.next() {
                // The next element exists, so the pending one is not last:
                // it gets its trailing comma.
                Some(Ok(point)) => self
                    .pending
                    .replace(point)
                    .map(|element| Ok(Bytes::from(format!("{},\n", format_element(&element))))),
                None => {
                    self.state = State::Closed;
                    self.pending
                        .take()
                        .map(|element| Ok(Bytes::from(format!("{}\n]", format_element(&element)))))
                }
                Some(Err(err)) => {
                    self.state = State::Closed;
                    Some(Err(err))
                }
            },
            State::Closed => None,
        }
    }
}

/// Bridge a sync chunk iterator into a streaming response body.
///
/// The iterator runs on a blocking task; chunks flow through a bounded
/// channel. A dropped receiver (client disconnect) ends the producer at its
/// next send, dropping the iterator and everything it holds open.
pub fn stream_body<I>(chunks: I) -> Body
where
    I: Iterator<Item = EngineResult<Bytes>> + Send + 'static,
{
    let (tx, rx) = tokio::sync::mpsc::channel::<EngineResult<Bytes>>(16);

    tokio::task::spawn_blocking(move || {
        for chunk in chunks {
            let failed = chunk.is_err();
            if tx.blocking_send(chunk).is_err() {
                tracing::debug!("client went away mid-stream");
                break;
            }
            if failed {
                break;
            }
        }
    });

    Body::from_stream(ReceiverStream::new(rx))
}

/// Project samples to response points: the full value vector, or a single
/// channel's value when an index is given.
pub fn project_samples(
    samples: tidemark_core::SampleIter,
    channel_index: Option<usize>,
) -> impl Iterator<Item = EngineResult<Point>> + Send + 'static {
    samples.map(move |result| {
        let sample = result?;
        let y = match channel_index {
            None => Value::from(sample.values),
            Some(index) => {
                let value = sample.values.get(index).copied().ok_or_else(|| {
                    EngineError::Corrupt(format!(
                        "sample at {} has {} values, channel index {} out of range",
                        sample.timestamp.to_rfc3339(),
                        sample.values.len(),
                        index
                    ))
                })?;
                Value::from(value)
            }
        };
        Ok((sample.timestamp, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn point(min: u32, y: Value) -> EngineResult<Point> {
        Ok((Utc.with_ymd_and_hms(2021, 1, 1, 0, min, 0).unwrap(), y))
    }

    fn encode(points: Vec<EngineResult<Point>>) -> String {
        JsArray::new(points.into_iter())
            .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn empty_stream_encodes_empty_array() {
        assert_eq!(encode(vec![]), "[]");
    }

    #[test]
    fn single_element_has_no_comma() {
        let body = encode(vec![point(0, json!([1.0, 2.0]))]);
        assert_eq!(body.matches(',').count(), 1); // only inside the vector
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["y"], json!([1.0, 2.0]));
    }

    #[test]
    fn n_elements_have_n_minus_one_separators() {
        let body = encode(vec![
            point(0, json!(1.0)),
            point(1, json!(2.0)),
            point(2, json!(3.0)),
        ]);

        let parsed: Value = serde_json::from_str(&body).unwrap();
        let elements = parsed.as_array().unwrap();
        assert_eq!(elements.len(), 3);
        // Scalar y values, so every comma is an element separator.
        assert_eq!(body.matches(',').count(), 2);
        assert_eq!(elements[1]["x"], "2021-01-01T00:01:00+00:00");
        assert_eq!(elements[2]["y"], 3.0);
    }

    #[test]
    fn elements_stream_one_chunk_each() {
        let chunks: Vec<_> = JsArray::new(
            vec![point(0, json!(1.0)), point(1, json!(2.0))].into_iter(),
        )
        .collect();
        // Opening bracket, first element, last element + close.
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn error_terminates_stream() {
        let points = vec![
            point(0, json!(1.0)),
            Err(EngineError::Corrupt("bad record".to_string())),
            point(2, json!(3.0)),
        ];

        let mut stream = JsArray::new(points.into_iter());
        assert!(stream.next().unwrap().is_ok()); // "[\n"
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }

    #[test]
    fn projection_selects_channel_component() {
        let samples: tidemark_core::SampleIter = Box::new(
            vec![Ok(tidemark_core::Sample::new(
                Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
                vec![1.0, 2.0, 3.0],
            ))]
            .into_iter(),
        );

        let points: Vec<_> = project_samples(samples, Some(1)).collect();
        assert_eq!(points[0].as_ref().unwrap().1, json!(2.0));
    }

    #[test]
    fn projection_out_of_range_is_corrupt() {
        let samples: tidemark_core::SampleIter = Box::new(
            vec![Ok(tidemark_core::Sample::new(
                Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
                vec![1.0],
            ))]
            .into_iter(),
        );

        let points: Vec<_> = project_samples(samples, Some(5)).collect();
        assert!(matches!(points[0], Err(EngineError::Corrupt(_))));
    }
}
