//! Server-sent event decoding for long-lived streamed responses.
//!
//! [`decode_events`] turns a raw chunk stream into an ordered [`EventStream`]. Line framing
//! lives in [`EventDecoder`], which is transport-agnostic and can be driven directly; this
//! module adds the transport concerns: idle and lifetime deadlines, surfacing upstream errors
//! as terminal failures, and releasing the body as soon as the consumer drops the stream.

pub mod decoder;
pub mod progress;

pub use decoder::EventDecoder;
pub use progress::JobProgress;

// crates.io
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use tokio::time::{self, Instant};
// self
use crate::{_prelude::*, config::ClientConfig, http::ChunkStream};

/// Lazy, ordered sequence of decoded events; ends after `Done`, an error, or end of body.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// One application-level event decoded from a `data:` line.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
	/// Incremental text produced by the upstream.
	ContentDelta(String),
	/// Upstream-reported failure; terminal.
	Error(String),
	/// Structured payload without a text delta, such as job progress.
	Raw(Map<String, Value>),
	/// The `[DONE]` sentinel; terminal.
	Done,
}
impl StreamEvent {
	/// Whether no event can follow this one.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Error(_) | Self::Done)
	}
}

/// Failures that end a stream after it was opened successfully.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StreamError {
	/// The upstream sent an event carrying an `error` field.
	#[error("{message}")]
	Upstream {
		/// Message reported by the upstream.
		message: String,
	},
	/// No data arrived within the idle timeout.
	#[error("Stream stalled: no data received for {idle:?}.")]
	IdleTimeout {
		/// Idle timeout that elapsed.
		idle: Duration,
	},
	/// The stream outlived its maximum duration.
	#[error("Stream exceeded its maximum duration of {limit:?}.")]
	MaxDuration {
		/// Lifetime cap that elapsed.
		limit: Duration,
	},
	/// A line grew past the limit without a newline.
	#[error("Stream line exceeded {limit} bytes without a newline.")]
	LineTooLong {
		/// Maximum line length in bytes.
		limit: usize,
	},
}

/// Deadlines enforced while a stream is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLimits {
	/// Longest gap allowed between two chunks.
	pub idle_timeout: Duration,
	/// Longest total lifetime.
	pub max_duration: Duration,
	/// Longest line, in bytes.
	pub max_line: usize,
}
impl From<&ClientConfig> for StreamLimits {
	fn from(config: &ClientConfig) -> Self {
		Self {
			idle_timeout: config.stream_idle_timeout,
			max_duration: config.stream_max_duration,
			max_line: EventDecoder::DEFAULT_MAX_LINE,
		}
	}
}

/// Decodes `body` into events under `limits`.
///
/// `Error` events are surfaced as `Err(Error::Stream(StreamError::Upstream { .. }))` and end
/// the sequence, as do transport failures and elapsed deadlines. A body that ends without the
/// `[DONE]` sentinel ends the sequence cleanly.
pub fn decode_events(body: ChunkStream, limits: StreamLimits) -> EventStream {
	Box::pin(events(body, limits))
}

fn events(
	mut body: ChunkStream,
	limits: StreamLimits,
) -> impl Stream<Item = Result<StreamEvent>> + Send {
	let deadline = Instant::now() + limits.max_duration;

	stream! {
		let mut decoder = EventDecoder::with_max_line(limits.max_line);

		while !decoder.is_finished() {
			let decoded = match next_chunk(&mut body, limits, deadline).await {
				Ok(Some(chunk)) => decoder.feed(&chunk).map_err(Error::from),
				Ok(None) => Ok(decoder.finish()),
				Err(e) => Err(e),
			};
			let events = match decoded {
				Ok(events) => events,
				Err(e) => {
					tracing::debug!(error = %e, "Stream ended abnormally; buffer dropped.");
					yield Err(e);
					return;
				},
			};

			for event in events {
				if let StreamEvent::Error(message) = event {
					tracing::debug!(%message, "Upstream reported an error mid-stream.");
					yield Err(StreamError::Upstream { message }.into());
					return;
				}

				yield Ok(event);
			}
		}
	}
}

async fn next_chunk(
	body: &mut ChunkStream,
	limits: StreamLimits,
	deadline: Instant,
) -> Result<Option<Vec<u8>>> {
	let remaining = deadline.saturating_duration_since(Instant::now());

	if remaining.is_zero() {
		return Err(StreamError::MaxDuration { limit: limits.max_duration }.into());
	}

	let wait = limits.idle_timeout.min(remaining);

	match time::timeout(wait, body.next()).await {
		Ok(Some(chunk)) => Ok(Some(chunk?)),
		Ok(None) => Ok(None),
		Err(_) if wait < limits.idle_timeout =>
			Err(StreamError::MaxDuration { limit: limits.max_duration }.into()),
		Err(_) => Err(StreamError::IdleTimeout { idle: limits.idle_timeout }.into()),
	}
}
