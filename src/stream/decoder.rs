//! Line framing for `data:`-prefixed event streams.

// self
use crate::{
	_prelude::*,
	stream::{StreamError, StreamEvent},
};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Single-use decoder that reassembles chunks into [`StreamEvent`]s.
///
/// Chunks are buffered as bytes and split on `\n`, so neither a JSON payload nor a multi-byte
/// character split across chunks is ever decoded half-way. Once a terminal event is produced the
/// decoder ignores all further input. An unterminated line longer than the configured maximum
/// fails the decode instead of growing the buffer without bound.
#[derive(Debug)]
pub struct EventDecoder {
	buffer: Vec<u8>,
	scanned: usize,
	max_line: usize,
	finished: bool,
}
impl EventDecoder {
	/// Longest unterminated line accepted by default, in bytes.
	pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

	/// Creates a decoder that rejects lines longer than `max_line` bytes.
	pub fn with_max_line(max_line: usize) -> Self {
		Self { buffer: Vec::new(), scanned: 0, max_line, finished: false }
	}

	/// Appends `chunk` and returns the events of every line it completed, in order.
	pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, StreamError> {
		let mut events = Vec::new();

		if self.finished {
			return Ok(events);
		}

		self.buffer.extend_from_slice(chunk);

		let mut start = 0;

		while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
			let end = self.scanned + offset;
			let event = decode_bytes(&self.buffer[start..end]);

			start = end + 1;
			self.scanned = start;

			if let Some(event) = event {
				let terminal = event.is_terminal();

				events.push(event);

				if terminal {
					self.close();

					return Ok(events);
				}
			}
		}

		self.buffer.drain(..start);
		self.scanned = self.buffer.len();

		if self.buffer.len() > self.max_line {
			self.close();

			return Err(StreamError::LineTooLong { limit: self.max_line });
		}

		Ok(events)
	}

	/// Processes the trailing fragment as a final line and closes the decoder.
	pub fn finish(&mut self) -> Vec<StreamEvent> {
		if self.finished {
			return Vec::new();
		}

		let event = decode_bytes(&self.buffer);

		self.close();

		event.into_iter().collect()
	}

	/// Whether a terminal event was produced or the decoder was closed.
	pub fn is_finished(&self) -> bool {
		self.finished
	}

	fn close(&mut self) {
		self.finished = true;
		self.scanned = 0;
		self.buffer = Vec::new();
	}
}
impl Default for EventDecoder {
	fn default() -> Self {
		Self::with_max_line(Self::DEFAULT_MAX_LINE)
	}
}

fn decode_bytes(line: &[u8]) -> Option<StreamEvent> {
	decode_line(&String::from_utf8_lossy(line))
}

/// Decodes one complete line; `None` for blank, keep-alive, and non-`data:` lines.
pub fn decode_line(line: &str) -> Option<StreamEvent> {
	let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();

	if payload.is_empty() {
		return None;
	}
	if payload == DONE_SENTINEL {
		return Some(StreamEvent::Done);
	}

	match serde_json::from_str::<Value>(payload) {
		Ok(Value::Object(object)) => decode_object(object),
		// Malformed or non-object payloads are passed through as text.
		_ => Some(StreamEvent::ContentDelta(payload.to_owned())),
	}
}

fn decode_object(object: Map<String, Value>) -> Option<StreamEvent> {
	if let Some(message) = object.get("error").and_then(error_message) {
		return Some(StreamEvent::Error(message));
	}

	match delta(&object) {
		Some(text) if text.is_empty() => None,
		Some(text) => Some(StreamEvent::ContentDelta(text.to_owned())),
		None if object.contains_key("choices") => None,
		None => Some(StreamEvent::Raw(object)),
	}
}

/// Text delta by precedence: `content`, `text`, then `choices[0].delta.content`.
///
/// A field that is present but `null` counts as an empty delta.
fn delta(object: &Map<String, Value>) -> Option<&str> {
	for key in ["content", "text"] {
		match object.get(key) {
			Some(Value::String(text)) => return Some(text),
			Some(Value::Null) => return Some(""),
			_ => {},
		}
	}

	match object.get("choices")?.get(0)?.get("delta")?.get("content")? {
		Value::String(text) => Some(text),
		_ => Some(""),
	}
}

fn error_message(value: &Value) -> Option<String> {
	let message = match value {
		Value::Null | Value::Bool(false) => return None,
		Value::String(text) => text.trim().to_owned(),
		Value::Object(inner) => match inner.get("message") {
			Some(Value::String(text)) => text.trim().to_owned(),
			_ => value.to_string(),
		},
		other => other.to_string(),
	};

	(!message.is_empty()).then_some(message)
}
