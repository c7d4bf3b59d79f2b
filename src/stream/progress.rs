//! Typed view of long-running job progress events.

// self
use crate::{_prelude::*, stream::StreamEvent};

/// Progress snapshot streamed by long-running jobs (research, generation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
	/// Human-readable phase label.
	pub status: String,
	/// Completion fraction or percentage, as reported by the job.
	#[serde(default)]
	pub progress: f64,
	/// Whether the job has finished.
	#[serde(default)]
	pub is_complete: bool,
	/// Sources gathered so far.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sources: Option<Vec<Value>>,
	/// Images gathered so far.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub images: Option<Vec<Value>>,
	/// Final result, usually present once `is_complete` is set.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
}
impl JobProgress {
	/// Reads a progress snapshot out of a [`StreamEvent::Raw`] event.
	///
	/// Returns `None` for other events and for raw payloads that do not look like progress.
	pub fn from_event(event: &StreamEvent) -> Option<Self> {
		let StreamEvent::Raw(map) = event else {
			return None;
		};

		serde_json::from_value(Value::Object(map.clone())).ok()
	}
}
