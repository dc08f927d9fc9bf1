use tracing::{debug, warn};

use sibyl_domain::{Record, RecordKind, RetrievalHit, keys};

use crate::AnswerService;

/// Field set refreshed from the live tracker.
pub const FRESH_FIELDS: [&str; 4] = ["status", "assignee", "priority", "updated"];

impl AnswerService {
	/// Overlay live tracker fields onto work-item hits. A no-op passthrough
	/// for every other record kind and when no tracker is configured. This
	/// step never fails: any upstream error degrades to base fields for the
	/// affected keys, with a warning for operators.
	pub(crate) async fn enrich(
		&self,
		question: &str,
		kind: RecordKind,
		hits: Vec<RetrievalHit>,
	) -> Vec<RetrievalHit> {
		let Some(tracker) = self.providers.tracker.as_ref() else {
			return hits;
		};
		if kind != RecordKind::WorkItem {
			return hits;
		}

		let mut keys = keys::extract_keys(question);
		for hit in &hits {
			if let Record::WorkItem(item) = &hit.record {
				let key = item.key.trim();
				if !key.is_empty() && !keys.iter().any(|existing| existing == key) {
					keys.push(key.to_string());
				}
			}
		}
		if keys.is_empty() {
			return hits;
		}

		let live = match tracker.fetch_current_fields(&keys, &FRESH_FIELDS).await {
			Ok(live) => live,
			Err(err) => {
				warn!(error = %err, ?keys, "Live refresh failed; answering from indexed fields.");
				return hits;
			},
		};
		debug!(requested = keys.len(), refreshed = live.len(), "Applied live field overlay.");

		let mut hits = hits;
		for hit in &mut hits {
			let Record::WorkItem(item) = &hit.record else {
				continue;
			};
			if let Some(fields) = live.get(&item.key) {
				if !fields.is_empty() {
					hit.live = Some(fields.clone());
				}
			}
		}

		hits
	}
}
