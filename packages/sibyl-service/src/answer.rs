use sibyl_domain::RecordKind;

use crate::{AnswerService, ChatResult, Result, policy::AnswerKnobs, retrieve::dedup_hits};

impl AnswerService {
	/// The sole entry point front ends call: retrieve candidate hits, overlay
	/// live fields for work items, collapse duplicates, then synthesize the
	/// answer under the compiled policy.
	pub async fn answer(
		&self,
		question: &str,
		kind: RecordKind,
		knobs: &AnswerKnobs,
	) -> Result<ChatResult> {
		let top_k = knobs.top_k.unwrap_or(self.cfg.answer.top_k).max(1) as usize;

		let hits = self.retrieve(question, top_k).await?;
		let hits = self.enrich(question, kind, hits).await;
		let hits = dedup_hits(hits);

		self.synthesize(question, kind, knobs, hits).await
	}
}
