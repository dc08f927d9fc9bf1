use serde::Serialize;
use tracing::warn;

use sibyl_domain::{RecordKind, RetrievalHit, StructuredHit};

use crate::{
	AnswerService, Error, InstructionBlock, Result,
	policy::{self, AnswerKnobs},
};

/// Token ceiling applied to the single fallback-model retry.
const FALLBACK_MAX_TOKENS: u32 = 2_048;

/// One answered question: the generated text, the hits it was grounded in,
/// and their kind-specific projections, all in post-dedup order.
#[derive(Debug, Serialize)]
pub struct ChatResult {
	pub answer: String,
	pub sources: Vec<RetrievalHit>,
	pub structured: Vec<StructuredHit>,
}

impl AnswerService {
	/// Assemble the final instruction sequence around the compiled policy
	/// blocks, invoke generation with the single model-fallback retry, and
	/// shape the response.
	pub(crate) async fn synthesize(
		&self,
		question: &str,
		kind: RecordKind,
		knobs: &AnswerKnobs,
		hits: Vec<RetrievalHit>,
	) -> Result<ChatResult> {
		let persona = policy::normalize_persona(knobs.persona.as_deref());
		let intensity = policy::effective_intensity(persona.as_deref(), knobs);
		let language = policy::effective_language(knobs);

		let mut blocks = policy::compile(kind, knobs);
		blocks.push(InstructionBlock::system(render_context(&hits, knobs.verbose)));
		if knobs.multi_section {
			blocks.push(InstructionBlock::system(policy::format_lock(kind, language.as_deref())));
		}
		if persona.is_some() {
			blocks.push(InstructionBlock::system(policy::PERSONA_REMINDER));
		}
		blocks.push(InstructionBlock::user(question));

		let chat = &self.cfg.providers.chat;
		let mut temperature = knobs.temperature.unwrap_or(self.cfg.answer.temperature);
		if persona.is_some() {
			// Lower temperature helps the model stick to the style rules.
			temperature = temperature.clamp(0.2, 0.35);
		}
		let max_tokens = knobs.max_tokens.unwrap_or(self.cfg.answer.max_tokens);

		let generation = self.providers.generation.as_ref();
		let raw = match generation.generate(chat, &chat.model, &blocks, temperature, max_tokens).await
		{
			Ok(text) => text,
			Err(Error::ModelUnavailable { message }) => {
				warn!(
					model = %chat.model,
					fallback = %chat.fallback_model,
					reason = %message,
					"Requested model rejected; retrying once with the fallback model.",
				);
				generation
					.generate(
						chat,
						&chat.fallback_model,
						&blocks,
						temperature,
						max_tokens.min(FALLBACK_MAX_TOKENS),
					)
					.await?
			},
			Err(err) => return Err(err),
		};

		let mut answer = raw.trim().to_string();
		if let Some(name) = persona.as_deref() {
			if let Some(opener) = policy::persona_opener(name, intensity) {
				if !answer.starts_with(opener) {
					answer = format!("{opener} {answer}");
				}
			}
			answer = format!("({name}) {answer}");
		}

		let structured = hits.iter().map(RetrievalHit::structured).collect();

		Ok(ChatResult { answer, sources: hits, structured })
	}
}

/// Human-readable context section, one entry per hit in post-dedup order.
pub(crate) fn render_context(hits: &[RetrievalHit], verbose: bool) -> String {
	let entries: Vec<String> = hits.iter().map(|hit| hit.context_block(verbose)).collect();
	format!("Context:\n{}", entries.join("\n"))
}

#[cfg(test)]
mod tests {
	use sibyl_domain::{Record, WorkItem};

	use super::*;

	#[test]
	fn context_entries_keep_hit_order() {
		let hit = |key: &str| {
			RetrievalHit::new(
				Record::WorkItem(WorkItem {
					key: key.to_string(),
					summary: "Something".to_string(),
					status: "Open".to_string(),
					..WorkItem::default()
				}),
				0.1,
			)
		};
		let context = render_context(&[hit("OPS-2"), hit("OPS-1")], false);
		assert!(context.starts_with("Context:\n"));
		let first = context.find("[OPS-2]").expect("Expected the first key.");
		let second = context.find("[OPS-1]").expect("Expected the second key.");
		assert!(first < second);
	}
}
