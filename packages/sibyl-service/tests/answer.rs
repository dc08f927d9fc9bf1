use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use sibyl_config::{
	Answer, ChatProviderConfig, Config, EmbeddingProviderConfig, Index, Service, Sources,
};
use sibyl_domain::{Identity, LiveFields, Record, RecordKind, StructuredHit, WorkItem};
use sibyl_index::VectorIndex;
use sibyl_service::{
	AnswerKnobs, AnswerService, BoxFuture, ChatRole, EmbeddingProvider, Error, GenerationProvider,
	InstructionBlock, Providers, Result, SourceIndex, TrackerProvider,
};

const DIM: usize = 3;

fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		index: Index { dir: std::path::PathBuf::from("."), dimensions: DIM as u32 },
		answer: Answer { top_k: 5, temperature: 0.5, max_tokens: 4_096 },
		providers: sibyl_config::Providers {
			embedding: EmbeddingProviderConfig {
				api_base: "https://embeddings.example.test".to_string(),
				api_key: "embed-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embedder".to_string(),
				dimensions: DIM as u32,
				batch_size: 64,
				timeout_ms: 1_000,
			},
			chat: ChatProviderConfig {
				api_base: "https://chat.example.test".to_string(),
				api_key: "chat-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "prime-model".to_string(),
				fallback_model: "fallback-model".to_string(),
				timeout_ms: 1_000,
			},
		},
		sources: Sources::default(),
	}
}

struct StubEmbedding;

impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect();
		Box::pin(async move { Ok(vectors) })
	}
}

#[derive(Debug, Clone)]
struct GenerationCall {
	model: String,
	temperature: f32,
	max_tokens: u32,
	blocks: Vec<InstructionBlock>,
}

#[derive(Default)]
struct RecordingGeneration {
	reject_primary: bool,
	calls: Mutex<Vec<GenerationCall>>,
}
impl RecordingGeneration {
	fn rejecting_primary() -> Self {
		Self { reject_primary: true, calls: Mutex::new(Vec::new()) }
	}

	fn calls(&self) -> Vec<GenerationCall> {
		self.calls.lock().expect("Lock poisoned.").clone()
	}
}

impl GenerationProvider for RecordingGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a ChatProviderConfig,
		model: &'a str,
		blocks: &'a [InstructionBlock],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, Result<String>> {
		let call = GenerationCall {
			model: model.to_string(),
			temperature,
			max_tokens,
			blocks: blocks.to_vec(),
		};
		Box::pin(async move {
			let mut calls = self.calls.lock().expect("Lock poisoned.");
			let first = calls.is_empty();
			calls.push(call);
			if self.reject_primary && first {
				return Err(Error::ModelUnavailable {
					message: "The requested model is not allowed for this key.".to_string(),
				});
			}

			Ok("A grounded answer.".to_string())
		})
	}
}

#[derive(Default)]
struct StubTracker {
	live: HashMap<String, LiveFields>,
	requests: Mutex<Vec<Vec<String>>>,
}
impl StubTracker {
	fn with_live(key: &str, fields: LiveFields) -> Self {
		Self { live: HashMap::from([(key.to_string(), fields)]), requests: Mutex::new(Vec::new()) }
	}

	fn requests(&self) -> Vec<Vec<String>> {
		self.requests.lock().expect("Lock poisoned.").clone()
	}
}

impl TrackerProvider for StubTracker {
	fn fetch_current_fields<'a>(
		&'a self,
		keys: &'a [String],
		_fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<HashMap<String, LiveFields>>> {
		Box::pin(async move {
			self.requests.lock().expect("Lock poisoned.").push(keys.to_vec());

			Ok(self.live.clone())
		})
	}
}

struct FailingTracker;

impl TrackerProvider for FailingTracker {
	fn fetch_current_fields<'a>(
		&'a self,
		_keys: &'a [String],
		_fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<HashMap<String, LiveFields>>> {
		Box::pin(async move {
			Err(Error::Tracker { message: "The tracker is unavailable.".to_string() })
		})
	}
}

fn work_item(key: &str) -> Record {
	Record::WorkItem(WorkItem {
		key: key.to_string(),
		issue_type: "Task".to_string(),
		summary: format!("Work on {key}"),
		status: "Open".to_string(),
		project_key: "OPS".to_string(),
		..WorkItem::default()
	})
}

fn identity(principal: &str, display: &str) -> Record {
	Record::Identity(Identity {
		principal_name: Some(principal.to_string()),
		display_name: Some(display.to_string()),
		..Identity::default()
	})
}

/// Unit vector at the given cosine distance from the query `[1, 0, 0]`.
fn vector_at(distance: f32) -> Vec<f32> {
	let cos = 1.0 - distance;
	vec![cos, (1.0 - cos * cos).max(0.0).sqrt(), 0.0]
}

fn source(tag: &str, entries: &[(Record, f32)]) -> SourceIndex {
	let mut index = VectorIndex::new(DIM);
	let vectors: Vec<Vec<f32>> = entries.iter().map(|(_, distance)| vector_at(*distance)).collect();
	let metas: Vec<Record> = entries.iter().map(|(record, _)| record.clone()).collect();
	index.add(&vectors, metas).expect("Failed to seed the index.");

	SourceIndex::new(tag, index)
}

fn service(
	catalog: Vec<SourceIndex>,
	generation: Arc<RecordingGeneration>,
	tracker: Option<Arc<dyn TrackerProvider>>,
) -> AnswerService {
	let providers = Providers::new(Arc::new(StubEmbedding), generation, tracker);
	AnswerService::new(test_config(), catalog, providers).expect("Failed to build the service.")
}

#[tokio::test]
async fn plain_work_item_question_gets_one_base_block_and_bounded_sources() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source(
			"work_items",
			&[(work_item("OPS-1"), 0.0), (work_item("OPS-2"), 0.1), (work_item("OPS-3"), 0.2)],
		)],
		generation.clone(),
		None,
	);

	let knobs = AnswerKnobs { top_k: Some(3), ..AnswerKnobs::default() };
	let result = svc
		.answer("Which issues are blocked?", RecordKind::WorkItem, &knobs)
		.await
		.expect("Answer failed.");

	assert!(!result.answer.is_empty());
	assert!(result.structured.len() <= 3);
	assert_eq!(result.sources.len(), 3);

	let calls = generation.calls();
	assert_eq!(calls.len(), 1);
	let blocks = &calls[0].blocks;
	// Base instructions, context, question; nothing else was switched on.
	assert_eq!(blocks.len(), 3);
	assert!(blocks[0].text.contains("issue-tracker analyst"));
	assert!(blocks[1].text.starts_with("Context:\n"));
	assert_eq!(blocks[1].text.matches("[OPS-").count(), 3);
	assert_eq!(blocks[2].role, ChatRole::User);
	assert_eq!(blocks[2].text, "Which issues are blocked?");
}

#[tokio::test]
async fn merged_retrieval_is_score_ordered_tagged_and_truncated() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![
			source("alpha", &[(work_item("A-1"), 0.0), (work_item("A-2"), 0.4)]),
			source("beta", &[(work_item("B-1"), 0.2), (work_item("B-2"), 0.6)]),
		],
		generation,
		None,
	);

	let knobs = AnswerKnobs { top_k: Some(3), ..AnswerKnobs::default() };
	let result = svc
		.answer("What is in flight?", RecordKind::WorkItem, &knobs)
		.await
		.expect("Answer failed.");

	assert_eq!(result.sources.len(), 3);
	let keys: Vec<&str> = result
		.sources
		.iter()
		.map(|hit| match &hit.record {
			Record::WorkItem(item) => item.key.as_str(),
			other => panic!("Expected a work item, got {other:?}."),
		})
		.collect();
	assert_eq!(keys, vec!["A-1", "B-1", "A-2"]);
	assert!(result.sources.windows(2).all(|pair| pair[0].score <= pair[1].score));
	assert_eq!(result.sources[0].origin.as_deref(), Some("alpha"));
	assert_eq!(result.sources[1].origin.as_deref(), Some("beta"));
}

#[tokio::test]
async fn duplicate_principals_collapse_to_the_first_hit() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source(
			"people",
			&[
				(identity("ada@example.test", "Ada Lovelace"), 0.0),
				(identity("ada@example.test", "A. Lovelace"), 0.1),
				(identity("grace@example.test", "Grace Hopper"), 0.2),
			],
		)],
		generation,
		None,
	);

	let knobs = AnswerKnobs { top_k: Some(3), ..AnswerKnobs::default() };
	let result = svc
		.answer("Who works on compilers?", RecordKind::Identity, &knobs)
		.await
		.expect("Answer failed.");

	assert_eq!(result.sources.len(), 2);
	match &result.structured[0] {
		StructuredHit::Identity(view) => {
			assert_eq!(view.display_name.as_deref(), Some("Ada Lovelace"));
		},
		other => panic!("Expected an identity projection, got {other:?}."),
	}
}

#[tokio::test]
async fn enrichment_failure_degrades_to_base_fields() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-1"), 0.0), (work_item("OPS-2"), 0.1)])],
		generation,
		Some(Arc::new(FailingTracker)),
	);

	let result = svc
		.answer("How is OPS-1 doing?", RecordKind::WorkItem, &AnswerKnobs::default())
		.await
		.expect("Enrichment failure must not surface.");

	assert_eq!(result.sources.len(), 2);
	assert!(result.sources.iter().all(|hit| hit.live.is_none()));
}

#[tokio::test]
async fn enrichment_overlays_cited_and_retrieved_keys() {
	let generation = Arc::new(RecordingGeneration::default());
	let tracker = Arc::new(StubTracker::with_live(
		"OPS-7",
		LiveFields { status: Some("Done".to_string()), ..LiveFields::default() },
	));
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-7"), 0.0), (work_item("OPS-8"), 0.1)])],
		generation,
		Some(tracker.clone()),
	);

	let result = svc
		.answer("Is OPS-99 blocked by OPS-7?", RecordKind::WorkItem, &AnswerKnobs::default())
		.await
		.expect("Answer failed.");

	let requests = tracker.requests();
	assert_eq!(requests.len(), 1);
	// Keys cited in the question come first, then keys from the hits.
	assert_eq!(requests[0], vec!["OPS-99", "OPS-7", "OPS-8"]);

	assert!(result.sources[0].live.is_some());
	match &result.structured[0] {
		StructuredHit::WorkItem(view) => {
			assert_eq!(view.status.as_deref(), Some("Done"));
		},
		other => panic!("Expected a work-item projection, got {other:?}."),
	}
	assert!(result.sources[1].live.is_none());
}

#[tokio::test]
async fn enrichment_is_skipped_for_other_record_kinds() {
	let generation = Arc::new(RecordingGeneration::default());
	let tracker = Arc::new(StubTracker::default());
	let svc = service(
		vec![source("people", &[(identity("ada@example.test", "Ada Lovelace"), 0.0)])],
		generation,
		Some(tracker.clone()),
	);

	svc.answer("Who is ADA-1 assigned to?", RecordKind::Identity, &AnswerKnobs::default())
		.await
		.expect("Answer failed.");

	assert!(tracker.requests().is_empty());
}

#[tokio::test]
async fn rejected_model_retries_once_against_the_fallback() {
	let generation = Arc::new(RecordingGeneration::rejecting_primary());
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-1"), 0.0)])],
		generation.clone(),
		None,
	);

	let result = svc
		.answer("Status of OPS-1?", RecordKind::WorkItem, &AnswerKnobs::default())
		.await
		.expect("The fallback retry must succeed.");
	assert_eq!(result.answer, "A grounded answer.");

	let calls = generation.calls();
	assert_eq!(calls.len(), 2);
	assert_eq!(calls[0].model, "prime-model");
	assert_eq!(calls[1].model, "fallback-model");
	assert_eq!(calls[0].max_tokens, 4_096);
	assert_eq!(calls[1].max_tokens, 2_048);
	assert_eq!(calls[0].blocks, calls[1].blocks);
}

#[tokio::test]
async fn personas_clamp_temperature_and_shape_the_answer() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-1"), 0.0)])],
		generation.clone(),
		None,
	);

	let knobs = AnswerKnobs {
		persona: Some(" Yoda ".to_string()),
		temperature: Some(0.9),
		..AnswerKnobs::default()
	};
	let result = svc
		.answer("Status of OPS-1?", RecordKind::WorkItem, &knobs)
		.await
		.expect("Answer failed.");

	assert_eq!(result.answer, "(yoda) Hmm. A grounded answer.");

	let calls = generation.calls();
	assert_eq!(calls.len(), 1);
	assert!((calls[0].temperature - 0.35).abs() < f32::EPSILON);

	let blocks = &calls[0].blocks;
	let reminder = blocks
		.iter()
		.position(|block| block.text.starts_with("Persona enforcement:"))
		.expect("Expected the persona reminder.");
	assert_eq!(reminder, blocks.len() - 2);
	assert_eq!(blocks.last().map(|block| block.role), Some(ChatRole::User));
}

#[tokio::test]
async fn persona_temperature_never_drops_below_the_floor() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-1"), 0.0)])],
		generation.clone(),
		None,
	);

	let knobs = AnswerKnobs {
		persona: Some("pirate".to_string()),
		temperature: Some(0.0),
		..AnswerKnobs::default()
	};
	svc.answer("Status of OPS-1?", RecordKind::WorkItem, &knobs)
		.await
		.expect("Answer failed.");

	let calls = generation.calls();
	assert!((calls[0].temperature - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn sectioned_output_restates_the_format_lock_after_the_context() {
	let generation = Arc::new(RecordingGeneration::default());
	let svc = service(
		vec![source("work_items", &[(work_item("OPS-1"), 0.0)])],
		generation.clone(),
		None,
	);

	let knobs = AnswerKnobs { multi_section: true, ..AnswerKnobs::default() };
	svc.answer("Summarize the project.", RecordKind::WorkItem, &knobs)
		.await
		.expect("Answer failed.");

	let calls = generation.calls();
	let blocks = &calls[0].blocks;
	let locks: Vec<usize> = blocks
		.iter()
		.enumerate()
		.filter(|(_, block)| block.text.starts_with("FORMAT LOCK:"))
		.map(|(position, _)| position)
		.collect();
	let context = blocks
		.iter()
		.position(|block| block.text.starts_with("Context:"))
		.expect("Expected a context block.");
	assert_eq!(locks.len(), 2);
	assert!(locks[0] < context);
	assert!(locks[1] > context);
}

#[test]
fn mismatched_catalog_dimensions_are_rejected() {
	let mut index = VectorIndex::new(2);
	index
		.add(&[vec![1.0, 0.0]], vec![work_item("OPS-1")])
		.expect("Failed to seed the index.");
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(RecordingGeneration::default()),
		None,
	);

	let result =
		AnswerService::new(test_config(), vec![SourceIndex::new("tiny", index)], providers);
	assert!(matches!(result, Err(Error::CatalogDimension { .. })));
}

#[test]
fn an_empty_catalog_is_rejected() {
	let providers = Providers::new(
		Arc::new(StubEmbedding),
		Arc::new(RecordingGeneration::default()),
		None,
	);
	assert!(matches!(
		AnswerService::new(test_config(), Vec::new(), providers),
		Err(Error::EmptyCatalog)
	));
}
