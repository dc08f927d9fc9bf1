pub mod answer;
pub mod enrich;
pub mod ingest;
pub mod policy;
pub mod retrieve;
pub mod synthesize;

mod error;

pub use error::{Error, Result};
pub use ingest::build_index;
pub use policy::{
	AnswerKnobs, AudienceRole, ChatRole, InstructionBlock, Intensity, compile, normalize_persona,
};
pub use retrieve::{SourceIndex, dedup_hits};
pub use synthesize::ChatResult;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use sibyl_config::{ChatProviderConfig, Config, EmbeddingProviderConfig};
use sibyl_domain::LiveFields;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// Order-preserving: one vector per input text.
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	/// A rejected model must surface as [`Error::ModelUnavailable`] so the
	/// synthesis step can apply its single fallback retry.
	fn generate<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		model: &'a str,
		blocks: &'a [InstructionBlock],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, Result<String>>;
}

pub trait TrackerProvider
where
	Self: Send + Sync,
{
	fn fetch_current_fields<'a>(
		&'a self,
		keys: &'a [String],
		fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<HashMap<String, LiveFields>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	/// Live enrichment is skipped entirely when no tracker is configured.
	pub tracker: Option<Arc<dyn TrackerProvider>>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
		tracker: Option<Arc<dyn TrackerProvider>>,
	) -> Self {
		Self { embedding, generation, tracker }
	}

	/// HTTP-backed providers; the tracker is present only when configured.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		let provider = Arc::new(DefaultProviders);
		let tracker = match cfg.sources.tracker.as_ref() {
			Some(tracker_cfg) => {
				let client = sibyl_sources::tracker::TrackerClient::new(tracker_cfg)
					.map_err(|err| Error::Tracker { message: err.to_string() })?;
				Some(Arc::new(HttpTracker { client }) as Arc<dyn TrackerProvider>)
			},
			None => None,
		};

		Ok(Self { embedding: provider.clone(), generation: provider, tracker })
	}
}

/// The retrieval→enrichment→synthesis pipeline over a catalog of vector
/// indices. Every default flows from the explicit `Config`; nothing is read
/// from ambient process state.
pub struct AnswerService {
	pub cfg: Config,
	pub(crate) catalog: Vec<SourceIndex>,
	pub providers: Providers,
}
impl AnswerService {
	/// Rejects an empty catalog and any index whose dimension disagrees with
	/// the configured one. The persisted metric tag is already enforced at
	/// load time, so a constructed catalog is guaranteed score-comparable.
	pub fn new(cfg: Config, catalog: Vec<SourceIndex>, providers: Providers) -> Result<Self> {
		if catalog.is_empty() {
			return Err(Error::EmptyCatalog);
		}
		let expected = cfg.index.dimensions as usize;
		for source in &catalog {
			if source.index.dim() != expected {
				return Err(Error::CatalogDimension {
					tag: source.tag.clone(),
					expected,
					actual: source.index.dim(),
				});
			}
		}

		Ok(Self { cfg, catalog, providers })
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			sibyl_providers::embedding::embed(cfg, texts)
				.await
				.map_err(|err| Error::Embedding { message: err.to_string() })
		})
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		model: &'a str,
		blocks: &'a [InstructionBlock],
		temperature: f32,
		max_tokens: u32,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let messages: Vec<serde_json::Value> =
				blocks.iter().map(InstructionBlock::to_message).collect();
			sibyl_providers::generate::generate(cfg, model, &messages, temperature, max_tokens)
				.await
				.map_err(|err| match err {
					sibyl_providers::Error::PermissionDenied { message } =>
						Error::ModelUnavailable { message },
					other => Error::Generation { message: other.to_string() },
				})
		})
	}
}

struct HttpTracker {
	client: sibyl_sources::tracker::TrackerClient,
}

impl TrackerProvider for HttpTracker {
	fn fetch_current_fields<'a>(
		&'a self,
		keys: &'a [String],
		fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<HashMap<String, LiveFields>>> {
		Box::pin(async move {
			self.client
				.fetch_current_fields(keys, fields)
				.await
				.map_err(|err| Error::Tracker { message: err.to_string() })
		})
	}
}
