use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub index: Index,
	pub answer: Answer,
	pub providers: Providers,
	#[serde(default)]
	pub sources: Sources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Index {
	/// Directory holding the vector/metadata files, one stem per source.
	pub dir: std::path::PathBuf,
	pub dimensions: u32,
}

/// Question-scoped defaults; per-question knobs override these.
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
	pub top_k: u32,
	pub temperature: f32,
	pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: ChatProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_embed_batch_size")]
	pub batch_size: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub fallback_model: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sources {
	pub tracker: Option<Tracker>,
	pub directory: Option<Directory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tracker {
	pub base_url: String,
	pub username: String,
	pub token: String,
	#[serde(default = "default_true")]
	pub verify_tls: bool,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
	pub tenant_id: String,
	pub client_id: String,
	pub client_secret: String,
	pub timeout_ms: u64,
}

fn default_embed_batch_size() -> u32 {
	64
}

fn default_true() -> bool {
	true
}

fn default_page_size() -> u32 {
	200
}
