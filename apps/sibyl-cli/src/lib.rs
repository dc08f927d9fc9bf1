use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sibyl_config::Config;
use sibyl_domain::{Record, RecordKind};
use sibyl_service::{
	AnswerKnobs, AnswerService, AudienceRole, Intensity, Providers, SourceIndex, build_index,
};
use sibyl_sources::{
	graph::{GraphClient, SignInQuery},
	tracker::TrackerClient,
};

#[derive(Debug, Parser)]
#[command(name = "sibyl", version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Crawl the ticket tracker and build the work-item index.
	CrawlTracker {
		/// Optional tracker query scope; blank crawls everything, newest
		/// first.
		#[arg(long, default_value = "")]
		query: String,
		#[arg(long, default_value = "work_items")]
		stem: String,
	},
	/// Crawl directory identities and build their index.
	CrawlDirectory {
		/// Overall record cap across pages.
		#[arg(long)]
		top: Option<usize>,
		#[arg(long, default_value = "identities")]
		stem: String,
	},
	/// Crawl sign-in audit events and build their index.
	CrawlSignins {
		/// `YYYY-MM-DD` or a full ISO timestamp.
		#[arg(long)]
		start_date: Option<String>,
		#[arg(long)]
		end_date: Option<String>,
		/// Application display name filter; repeat for several.
		#[arg(long = "app")]
		apps: Vec<String>,
		/// Overall record cap across pages.
		#[arg(long)]
		top: Option<usize>,
		#[arg(long, default_value = "signins")]
		stem: String,
	},
	/// Ask a question against one or more built indexes.
	Ask(AskArgs),
}

#[derive(Debug, clap::Args)]
pub struct AskArgs {
	pub question: String,
	/// Index stem to query; repeat to merge several sources into one
	/// score-ordered ranking. The record kind is inferred from the first
	/// stem.
	#[arg(long = "index", default_value = "work_items")]
	pub indexes: Vec<String>,
	#[arg(long)]
	pub top_k: Option<u32>,
	/// Audience framing for work items: developer, manager, or executive.
	#[arg(long)]
	pub role: Option<String>,
	#[arg(long)]
	pub persona: Option<String>,
	/// Persona intensity: light, medium, or heavy.
	#[arg(long, default_value = "medium")]
	pub intensity: String,
	/// Target language or locale code for the narrative prose.
	#[arg(long)]
	pub language: Option<String>,
	#[arg(long)]
	pub temperature: Option<f32>,
	#[arg(long)]
	pub max_tokens: Option<u32>,
	/// Render every field of each hit into the context instead of one line.
	#[arg(long)]
	pub verbose: bool,
	/// Lock the answer into four fixed, localized sections.
	#[arg(long)]
	pub multi_section: bool,
	/// Append one grounded dad joke after the answer.
	#[arg(long)]
	pub joke: bool,
	/// Print scored sources and the structured hits after the answer.
	#[arg(long)]
	pub show_sources: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = sibyl_config::load(&args.config)?;
	let filter = EnvFilter::new(cfg.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	match args.command {
		Command::CrawlTracker { query, stem } => crawl_tracker(&cfg, &query, &stem).await,
		Command::CrawlDirectory { top, stem } => crawl_directory(&cfg, top, &stem).await,
		Command::CrawlSignins { start_date, end_date, apps, top, stem } => {
			let query = SignInQuery { start_date, end_date, apps, top };
			crawl_signins(&cfg, query, &stem).await
		},
		Command::Ask(ask_args) => ask(&cfg, ask_args).await,
	}
}

async fn crawl_tracker(cfg: &Config, query: &str, stem: &str) -> color_eyre::Result<()> {
	let Some(tracker_cfg) = cfg.sources.tracker.as_ref() else {
		return Err(eyre!("sources.tracker must be configured to crawl the tracker."));
	};

	let client = TrackerClient::new(tracker_cfg)?;
	let items = client.crawl(query).await?;
	info!(count = items.len(), "Crawled tracker work items.");

	save_index(cfg, items.into_iter().map(Record::WorkItem).collect(), stem).await
}

async fn crawl_directory(cfg: &Config, top: Option<usize>, stem: &str) -> color_eyre::Result<()> {
	let mut client = directory_client(cfg)?;
	let identities = client.crawl_identities(top).await?;
	info!(count = identities.len(), "Crawled directory identities.");

	save_index(cfg, identities.into_iter().map(Record::Identity).collect(), stem).await
}

async fn crawl_signins(cfg: &Config, query: SignInQuery, stem: &str) -> color_eyre::Result<()> {
	let mut client = directory_client(cfg)?;
	let events = client.crawl_sign_ins(&query).await?;
	info!(count = events.len(), "Crawled sign-in events.");

	save_index(cfg, events.into_iter().map(Record::AuthEvent).collect(), stem).await
}

async fn ask(cfg: &Config, args: AskArgs) -> color_eyre::Result<()> {
	let Some(first_stem) = args.indexes.first() else {
		return Err(eyre!("At least one --index stem is required."));
	};
	let kind = kind_for_stem(first_stem);
	let mut catalog = Vec::with_capacity(args.indexes.len());
	for stem in &args.indexes {
		catalog.push(SourceIndex::load(stem.clone(), &index_stem(cfg, stem))?);
	}

	let role = match args.role.as_deref() {
		Some(role) => {
			let parsed = AudienceRole::parse(role);
			if parsed.is_none() {
				warn!(role, "Unknown audience role; using the default framing.");
			}
			parsed
		},
		None => None,
	};
	let knobs = AnswerKnobs {
		top_k: args.top_k,
		role,
		persona: args.persona,
		intensity: Intensity::parse(&args.intensity),
		language: args.language,
		temperature: args.temperature,
		max_tokens: args.max_tokens,
		verbose: args.verbose,
		multi_section: args.multi_section,
		append_joke: args.joke,
	};

	let providers = Providers::from_config(cfg)?;
	let service = AnswerService::new(cfg.clone(), catalog, providers)?;
	let result = service.answer(&args.question, kind, &knobs).await?;

	println!("{}", result.answer);
	if args.show_sources {
		println!("\nSources:");
		for hit in &result.sources {
			println!(
				"  {:.3}  {}  {}",
				hit.score,
				hit.origin.as_deref().unwrap_or("-"),
				hit.identity_key().unwrap_or_else(|| "-".to_string()),
			);
		}
		println!("\nStructured:\n{}", serde_json::to_string_pretty(&result.structured)?);
	}

	Ok(())
}

fn directory_client(cfg: &Config) -> color_eyre::Result<GraphClient> {
	let Some(directory_cfg) = cfg.sources.directory.as_ref() else {
		return Err(eyre!("sources.directory must be configured to crawl directory data."));
	};

	Ok(GraphClient::new(directory_cfg)?)
}

async fn save_index(cfg: &Config, records: Vec<Record>, stem: &str) -> color_eyre::Result<()> {
	let providers = Providers::from_config(cfg)?;
	let index = build_index(cfg, providers.embedding.as_ref(), records).await?;
	std::fs::create_dir_all(&cfg.index.dir)?;
	let stem_path = index_stem(cfg, stem);
	index.save(&stem_path)?;
	info!(rows = index.len(), stem = %stem_path.display(), "Saved index.");

	Ok(())
}

fn index_stem(cfg: &Config, stem: &str) -> PathBuf {
	cfg.index.dir.join(stem)
}

/// Record kind inferred from an index stem, matching the crawl defaults:
/// sign-in stems, then directory-flavored stems, else work items.
fn kind_for_stem(stem: &str) -> RecordKind {
	let stem = stem.to_lowercase();
	if stem.starts_with("signin") || stem.contains("signins") {
		RecordKind::AuthEvent
	} else if stem.starts_with("identit")
		|| stem.starts_with("people")
		|| stem.starts_with("directory")
		|| stem.starts_with("hr_")
	{
		RecordKind::Identity
	} else {
		RecordKind::WorkItem
	}
}
