use std::{collections::HashMap, time::Duration};

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use sibyl_domain::{DependencyLink, LinkDirection, LiveFields, WorkItem};

use crate::{Error, Result};

const SEARCH_ENDPOINT: &str = "rest/api/2/search";
const PAGE_SIZE_CEILING: u32 = 1_000;
const RETRY_ATTEMPTS: u32 = 5;

/// The upstream search parameter accepts at most this many keys per call.
pub const MAX_KEYS_PER_BATCH: usize = 50;

/// Field set used when crawling full work items.
pub const CRAWL_FIELDS: [&str; 16] = [
	"summary",
	"description",
	"status",
	"issuetype",
	"issuelinks",
	"project",
	"parent",
	"assignee",
	"reporter",
	"priority",
	"resolution",
	"created",
	"updated",
	"labels",
	"components",
	"fixVersions",
];

/// Thin client for the ticket tracker's REST search surface. Pagination is
/// handled transparently; transient failures are retried with exponential
/// backoff before surfacing.
pub struct TrackerClient {
	client: Client,
	base_url: String,
	username: String,
	token: String,
	page_size: u32,
}

impl TrackerClient {
	pub fn new(cfg: &sibyl_config::Tracker) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.danger_accept_invalid_certs(!cfg.verify_tls)
			.build()?;

		Ok(Self {
			client,
			base_url: cfg.base_url.clone(),
			username: cfg.username.clone(),
			token: cfg.token.clone(),
			page_size: cfg.page_size,
		})
	}

	/// Fetch every record matching the query, transparently following pages.
	/// A blank query falls back to a safe match-all scope, newest first.
	pub async fn search(&self, jql: &str, fields: &[&str]) -> Result<Vec<Value>> {
		let effective_jql = {
			let trimmed = jql.trim();
			if trimmed.is_empty() { "ORDER BY updated DESC" } else { trimmed }
		};
		let page_size = self.page_size.min(PAGE_SIZE_CEILING);
		let fields_param = fields.join(",");

		let mut issues = Vec::new();
		let mut start_at: u64 = 0;
		let mut total = u64::MAX;
		while start_at < total {
			let mut params = vec![
				("jql", effective_jql.to_string()),
				("startAt", start_at.to_string()),
				("maxResults", page_size.to_string()),
			];
			if !fields_param.is_empty() {
				params.push(("fields", fields_param.clone()));
			}

			let page = self.get(SEARCH_ENDPOINT, &params).await?;
			total = page.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
			let Some(batch) = page.get("issues").and_then(|v| v.as_array()) else {
				break;
			};
			if batch.is_empty() {
				break;
			}

			start_at += batch.len() as u64;
			issues.extend(batch.iter().cloned());
			debug!(fetched = issues.len(), total, "Fetched tracker search page.");
		}

		Ok(issues)
	}

	/// Batched "current fields" refresh: at most [`MAX_KEYS_PER_BATCH`] keys
	/// per upstream call, returning one overlay per known key.
	pub async fn fetch_current_fields(
		&self,
		keys: &[String],
		fields: &[&str],
	) -> Result<HashMap<String, LiveFields>> {
		let mut live = HashMap::new();
		for chunk in keys.chunks(MAX_KEYS_PER_BATCH) {
			let jql = format!("issueKey IN ({})", chunk.join(","));
			let params = vec![
				("jql", jql),
				("maxResults", chunk.len().to_string()),
				("fields", fields.join(",")),
			];
			let page = self.get(SEARCH_ENDPOINT, &params).await?;
			let Some(issues) = page.get("issues").and_then(|v| v.as_array()) else {
				continue;
			};
			for issue in issues {
				let Some(key) = issue.get("key").and_then(|v| v.as_str()) else {
					continue;
				};
				live.insert(key.to_string(), parse_live_fields(issue));
			}
		}

		Ok(live)
	}

	/// Crawl work items for indexing.
	pub async fn crawl(&self, jql: &str) -> Result<Vec<WorkItem>> {
		let issues = self.search(jql, &CRAWL_FIELDS).await?;
		let mut items = Vec::with_capacity(issues.len());
		for issue in &issues {
			match parse_work_item(issue) {
				Some(item) => items.push(item),
				None => warn!("Skipping tracker record without a key."),
			}
		}

		Ok(items)
	}

	async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
		let mut attempt = 0;
		loop {
			match self.get_once(endpoint, params).await {
				Ok(json) => return Ok(json),
				Err(err) if attempt + 1 < RETRY_ATTEMPTS && err.is_transient() => {
					warn!(error = %err, attempt, "Transient tracker failure; backing off.");
					tokio::time::sleep(backoff_delay(attempt)).await;
					attempt += 1;
				},
				Err(err) => return Err(err),
			}
		}
	}

	async fn get_once(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
		let url = format!("{}/{}", self.base_url, endpoint);
		let res = self
			.client
			.get(url)
			.basic_auth(&self.username, Some(&self.token))
			.query(params)
			.send()
			.await?;

		let status = res.status();
		if !status.is_success() {
			let message = crate::truncate_body(res.text().await.unwrap_or_default());
			return Err(Error::Upstream { status: status.as_u16(), message });
		}

		Ok(res.json().await?)
	}
}

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
	let seconds = (1_u64 << attempt).clamp(2, 10);
	Duration::from_secs(seconds)
}

fn parse_live_fields(issue: &Value) -> LiveFields {
	let fields = issue.get("fields");
	LiveFields {
		status: str_path(fields, &["status", "name"]),
		assignee: str_path(fields, &["assignee", "displayName"]),
		priority: str_path(fields, &["priority", "name"]),
		updated: str_path(fields, &["updated"]),
	}
}

fn parse_work_item(issue: &Value) -> Option<WorkItem> {
	let key = issue.get("key").and_then(|v| v.as_str())?;
	let fields = issue.get("fields");

	Some(WorkItem {
		key: key.to_string(),
		issue_type: str_path(fields, &["issuetype", "name"]).unwrap_or_default(),
		summary: str_path(fields, &["summary"]).unwrap_or_default(),
		status: str_path(fields, &["status", "name"]).unwrap_or_default(),
		project_key: str_path(fields, &["project", "key"]).unwrap_or_default(),
		parent_key: str_path(fields, &["parent", "key"]),
		dependencies: parse_links(fields),
		assignee: str_path(fields, &["assignee", "displayName"]),
		reporter: str_path(fields, &["reporter", "displayName"]),
		priority: str_path(fields, &["priority", "name"]),
		resolution: str_path(fields, &["resolution", "name"]),
		created: str_path(fields, &["created"]),
		updated: str_path(fields, &["updated"]),
		labels: plain_strings(fields, "labels"),
		components: named_objects(fields, "components"),
		fix_versions: named_objects(fields, "fixVersions"),
		document: str_path(fields, &["description"]).unwrap_or_default(),
	})
}

/// Extract inward/outward dependency links with their link-type labels.
fn parse_links(fields: Option<&Value>) -> Vec<DependencyLink> {
	let Some(links) = fields.and_then(|f| f.get("issuelinks")).and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	let mut deps = Vec::new();
	for link in links {
		if let Some(key) = str_path(Some(link), &["outwardIssue", "key"]) {
			deps.push(DependencyLink {
				direction: LinkDirection::Outward,
				link_type: str_path(Some(link), &["type", "outward"]).unwrap_or_default(),
				key,
			});
		}
		if let Some(key) = str_path(Some(link), &["inwardIssue", "key"]) {
			deps.push(DependencyLink {
				direction: LinkDirection::Inward,
				link_type: str_path(Some(link), &["type", "inward"]).unwrap_or_default(),
				key,
			});
		}
	}
	deps
}

fn str_path(value: Option<&Value>, path: &[&str]) -> Option<String> {
	let mut current = value?;
	for step in path {
		current = current.get(step)?;
	}
	current.as_str().map(str::to_string)
}

fn plain_strings(fields: Option<&Value>, name: &str) -> Vec<String> {
	fields
		.and_then(|f| f.get(name))
		.and_then(|v| v.as_array())
		.map(|values| {
			values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
		})
		.unwrap_or_default()
}

fn named_objects(fields: Option<&Value>, name: &str) -> Vec<String> {
	fields
		.and_then(|f| f.get(name))
		.and_then(|v| v.as_array())
		.map(|values| {
			values
				.iter()
				.filter_map(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
				.collect()
		})
		.unwrap_or_default()
}
