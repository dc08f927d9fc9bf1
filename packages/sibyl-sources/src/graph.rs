use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use sibyl_domain::{AuthEvent, Identity};

use crate::{Error, Result};

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const SCOPE: &str = "https://graph.microsoft.com/.default";
const PAGE_RETRY_ATTEMPTS: u32 = 5;
/// Refresh the cached token this long before it actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

const USER_FIELDS: &str =
	"displayName,jobTitle,department,mail,userPrincipalName,accountEnabled,id";
const SIGNIN_FIELDS: &str = "id,createdDateTime,appDisplayName,userDisplayName,userPrincipalName,\
	ipAddress,clientAppUsed,deviceDetail,location,status";

/// Scope of a sign-in crawl. Date bounds accept `YYYY-MM-DD` or full ISO
/// timestamps; `top` caps the overall record count across pages.
#[derive(Debug, Clone, Default)]
pub struct SignInQuery {
	pub start_date: Option<String>,
	pub end_date: Option<String>,
	pub apps: Vec<String>,
	pub top: Option<usize>,
}

struct CachedToken {
	value: String,
	expires_at: Instant,
}

/// Client-credentials Graph client with token caching and paged GETs that
/// follow `@odata.nextLink`. Rate limits honor `Retry-After`; a 401 refreshes
/// the token and retries instead of failing outright.
pub struct GraphClient {
	client: Client,
	tenant_id: String,
	client_id: String,
	client_secret: String,
	token: Option<CachedToken>,
}

impl GraphClient {
	pub fn new(cfg: &sibyl_config::Directory) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			tenant_id: cfg.tenant_id.clone(),
			client_id: cfg.client_id.clone(),
			client_secret: cfg.client_secret.clone(),
			token: None,
		})
	}

	/// Crawl directory users into identity records. Disabled accounts and
	/// records without any of display name, principal name, or email are
	/// skipped.
	pub async fn crawl_identities(&mut self, top: Option<usize>) -> Result<Vec<Identity>> {
		let mut params = vec![
			("$select", USER_FIELDS.to_string()),
			("$orderby", "displayName".to_string()),
		];
		if let Some(top) = top {
			params.push(("$top", top.to_string()));
		}

		let url = format!("{GRAPH_BASE}/users");
		let records = self.get_paged(&url, &params, top).await?;
		let mut identities = Vec::with_capacity(records.len());
		for record in &records {
			if let Some(identity) = parse_identity(record) {
				identities.push(identity);
			}
		}
		if identities.is_empty() {
			warn!("Directory crawl returned no usable identity records.");
		}

		Ok(identities)
	}

	/// Crawl sign-in audit events within the query's scope, newest first.
	pub async fn crawl_sign_ins(&mut self, query: &SignInQuery) -> Result<Vec<AuthEvent>> {
		let mut params = Vec::new();
		if let Some(filter) = signin_filter(query) {
			params.push(("$filter", filter));
		}
		params.push(("$select", SIGNIN_FIELDS.to_string()));
		params.push(("$orderby", "createdDateTime desc".to_string()));
		if let Some(top) = query.top {
			params.push(("$top", top.to_string()));
		}

		let url = format!("{GRAPH_BASE}/auditLogs/signIns");
		let records = self.get_paged(&url, &params, query.top).await?;
		if records.is_empty() {
			warn!("Sign-in crawl returned no records for the given scope.");
		}

		Ok(records.iter().map(parse_sign_in).collect())
	}

	async fn token(&mut self) -> Result<String> {
		if let Some(cached) = self.token.as_ref() {
			if Instant::now() + TOKEN_SLACK < cached.expires_at {
				return Ok(cached.value.clone());
			}
		}

		let url = format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", self.tenant_id);
		let form = [
			("grant_type", "client_credentials"),
			("client_id", self.client_id.as_str()),
			("client_secret", self.client_secret.as_str()),
			("scope", SCOPE),
		];
		let res = self.client.post(url).form(&form).send().await?;
		let status = res.status();
		if !status.is_success() {
			let message = crate::truncate_body(res.text().await.unwrap_or_default());
			return Err(Error::Auth { message });
		}

		let json: Value = res.json().await?;
		let Some(value) = json.get("access_token").and_then(|v| v.as_str()) else {
			return Err(Error::Auth {
				message: "Token response is missing access_token.".to_string(),
			});
		};
		let expires_in = json.get("expires_in").and_then(|v| v.as_u64()).unwrap_or(3_000);
		let token = value.to_string();
		self.token = Some(CachedToken {
			value: token.clone(),
			expires_at: Instant::now() + Duration::from_secs(expires_in),
		});

		Ok(token)
	}

	/// Fetch every page of a collection endpoint, following `@odata.nextLink`
	/// until it disappears, repeats (loop guard), or `cap` is reached.
	async fn get_paged(
		&mut self,
		url: &str,
		params: &[(&str, String)],
		cap: Option<usize>,
	) -> Result<Vec<Value>> {
		let mut records = Vec::new();
		let mut next: Option<String> = None;
		let mut retries = 0_u32;

		loop {
			let token = self.token().await?;
			let request = match next.as_deref() {
				// nextLink already carries the original query parameters.
				Some(link) => self.client.get(link),
				None => self.client.get(url).query(params),
			};

			let res = match request.bearer_auth(&token).send().await {
				Ok(res) => res,
				Err(err) if retries + 1 < PAGE_RETRY_ATTEMPTS => {
					warn!(error = %err, retries, "Transport failure on a Graph page; retrying.");
					tokio::time::sleep(Duration::from_secs(5)).await;
					retries += 1;
					continue;
				},
				Err(err) => return Err(err.into()),
			};

			let status = res.status();
			if status == StatusCode::TOO_MANY_REQUESTS {
				if retries + 1 >= PAGE_RETRY_ATTEMPTS {
					let message = crate::truncate_body(res.text().await.unwrap_or_default());
					return Err(Error::Upstream { status: status.as_u16(), message });
				}
				let delay = retry_after(&res);
				warn!(delay_secs = delay.as_secs(), "Graph rate limit; honoring Retry-After.");
				tokio::time::sleep(delay).await;
				retries += 1;
				continue;
			}
			if status == StatusCode::UNAUTHORIZED {
				if retries + 1 >= PAGE_RETRY_ATTEMPTS {
					let message = crate::truncate_body(res.text().await.unwrap_or_default());
					return Err(Error::Upstream { status: status.as_u16(), message });
				}
				self.token = None;
				retries += 1;
				continue;
			}
			if !status.is_success() {
				let message = crate::truncate_body(res.text().await.unwrap_or_default());
				return Err(Error::Upstream { status: status.as_u16(), message });
			}

			let json: Value = res.json().await?;
			if let Some(batch) = json.get("value").and_then(|v| v.as_array()) {
				records.extend(batch.iter().cloned());
			}
			debug!(fetched = records.len(), "Fetched Graph page.");

			if let Some(cap) = cap {
				if records.len() >= cap {
					records.truncate(cap);
					break;
				}
			}

			let link = json.get("@odata.nextLink").and_then(|v| v.as_str());
			match link {
				Some(link) if Some(link) != next.as_deref() => next = Some(link.to_string()),
				_ => break,
			}
		}

		Ok(records)
	}
}

fn retry_after(res: &reqwest::Response) -> Duration {
	let seconds = res
		.headers()
		.get(reqwest::header::RETRY_AFTER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.parse::<u64>().ok())
		.unwrap_or(10);
	Duration::from_secs(seconds)
}

/// Combine date bounds and app names into one OData `$filter`. Date-only
/// bounds get floored/ceiled to whole days; app names are OR-ed together.
fn signin_filter(query: &SignInQuery) -> Option<String> {
	let mut clauses = Vec::new();
	if let Some(start) = query.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
		clauses.push(format!("(createdDateTime ge {})", iso_floor(start)));
	}
	if let Some(end) = query.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
		clauses.push(format!("(createdDateTime le {})", iso_ceil(end)));
	}

	let apps: Vec<&str> =
		query.apps.iter().map(|app| app.trim()).filter(|app| !app.is_empty()).collect();
	if !apps.is_empty() {
		let ored = apps
			.iter()
			.map(|app| format!("(appDisplayName eq {})", quote_odata(app)))
			.collect::<Vec<_>>()
			.join(" or ");
		clauses.push(format!("({ored})"));
	}

	if clauses.is_empty() { None } else { Some(clauses.join(" and ")) }
}

fn iso_floor(date: &str) -> String {
	if date.contains('T') { date.to_string() } else { format!("{date}T00:00:00Z") }
}

fn iso_ceil(date: &str) -> String {
	if date.contains('T') { date.to_string() } else { format!("{date}T23:59:59Z") }
}

/// Single quotes double per OData escaping rules.
fn quote_odata(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

fn parse_identity(record: &Value) -> Option<Identity> {
	if record.get("accountEnabled").and_then(|v| v.as_bool()) == Some(false) {
		return None;
	}

	let mut identity = Identity {
		id: opt_str(record, &["id"]),
		display_name: opt_str(record, &["displayName"]),
		principal_name: opt_str(record, &["userPrincipalName"]),
		mail: opt_str(record, &["mail"]),
		job_title: opt_str(record, &["jobTitle"]),
		department: opt_str(record, &["department"]),
		account_enabled: record.get("accountEnabled").and_then(|v| v.as_bool()),
		document: String::new(),
	};
	if identity.display_name.is_none()
		&& identity.principal_name.is_none()
		&& identity.mail.is_none()
	{
		return None;
	}
	identity.document = identity.to_document();

	Some(identity)
}

fn parse_sign_in(record: &Value) -> AuthEvent {
	let outcome = match record.get("status").and_then(|s| s.get("errorCode")).and_then(|v| v.as_i64())
	{
		Some(0) | None => "Success".to_string(),
		Some(code) => format!("Error {code}"),
	};

	let mut event = AuthEvent {
		id: opt_str(record, &["id"]),
		created: opt_str(record, &["createdDateTime"]),
		app: opt_str(record, &["appDisplayName"]),
		user_display_name: opt_str(record, &["userDisplayName"]),
		principal_name: opt_str(record, &["userPrincipalName"]),
		ip_address: opt_str(record, &["ipAddress"]),
		client_app: opt_str(record, &["clientAppUsed"]),
		operating_system: opt_str(record, &["deviceDetail", "operatingSystem"]),
		browser: opt_str(record, &["deviceDetail", "browser"]),
		city: opt_str(record, &["location", "city"]),
		country: opt_str(record, &["location", "countryOrRegion"]),
		result: Some(outcome),
		document: String::new(),
	};
	event.document = event.to_document();

	event
}

fn opt_str(value: &Value, path: &[&str]) -> Option<String> {
	let mut current = value;
	for step in path {
		current = current.get(step)?;
	}
	current.as_str().map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn date_only_bounds_cover_whole_days() {
		assert_eq!(iso_floor("2024-03-01"), "2024-03-01T00:00:00Z");
		assert_eq!(iso_ceil("2024-03-01"), "2024-03-01T23:59:59Z");
		assert_eq!(iso_floor("2024-03-01T08:30:00Z"), "2024-03-01T08:30:00Z");
	}

	#[test]
	fn odata_quotes_double_single_quotes() {
		assert_eq!(quote_odata("O'Brien's App"), "'O''Brien''s App'");
	}

	#[test]
	fn signin_filter_combines_dates_and_apps() {
		let query = SignInQuery {
			start_date: Some("2024-03-01".to_string()),
			end_date: Some("2024-03-02".to_string()),
			apps: vec!["Teams".to_string(), "Windows Sign In".to_string()],
			top: None,
		};
		let filter = signin_filter(&query).expect("Expected a filter.");
		assert_eq!(
			filter,
			"(createdDateTime ge 2024-03-01T00:00:00Z) and \
			(createdDateTime le 2024-03-02T23:59:59Z) and \
			((appDisplayName eq 'Teams') or (appDisplayName eq 'Windows Sign In'))"
		);
	}

	#[test]
	fn empty_scope_builds_no_filter() {
		assert_eq!(signin_filter(&SignInQuery::default()), None);
	}

	#[test]
	fn disabled_and_anonymous_identities_are_skipped() {
		let disabled = serde_json::json!({
			"displayName": "Ada Lovelace",
			"accountEnabled": false
		});
		assert!(parse_identity(&disabled).is_none());

		let anonymous = serde_json::json!({ "id": "u-1", "accountEnabled": true });
		assert!(parse_identity(&anonymous).is_none());
	}

	#[test]
	fn identity_gets_an_embedding_document() {
		let record = serde_json::json!({
			"id": "u-1",
			"displayName": "Ada Lovelace",
			"userPrincipalName": "ada@example.test",
			"jobTitle": "Engineer",
			"accountEnabled": true
		});
		let identity = parse_identity(&record).expect("Expected an identity.");
		assert!(identity.document.contains("Name: Ada Lovelace"));
		assert!(identity.document.contains("UPN: ada@example.test"));
	}

	#[test]
	fn sign_in_outcome_comes_from_the_error_code() {
		let success = serde_json::json!({
			"id": "evt-1",
			"status": { "errorCode": 0 }
		});
		assert_eq!(parse_sign_in(&success).result.as_deref(), Some("Success"));

		let failure = serde_json::json!({
			"id": "evt-2",
			"createdDateTime": "2024-03-01T12:00:00Z",
			"appDisplayName": "Teams",
			"deviceDetail": { "operatingSystem": "Windows 11", "browser": "Edge" },
			"location": { "city": "Ottawa", "countryOrRegion": "CA" },
			"status": { "errorCode": 50126 }
		});
		let event = parse_sign_in(&failure);
		assert_eq!(event.result.as_deref(), Some("Error 50126"));
		assert_eq!(event.operating_system.as_deref(), Some("Windows 11"));
		assert_eq!(event.city.as_deref(), Some("Ottawa"));
		assert!(event.document.contains("Result: Error 50126"));
	}
}
