use serde::{Deserialize, Serialize};

use crate::record::{join_or_dash, or_dash, Record, RecordKind};

/// Freshness fields fetched from the live tracker and overlaid onto a hit.
/// Overlays only ever overwrite; absent fields leave the base value intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveFields {
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub assignee: Option<String>,
	#[serde(default)]
	pub priority: Option<String>,
	#[serde(default)]
	pub updated: Option<String>,
}
impl LiveFields {
	pub fn is_empty(&self) -> bool {
		self.status.is_none()
			&& self.assignee.is_none()
			&& self.priority.is_none()
			&& self.updated.is_none()
	}
}

/// A retrieved record plus its similarity score (lower distance is more
/// similar). Created per question, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
	pub record: Record,
	pub score: f32,
	/// Source index label attached during multi-index merge.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub origin: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub live: Option<LiveFields>,
}
impl RetrievalHit {
	pub fn new(record: Record, score: f32) -> Self {
		Self { record, score, origin: None, live: None }
	}

	pub fn kind(&self) -> RecordKind {
		self.record.kind()
	}

	pub fn identity_key(&self) -> Option<String> {
		self.record.identity_key()
	}

	fn live_or<'a>(&'a self, live: impl Fn(&'a LiveFields) -> Option<&'a String>, base: Option<&'a str>) -> Option<&'a str> {
		self.live
			.as_ref()
			.and_then(|fields| live(fields))
			.map(String::as_str)
			.or(base)
	}

	pub fn effective_status(&self) -> Option<&str> {
		match &self.record {
			Record::WorkItem(item) => self.live_or(|l| l.status.as_ref(), Some(&item.status)),
			_ => None,
		}
	}

	pub fn effective_assignee(&self) -> Option<&str> {
		match &self.record {
			Record::WorkItem(item) => self.live_or(|l| l.assignee.as_ref(), item.assignee.as_deref()),
			_ => None,
		}
	}

	pub fn effective_priority(&self) -> Option<&str> {
		match &self.record {
			Record::WorkItem(item) => self.live_or(|l| l.priority.as_ref(), item.priority.as_deref()),
			_ => None,
		}
	}

	pub fn effective_updated(&self) -> Option<&str> {
		match &self.record {
			Record::WorkItem(item) => self.live_or(|l| l.updated.as_ref(), item.updated.as_deref()),
			_ => None,
		}
	}

	/// One context entry for the generation prompt; verbose includes every
	/// field plus the free-text notes, compact is a single summary line.
	pub fn context_block(&self, verbose: bool) -> String {
		match &self.record {
			Record::WorkItem(item) => {
				let status = self.effective_status().unwrap_or("-");
				let assignee = self.effective_assignee().unwrap_or("-");
				let priority = self.effective_priority().unwrap_or("-");
				let updated = self.effective_updated().unwrap_or("-");
				let mut document = item.document.trim().to_string();
				if document.is_empty() {
					let summary =
						if item.summary.is_empty() { "Untitled" } else { item.summary.as_str() };
					document = format!(
						"No description provided for this issue titled '{summary}' in project \
						{project}. It is classified as {issue_type}, currently {status}, and was \
						last updated on {updated}.",
						project = or_dash(Some(&item.project_key)),
						issue_type = or_dash(Some(&item.issue_type)),
					);
				}

				if verbose {
					format!(
						"[{key}] ({issue_type})\n\
						Project: {project} | Assignee: {assignee} | Reporter: {reporter}\n\
						Status: {status} | Resolution: {resolution} | Priority: {priority}\n\
						Created: {created} | Updated: {updated}\n\
						Labels: {labels} | Components: {components} | Fix Versions: {fixes}\n\
						Description:\n{document}\n------\n",
						key = or_dash(Some(&item.key)),
						issue_type = or_dash(Some(&item.issue_type)),
						project = or_dash(Some(&item.project_key)),
						reporter = or_dash(item.reporter.as_deref()),
						resolution = or_dash(item.resolution.as_deref()),
						created = or_dash(item.created.as_deref()),
						labels = join_or_dash(&item.labels),
						components = join_or_dash(&item.components),
						fixes = join_or_dash(&item.fix_versions),
					)
				} else {
					let summary =
						if item.summary.is_empty() { "No summary" } else { item.summary.as_str() };
					format!(
						"[{key}] - {summary}. Status: {status}. Assignee: {assignee}. \
						Updated: {updated}.",
						key = or_dash(Some(&item.key)),
					)
				}
			},
			Record::Identity(identity) => {
				let name = or_dash(identity.display_name.as_deref());
				let upn = identity
					.principal_name
					.as_deref()
					.or(identity.mail.as_deref())
					.unwrap_or("-");
				let mail = or_dash(identity.mail.as_deref());
				let title = or_dash(identity.job_title.as_deref());
				let department = or_dash(identity.department.as_deref());
				let account = match identity.account_enabled {
					Some(true) => "Enabled",
					Some(false) => "Disabled",
					None => "-",
				};

				if verbose {
					let notes = identity.document.trim();
					format!(
						"{name} ({upn})\n\
						Title: {title} | Department: {department} | Account: {account} | \
						Email: {mail}\n\
						Notes:\n{notes}\n------\n",
						notes = if notes.is_empty() { "-" } else { notes },
					)
				} else {
					format!(
						"{name} - {title}. Dept: {department}. Email: {mail}. UPN: {upn}. \
						Account: {account}."
					)
				}
			},
			Record::AuthEvent(event) => {
				let when = or_dash(event.created.as_deref());
				let app = or_dash(event.app.as_deref());
				let user = or_dash(event.user_display_name.as_deref());
				let upn = or_dash(event.principal_name.as_deref());
				let ip = or_dash(event.ip_address.as_deref());
				let client = or_dash(event.client_app.as_deref());
				let os = or_dash(event.operating_system.as_deref());
				let browser = or_dash(event.browser.as_deref());
				let city = or_dash(event.city.as_deref());
				let country = or_dash(event.country.as_deref());
				let result = or_dash(event.result.as_deref());

				if verbose {
					let notes = event.document.trim();
					format!(
						"{when} | {app}\n\
						User: {user} ({upn}) | Result: {result}\n\
						IP: {ip} | Client: {client} | OS: {os} | Browser: {browser}\n\
						Location: {city}, {country}\n\
						Notes:\n{notes}\n------\n",
						notes = if notes.is_empty() { "-" } else { notes },
					)
				} else {
					format!(
						"{when} - {app}. {user} ({upn}). Result: {result}. IP {ip}. \
						{city}, {country}. Client {client}. OS {os}. Browser {browser}."
					)
				}
			},
		}
	}

	/// Kind-specific field projection returned alongside the raw sources.
	pub fn structured(&self) -> StructuredHit {
		match &self.record {
			Record::WorkItem(item) => StructuredHit::WorkItem(WorkItemView {
				key: item.key.clone(),
				issue_type: item.issue_type.clone(),
				project: item.project_key.clone(),
				parent: item.parent_key.clone(),
				assignee: self.effective_assignee().map(str::to_string),
				reporter: item.reporter.clone(),
				priority: self.effective_priority().map(str::to_string),
				resolution: item.resolution.clone(),
				status: self.effective_status().map(str::to_string),
				created: item.created.clone(),
				updated: self.effective_updated().map(str::to_string),
				labels: item.labels.clone(),
				components: item.components.clone(),
				fix_versions: item.fix_versions.clone(),
				summary: item.summary.clone(),
				description: item.document.trim().to_string(),
			}),
			Record::Identity(identity) => StructuredHit::Identity(IdentityView {
				display_name: identity.display_name.clone(),
				principal_name: identity
					.principal_name
					.clone()
					.or_else(|| identity.mail.clone()),
				mail: identity.mail.clone(),
				job_title: identity.job_title.clone(),
				department: identity.department.clone(),
				account_enabled: identity.account_enabled,
				document: identity.document.trim().to_string(),
			}),
			Record::AuthEvent(event) => StructuredHit::AuthEvent(AuthEventView {
				id: event.id.clone(),
				created: event.created.clone(),
				app: event.app.clone(),
				user_display_name: event.user_display_name.clone(),
				principal_name: event.principal_name.clone(),
				ip_address: event.ip_address.clone(),
				client_app: event.client_app.clone(),
				operating_system: event.operating_system.clone(),
				browser: event.browser.clone(),
				city: event.city.clone(),
				country: event.country.clone(),
				result: event.result.clone(),
				document: event.document.trim().to_string(),
			}),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StructuredHit {
	WorkItem(WorkItemView),
	Identity(IdentityView),
	AuthEvent(AuthEventView),
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkItemView {
	pub key: String,
	pub issue_type: String,
	pub project: String,
	pub parent: Option<String>,
	pub assignee: Option<String>,
	pub reporter: Option<String>,
	pub priority: Option<String>,
	pub resolution: Option<String>,
	pub status: Option<String>,
	pub created: Option<String>,
	pub updated: Option<String>,
	pub labels: Vec<String>,
	pub components: Vec<String>,
	pub fix_versions: Vec<String>,
	pub summary: String,
	pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityView {
	pub display_name: Option<String>,
	pub principal_name: Option<String>,
	pub mail: Option<String>,
	pub job_title: Option<String>,
	pub department: Option<String>,
	pub account_enabled: Option<bool>,
	pub document: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthEventView {
	pub id: Option<String>,
	pub created: Option<String>,
	pub app: Option<String>,
	pub user_display_name: Option<String>,
	pub principal_name: Option<String>,
	pub ip_address: Option<String>,
	pub client_app: Option<String>,
	pub operating_system: Option<String>,
	pub browser: Option<String>,
	pub city: Option<String>,
	pub country: Option<String>,
	pub result: Option<String>,
	pub document: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::{Identity, WorkItem};

	fn work_item_hit() -> RetrievalHit {
		RetrievalHit::new(
			Record::WorkItem(WorkItem {
				key: "OPS-12".to_string(),
				issue_type: "Task".to_string(),
				summary: "Rotate credentials".to_string(),
				status: "Open".to_string(),
				project_key: "OPS".to_string(),
				assignee: Some("Grace".to_string()),
				updated: Some("2024-02-01".to_string()),
				..WorkItem::default()
			}),
			0.12,
		)
	}

	#[test]
	fn overlay_overwrites_only_live_fields() {
		let mut hit = work_item_hit();
		hit.live = Some(LiveFields {
			status: Some("In Progress".to_string()),
			..LiveFields::default()
		});
		assert_eq!(hit.effective_status(), Some("In Progress"));
		assert_eq!(hit.effective_assignee(), Some("Grace"));
		assert_eq!(hit.effective_updated(), Some("2024-02-01"));
	}

	#[test]
	fn compact_work_item_line_uses_effective_fields() {
		let mut hit = work_item_hit();
		hit.live = Some(LiveFields {
			assignee: Some("Lin".to_string()),
			..LiveFields::default()
		});
		let line = hit.context_block(false);
		assert!(line.starts_with("[OPS-12] - Rotate credentials."));
		assert!(line.contains("Assignee: Lin."));
	}

	#[test]
	fn verbose_work_item_synthesizes_missing_description() {
		let hit = work_item_hit();
		let block = hit.context_block(true);
		assert!(block.contains("No description provided for this issue titled 'Rotate credentials'"));
	}

	#[test]
	fn identity_projection_falls_back_to_mail() {
		let hit = RetrievalHit::new(
			Record::Identity(Identity {
				display_name: Some("Ada Lovelace".to_string()),
				mail: Some("ada@example.test".to_string()),
				..Identity::default()
			}),
			0.2,
		);
		match hit.structured() {
			StructuredHit::Identity(view) => {
				assert_eq!(view.principal_name.as_deref(), Some("ada@example.test"));
			},
			other => panic!("Expected an identity projection, got {other:?}."),
		}
	}
}
