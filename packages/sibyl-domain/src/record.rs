use serde::{Deserialize, Serialize};

/// Determines schema, identity key, rendering, and default instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	WorkItem,
	Identity,
	AuthEvent,
}
impl RecordKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::WorkItem => "work_item",
			Self::Identity => "identity",
			Self::AuthEvent => "auth_event",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
	Outward,
	Inward,
}
impl LinkDirection {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Outward => "outward",
			Self::Inward => "inward",
		}
	}
}

/// A typed directional dependency between work items. Every link carries
/// exactly one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLink {
	pub direction: LinkDirection,
	pub link_type: String,
	pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItem {
	pub key: String,
	pub issue_type: String,
	pub summary: String,
	pub status: String,
	pub project_key: String,
	#[serde(default)]
	pub parent_key: Option<String>,
	#[serde(default)]
	pub dependencies: Vec<DependencyLink>,
	#[serde(default)]
	pub assignee: Option<String>,
	#[serde(default)]
	pub reporter: Option<String>,
	#[serde(default)]
	pub priority: Option<String>,
	#[serde(default)]
	pub resolution: Option<String>,
	#[serde(default)]
	pub created: Option<String>,
	#[serde(default)]
	pub updated: Option<String>,
	#[serde(default)]
	pub labels: Vec<String>,
	#[serde(default)]
	pub components: Vec<String>,
	#[serde(default)]
	pub fix_versions: Vec<String>,
	/// Free-text description as delivered by the tracker.
	#[serde(default)]
	pub document: String,
}
impl WorkItem {
	/// Render a single self-contained text block suitable for embedding.
	pub fn to_document(&self) -> String {
		let deps = if self.dependencies.is_empty() {
			"None".to_string()
		} else {
			self.dependencies
				.iter()
				.map(|dep| format!("{} {}", dep.direction.as_str().to_uppercase(), dep.key))
				.collect::<Vec<_>>()
				.join(", ")
		};

		format!(
			"[{issue_type}] {key}\n\
			Status: {status}\n\
			Project: {project}\n\
			Parent: {parent}\n\
			Assignee: {assignee}\n\
			Reporter: {reporter}\n\
			Priority: {priority}\n\
			Resolution: {resolution}\n\
			Created: {created}\n\
			Updated: {updated}\n\
			Labels: {labels}\n\
			Components: {components}\n\
			Fix Versions: {fixes}\n\
			Dependencies: {deps}\n\n\
			Summary:\n{summary}\n\n\
			Description:\n{document}",
			issue_type = self.issue_type.to_uppercase(),
			key = self.key,
			status = self.status,
			project = self.project_key,
			parent = or_dash(self.parent_key.as_deref()),
			assignee = or_dash(self.assignee.as_deref()),
			reporter = or_dash(self.reporter.as_deref()),
			priority = or_dash(self.priority.as_deref()),
			resolution = or_dash(self.resolution.as_deref()),
			created = or_dash(self.created.as_deref()),
			updated = or_dash(self.updated.as_deref()),
			labels = join_or_none(&self.labels),
			components = join_or_none(&self.components),
			fixes = join_or_none(&self.fix_versions),
			deps = deps,
			summary = self.summary,
			document = self.document,
		)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub display_name: Option<String>,
	#[serde(default)]
	pub principal_name: Option<String>,
	#[serde(default)]
	pub mail: Option<String>,
	#[serde(default)]
	pub job_title: Option<String>,
	#[serde(default)]
	pub department: Option<String>,
	#[serde(default)]
	pub account_enabled: Option<bool>,
	#[serde(default)]
	pub document: String,
}
impl Identity {
	pub fn to_document(&self) -> String {
		format!(
			"Name: {name}\n\
			UPN: {upn}\n\
			Email: {mail}\n\
			Title: {title}\n\
			Department: {department}\n\
			Source: directory users",
			name = or_dash(self.display_name.as_deref()),
			upn = or_dash(self.principal_name.as_deref()),
			mail = or_dash(self.mail.as_deref()),
			title = or_dash(self.job_title.as_deref()),
			department = or_dash(self.department.as_deref()),
		)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthEvent {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub created: Option<String>,
	#[serde(default)]
	pub app: Option<String>,
	#[serde(default)]
	pub user_display_name: Option<String>,
	#[serde(default)]
	pub principal_name: Option<String>,
	#[serde(default)]
	pub ip_address: Option<String>,
	#[serde(default)]
	pub client_app: Option<String>,
	#[serde(default)]
	pub operating_system: Option<String>,
	#[serde(default)]
	pub browser: Option<String>,
	#[serde(default)]
	pub city: Option<String>,
	#[serde(default)]
	pub country: Option<String>,
	#[serde(default)]
	pub result: Option<String>,
	#[serde(default)]
	pub document: String,
}
impl AuthEvent {
	pub fn to_document(&self) -> String {
		format!(
			"Sign-in ID: {id}\n\
			User: {user} ({upn})\n\
			When: {when}\n\
			App: {app}\n\
			Client: {client}\n\
			IP: {ip}\n\
			Device OS: {os}\n\
			Browser: {browser}\n\
			Location: {city}, {country}\n\
			Result: {result}\n\
			Source: sign-in audit log",
			id = or_dash(self.id.as_deref()),
			user = or_dash(self.user_display_name.as_deref()),
			upn = or_dash(self.principal_name.as_deref()),
			when = or_dash(self.created.as_deref()),
			app = or_dash(self.app.as_deref()),
			client = or_dash(self.client_app.as_deref()),
			ip = or_dash(self.ip_address.as_deref()),
			os = or_dash(self.operating_system.as_deref()),
			browser = or_dash(self.browser.as_deref()),
			city = or_dash(self.city.as_deref()),
			country = or_dash(self.country.as_deref()),
			result = or_dash(self.result.as_deref()),
		)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
	WorkItem(WorkItem),
	Identity(Identity),
	AuthEvent(AuthEvent),
}
impl Record {
	pub fn kind(&self) -> RecordKind {
		match self {
			Self::WorkItem(_) => RecordKind::WorkItem,
			Self::Identity(_) => RecordKind::Identity,
			Self::AuthEvent(_) => RecordKind::AuthEvent,
		}
	}

	/// The text embedded into the vector index. Falls back to a field render
	/// when no document was stored.
	pub fn embedding_document(&self) -> String {
		match self {
			Self::WorkItem(item) => item.to_document(),
			Self::Identity(identity) =>
				if identity.document.trim().is_empty() {
					identity.to_document()
				} else {
					identity.document.clone()
				},
			Self::AuthEvent(event) =>
				if event.document.trim().is_empty() {
					event.to_document()
				} else {
					event.document.clone()
				},
		}
	}

	/// Kind-specific identity used to collapse duplicate hits. `None` means
	/// the record cannot be identified and must never be collapsed.
	pub fn identity_key(&self) -> Option<String> {
		match self {
			Self::WorkItem(item) => non_blank(Some(&item.key)),
			Self::Identity(identity) => non_blank(identity.principal_name.as_ref())
				.or_else(|| non_blank(identity.mail.as_ref()))
				.or_else(|| non_blank(identity.display_name.as_ref()))
				.or_else(|| non_blank(identity.id.as_ref())),
			Self::AuthEvent(event) => non_blank(event.id.as_ref()).or_else(|| {
				if event.principal_name.is_none()
					&& event.created.is_none()
					&& event.app.is_none()
				{
					return None;
				}
				Some(format!(
					"{}|{}|{}",
					or_dash(event.principal_name.as_deref()),
					or_dash(event.created.as_deref()),
					or_dash(event.app.as_deref()),
				))
			}),
		}
	}
}

fn non_blank(value: Option<&String>) -> Option<String> {
	value.map(|text| text.trim()).filter(|text| !text.is_empty()).map(str::to_string)
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
	match value {
		Some(text) if !text.trim().is_empty() => text,
		_ => "-",
	}
}

pub(crate) fn join_or_none(values: &[String]) -> String {
	if values.is_empty() { "None".to_string() } else { values.join(", ") }
}

pub(crate) fn join_or_dash(values: &[String]) -> String {
	if values.is_empty() { "-".to_string() } else { values.join(", ") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn work_item_document_renders_dependencies() {
		let item = WorkItem {
			key: "OPS-7".to_string(),
			issue_type: "Bug".to_string(),
			summary: "Fix the pager".to_string(),
			status: "Open".to_string(),
			project_key: "OPS".to_string(),
			dependencies: vec![DependencyLink {
				direction: LinkDirection::Inward,
				link_type: "is blocked by".to_string(),
				key: "OPS-6".to_string(),
			}],
			..WorkItem::default()
		};
		let doc = item.to_document();
		assert!(doc.starts_with("[BUG] OPS-7"));
		assert!(doc.contains("Dependencies: INWARD OPS-6"));
		assert!(doc.contains("Summary:\nFix the pager"));
	}

	#[test]
	fn identity_key_prefers_principal_name() {
		let record = Record::Identity(Identity {
			principal_name: Some("ada@example.test".to_string()),
			mail: Some("ada.l@example.test".to_string()),
			display_name: Some("Ada Lovelace".to_string()),
			..Identity::default()
		});
		assert_eq!(record.identity_key().as_deref(), Some("ada@example.test"));
	}

	#[test]
	fn auth_event_key_falls_back_to_composite() {
		let record = Record::AuthEvent(AuthEvent {
			principal_name: Some("ada@example.test".to_string()),
			created: Some("2024-03-01T12:00:00Z".to_string()),
			app: Some("Teams".to_string()),
			..AuthEvent::default()
		});
		assert_eq!(
			record.identity_key().as_deref(),
			Some("ada@example.test|2024-03-01T12:00:00Z|Teams")
		);
	}

	#[test]
	fn unidentifiable_records_have_no_key() {
		assert_eq!(Record::AuthEvent(AuthEvent::default()).identity_key(), None);
		assert_eq!(Record::Identity(Identity::default()).identity_key(), None);
	}
}
