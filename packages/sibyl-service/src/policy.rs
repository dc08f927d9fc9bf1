use serde::{Deserialize, Serialize};

use sibyl_domain::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
	System,
	User,
}

/// An ordered, role-tagged unit of text sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionBlock {
	pub role: ChatRole,
	pub text: String,
}
impl InstructionBlock {
	pub fn system(text: impl Into<String>) -> Self {
		Self { role: ChatRole::System, text: text.into() }
	}

	pub fn user(text: impl Into<String>) -> Self {
		Self { role: ChatRole::User, text: text.into() }
	}

	/// Chat-completions message shape.
	pub fn to_message(&self) -> serde_json::Value {
		let role = match self.role {
			ChatRole::System => "system",
			ChatRole::User => "user",
		};
		serde_json::json!({ "role": role, "content": self.text })
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
	Light,
	#[default]
	Medium,
	Heavy,
}
impl Intensity {
	/// Unrecognized levels fall back to medium, matching the UI contract.
	pub fn parse(text: &str) -> Self {
		match text.trim().to_lowercase().as_str() {
			"light" => Self::Light,
			"heavy" => Self::Heavy,
			_ => Self::Medium,
		}
	}

	/// Per-paragraph quota of persona-flavored constructs.
	pub fn quota(self) -> usize {
		match self {
			Self::Light => 1,
			Self::Medium => 2,
			Self::Heavy => 3,
		}
	}
}

/// Audience framing for work-item answers; other record kinds ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceRole {
	Developer,
	Manager,
	Executive,
}
impl AudienceRole {
	pub fn parse(text: &str) -> Option<Self> {
		match text.trim().to_lowercase().as_str() {
			"developer" => Some(Self::Developer),
			"manager" => Some(Self::Manager),
			"executive" => Some(Self::Executive),
			_ => None,
		}
	}
}

/// Question-scoped knobs. `None` falls back to the configured default.
#[derive(Debug, Clone, Default)]
pub struct AnswerKnobs {
	pub top_k: Option<u32>,
	pub role: Option<AudienceRole>,
	pub persona: Option<String>,
	pub intensity: Intensity,
	pub language: Option<String>,
	pub temperature: Option<f32>,
	pub max_tokens: Option<u32>,
	pub verbose: bool,
	pub multi_section: bool,
	pub append_joke: bool,
}

/// Compile the knob set into the ordered instruction blocks: language
/// directive, persona voice rules, persona reinforcement, format lock, humor
/// rule, base instructions. Omitted knobs omit their block; the relative
/// order never changes. Pure function of the knobs.
pub fn compile(kind: RecordKind, knobs: &AnswerKnobs) -> Vec<InstructionBlock> {
	let persona = normalize_persona(knobs.persona.as_deref());
	let intensity = effective_intensity(persona.as_deref(), knobs);
	let language = effective_language(knobs);

	let mut blocks = Vec::new();
	if let Some(code) = language.as_deref() {
		blocks.push(InstructionBlock::system(language_directive(code)));
	}
	if let Some(name) = persona.as_deref() {
		blocks.push(InstructionBlock::system(format!(
			"{} Do not alter required section headings or their order when present.",
			persona_rules(name, intensity.quota()),
		)));
		blocks.push(InstructionBlock::system(
			"Always maintain this persona unless explicitly told otherwise. Avoid corporate \
			boilerplate phrasing; be concise and persona-consistent.",
		));
	}
	if knobs.multi_section {
		blocks.push(InstructionBlock::system(format_lock(kind, language.as_deref())));
	}
	if knobs.append_joke {
		let mut rule = HUMOR_RULE.to_string();
		if language.is_some() {
			rule.push_str("\nApply the language and locale requirement to the dad joke as well.");
		}
		blocks.push(InstructionBlock::system(rule));
	}
	blocks.push(InstructionBlock::system(base_instructions(kind, knobs.role, knobs.multi_section)));

	blocks
}

/// Trim and lowercase; the "no persona" spellings UIs send all collapse to
/// `None`.
pub fn normalize_persona(persona: Option<&str>) -> Option<String> {
	let persona = persona?.trim().to_lowercase();
	match persona.as_str() {
		"" | "none" | "default" | "off" | "no" => None,
		_ => Some(persona),
	}
}

/// The inverting voice drifts off-style in sectioned output at the default
/// level, so that combination escalates to the top tier.
pub(crate) fn effective_intensity(persona: Option<&str>, knobs: &AnswerKnobs) -> Intensity {
	if persona == Some("yoda") && knobs.multi_section && knobs.intensity == Intensity::Medium {
		Intensity::Heavy
	} else {
		knobs.intensity
	}
}

/// Canonical locale code for the language knob; blank means no directive.
pub(crate) fn effective_language(knobs: &AnswerKnobs) -> Option<String> {
	let language = knobs.language.as_deref()?.trim();
	if language.is_empty() {
		return None;
	}

	Some(canonical_language(language))
}

/// Known aliases map to their canonical code; unknown codes pass through.
fn canonical_language(language: &str) -> String {
	match language.to_lowercase().as_str() {
		"english" => "en",
		"francais" | "français" => "fr",
		"francais (quebec)" | "français (québec)" | "quebec french" | "qc" => "fr-CA",
		"pt-br" => "pt-BR",
		"zh" | "cn" => "zh-CN",
		_ => return language.to_string(),
	}
	.to_string()
}

fn language_directive(code: &str) -> String {
	format!(
		"LANGUAGE POLICY:\n\
		- Write all explanatory text, section headings, and conclusions in '{code}'.\n\
		- Do not translate, rewrite, or normalize any literal values coming from the Context \
		block: names, job titles, departments, group names, item keys, statuses, labels, \
		principal names, emails, IDs, dates. Quote them verbatim as data.\n\
		- If a value appears in another language or script in the context, leave it as-is. Only \
		the surrounding narration and headings are localized.\n\
		- When listing fields, keep their values exactly as given; only the connective prose is \
		localized."
	)
}

fn persona_rules(name: &str, quota: usize) -> String {
	let persona = match name {
		"pirate" => format!(
			"Persona: classic sea pirate.\n\
			- Quota: include at least {quota} pirate-flavored phrases per paragraph (nautical \
			slang, 'Arrr').\n\
			- Maintain clarity; never obscure identifiers.\n"
		),
		"yoda" => format!(
			"Persona: Yoda.\n\
			- Use inverted syntax frequently (object before subject and verb) and brief \
			interjections ('Hmm.', 'Hrrrm.', 'Yes.').\n\
			- Quota: include at least {quota} inverted sentences per paragraph.\n\
			- Example templates: 'Open the issue remains.' 'At risk, this project is.' 'Blocked \
			by X, the team is.'\n"
		),
		"shakespeare" => format!(
			"Persona: Elizabethan playwright.\n\
			- Quota: include at least {quota} light Elizabethan flourishes per paragraph.\n"
		),
		"executive-snark" => format!(
			"Persona: executive with dry wit.\n\
			- Quota: include at least {quota} wry, incisive lines per paragraph.\n\
			- Keep it professional; never disrespectful.\n"
		),
		other => format!(
			"Persona: {other}. Maintain a consistent, recognizable voice in every paragraph.\n\
			- Quota: include at least {quota} persona-typical sentences per paragraph.\n"
		),
	};

	format!(
		"{persona}\n\
		Style rules:\n\
		- Keep average sentence length under about 18 words.\n\
		- Prefer simple clauses over compound ones to keep the tone.\n\
		- Avoid generic corporate phrasing.\n\
		Truthfulness and data rules:\n\
		- Stay strictly grounded in the provided context.\n\
		- Do not invent fields or values; preserve identifiers, numbers, statuses, and dates \
		exactly.\n\
		- If the persona conflicts with clarity, prefer clarity but still meet the quota.\n\
		Self-check:\n\
		- For each paragraph, verify the quota is met; if not, rewrite that paragraph before \
		finalizing."
	)
}

/// Fixed opener phrase prepended to persona answers; the two named voices
/// shift at the top intensity tier. Unlisted personas have no opener.
pub(crate) fn persona_opener(name: &str, intensity: Intensity) -> Option<&'static str> {
	let opener = match (name, intensity) {
		("yoda", Intensity::Heavy) => "Hrrrm.",
		("yoda", _) => "Hmm.",
		("pirate", Intensity::Heavy) => "Arrr!",
		("pirate", _) => "Arrr.",
		("shakespeare", _) => "Forsooth,",
		("executive-snark", _) => "Short version:",
		_ => return None,
	};

	Some(opener)
}

/// Just-in-time reinforcement placed after the context block.
pub(crate) const PERSONA_REMINDER: &str = "Persona enforcement:\n\
	- Apply the requested persona consistently in every paragraph.\n\
	- Meet the per-paragraph quota described above.\n\
	- If any paragraph fails the quota, rewrite that paragraph before finalizing.\n\
	- Keep section headings and all data values exactly as given.";

const HUMOR_RULE: &str = "Humor rule: After you finish your complete answer, append exactly one \
	extra line:\n\
	PS (Dad joke): <one short, corny, G-rated one-liner>\n\
	The joke must be grounded in the content of the answer you just wrote, not the user's \
	question wording. Keep it to one sentence. If four-section output is enabled, the joke comes \
	after all sections.";

pub(crate) fn format_lock(kind: RecordKind, language: Option<&str>) -> String {
	let [h1, h2, h3, h4] = locked_headings(kind, language);
	format!(
		"FORMAT LOCK: Produce exactly four sections with these exact headings, in this order:\n\
		1. {h1}\n\
		2. {h2}\n\
		3. {h3}\n\
		4. {h4}\n\
		Do not rename the headings. If a section has no content, write 'No relevant items.'"
	)
}

/// A region code falls back to its bare language; unknown codes fall back to
/// English.
fn locked_headings(kind: RecordKind, language: Option<&str>) -> [&'static str; 4] {
	let lookup = match kind {
		RecordKind::WorkItem => work_item_headings,
		RecordKind::Identity => identity_headings,
		RecordKind::AuthEvent => auth_event_headings,
	};

	let code = language.unwrap_or("en").to_lowercase();
	if let Some(headings) = lookup(&code) {
		return headings;
	}
	if let Some((base, _)) = code.split_once('-') {
		if let Some(headings) = lookup(base) {
			return headings;
		}
	}

	lookup("en").expect("English headings must exist.")
}

fn work_item_headings(code: &str) -> Option<[&'static str; 4]> {
	Some(match code {
		"en" => [
			"Detailed Summary",
			"Technical Summary",
			"Management Summary",
			"Overall Project Summary",
		],
		"fr" | "fr-ca" => [
			"Résumé détaillé",
			"Résumé technique",
			"Résumé pour la direction",
			"Résumé global du projet",
		],
		"es" => [
			"Resumen detallado",
			"Resumen técnico",
			"Resumen para la dirección",
			"Resumen general del proyecto",
		],
		"de" => [
			"Detaillierte Zusammenfassung",
			"Technische Zusammenfassung",
			"Management-Zusammenfassung",
			"Gesamtzusammenfassung des Projekts",
		],
		"it" => [
			"Riepilogo dettagliato",
			"Riepilogo tecnico",
			"Riepilogo per la direzione",
			"Riepilogo complessivo del progetto",
		],
		"pt-br" => [
			"Resumo detalhado",
			"Resumo técnico",
			"Resumo para a diretoria",
			"Resumo geral do projeto",
		],
		"ja" => ["詳細サマリー", "技術サマリー", "マネジメントサマリー", "プロジェクト全体のサマリー"],
		"ko" => ["상세 요약", "기술 요약", "경영 요약", "프로젝트 전반 요약"],
		"zh-cn" => ["详细摘要", "技术摘要", "管理摘要", "项目总体摘要"],
		_ => return None,
	})
}

fn identity_headings(code: &str) -> Option<[&'static str; 4]> {
	Some(match code {
		"en" =>
			["People Overview", "Managers & Leads (Inferred)", "Org Signals", "Actions & Follow-ups"],
		"fr" | "fr-ca" => [
			"Aperçu des personnes",
			"Gestionnaires et responsables (inférés)",
			"Signaux d'organisation",
			"Actions et suivis",
		],
		"es" => [
			"Resumen de personas",
			"Gerentes y líderes (inferidos)",
			"Señales de organización",
			"Acciones y seguimientos",
		],
		_ => return None,
	})
}

fn auth_event_headings(code: &str) -> Option<[&'static str; 4]> {
	Some(match code {
		"en" => [
			"Auth Activity Overview",
			"Failures & Risk Signals",
			"Geo & Device Patterns",
			"Actions & Queries",
		],
		"fr" | "fr-ca" => [
			"Aperçu de l'activité d'authentification",
			"Échecs et signaux de risque",
			"Schémas géo et appareils",
			"Actions et requêtes",
		],
		"es" => [
			"Resumen de actividad de autenticación",
			"Fallos y señales de riesgo",
			"Patrones geográficos y de dispositivos",
			"Acciones y consultas",
		],
		_ => return None,
	})
}

/// Exactly one base block: kind-specific framing, or for work items one of
/// the audience-role framings, else the sectioned narrative framing, else
/// the default verbose-analyst framing.
fn base_instructions(
	kind: RecordKind,
	role: Option<AudienceRole>,
	multi_section: bool,
) -> String {
	match kind {
		RecordKind::Identity =>
			if multi_section {
				"You are an HR and people-analytics assistant summarizing directory identity \
				records. Use only the fields provided in context (display name, principal name, \
				email, job title, department, account state, plus a short notes string). Answer \
				plainly about people, roles, and organizational hints. Avoid issue-tracker \
				terminology.\n\n\
				Output must include four sections:\n\
				1. People Overview - who is in scope (counts, notable departments and titles, \
				unknowns).\n\
				2. Managers & Leads (Inferred) - based on job titles only (titles containing \
				'Manager', 'Lead', 'Director'). Call out uncertainty.\n\
				3. Org Signals - department or naming patterns that indicate teams or \
				functions.\n\
				4. Actions & Follow-ups - data gaps (missing titles or emails), suggested \
				clarifications."
					.to_string()
			} else {
				"You are an HR and people-analytics assistant summarizing directory identity \
				records. Use display name, principal name or email, job title, department, \
				account state, and the provided notes. Answer about people and teams; do not \
				drift into issue-tracker terminology."
					.to_string()
			},
		RecordKind::AuthEvent =>
			if multi_section {
				"You are a security operations analyst summarizing sign-in audit events. Use \
				only the fields in context (timestamp, application, user display name, \
				principal name, IP address, client application, operating system, browser, \
				city, country or region, result) plus the provided notes. Identify failure \
				patterns, risky geographies and devices, and actionable follow-ups.\n\n\
				Output must include four sections:\n\
				1. Auth Activity Overview - volume, the time window implied by the context, \
				notable applications and users.\n\
				2. Failures & Risk Signals - error trends, repeated failures, impossible-travel \
				hints, suspicious IP and device patterns.\n\
				3. Geo & Device Patterns - cities and countries, OS and browser clusters, \
				client application anomalies.\n\
				4. Actions & Queries - concrete next steps (audit-log filters, MFA checks, \
				conditional access review)."
					.to_string()
			} else {
				"You are a security operations analyst summarizing sign-in audit events. Focus \
				on failures, anomalies, and practical next steps. Keep findings concise and \
				actionable."
					.to_string()
			},
		RecordKind::WorkItem => match role {
			Some(AudienceRole::Developer) =>
				"You are a senior developer who lives in the issue tracker. Summarize work \
				items with technical clarity, focusing on code impact, blockers, dependencies, \
				and implementation progress. Include statuses, priorities, fix versions, and \
				technical labels. Use [KEY] format for references."
					.to_string(),
			Some(AudienceRole::Manager) =>
				"You are a project manager reviewing work items. Track task ownership, delays, \
				risks, overdue work, and workload distribution. Summarize who is responsible, \
				what is at risk, and what requires follow-up. Use [KEY] format to cite items."
					.to_string(),
			Some(AudienceRole::Executive) =>
				"You are preparing a briefing for senior leadership. Produce a high-level \
				summary of work items across projects, including project health, delivery \
				risk, and resourcing trends. Do not mention individuals unless critical. Focus \
				on portfolio-level risk and progress signals. Cite item [KEY]s where relevant."
					.to_string(),
			None =>
				if multi_section {
					"You are a seasoned issue-tracker analyst generating comprehensive \
					summaries for a cross-functional audience. Produce verbose, insightful \
					narratives, not lists or field dumps.\n\n\
					Output must include four sections:\n\
					1. Detailed Summary - paragraphs per item using the metadata fields. Give \
					context, owners, status, risks.\n\
					2. Technical Summary - developer-oriented overview. Focus on progress, \
					blockers, and priorities.\n\
					3. Management Summary - high-level report for leadership. Include overall \
					status, overdue and at-risk items, trends.\n\
					4. Overall Project Summary - an integrated narrative summarizing health \
					and risk across all items provided.\n\n\
					Use [KEY] when referencing items."
						.to_string()
				} else {
					"You are a senior issue-tracker analyst producing detailed summaries. \
					Always write in verbose paragraph style.\n\
					Start with an overall project-level overview (item counts, open and closed \
					status).\n\
					Then, for each item, write a paragraph covering:\n\
					- Summary and description\n\
					- Responsible parties (assignee, reporter)\n\
					- Lifecycle status (status, resolution, updated date)\n\
					- Labels, components, fix versions\n\
					- Urgency or blocking context\n\
					- Item keys in [KEY] format\n\
					Conclude with executive-style insights or risk highlights."
						.to_string()
				},
		},
	}
}
