use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{Error, Result};

/// One completion call against a chat-completions shaped endpoint. A 403 is
/// surfaced as `Error::PermissionDenied` with the upstream body so the caller
/// can decide whether a model fallback applies.
pub async fn generate(
	cfg: &sibyl_config::ChatProviderConfig,
	model: &str,
	messages: &[Value],
	temperature: f32,
	max_tokens: u32,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": model,
		"messages": messages,
		"temperature": temperature,
		"max_tokens": max_tokens,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key)?)
		.json(&body)
		.send()
		.await?;

	let status = res.status();
	if status == StatusCode::FORBIDDEN {
		let message = crate::truncate_body(res.text().await.unwrap_or_default());
		return Err(Error::PermissionDenied { message });
	}
	if !status.is_success() {
		let message = crate::truncate_body(res.text().await.unwrap_or_default());
		return Err(Error::Upstream { status: status.as_u16(), message });
	}

	let json: Value = res.json().await?;

	parse_completion_response(json)
}

fn parse_completion_response(json: Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing message content.".to_string(),
		})?;

	Ok(content.trim().to_string())
}
