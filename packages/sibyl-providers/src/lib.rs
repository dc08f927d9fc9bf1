pub mod embedding;
pub mod generate;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap};

pub(crate) fn auth_headers(api_key: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	Ok(headers)
}

pub(crate) fn truncate_body(body: String) -> String {
	const MAX_CHARS: usize = 300;

	if body.chars().count() <= MAX_CHARS {
		return body;
	}
	body.chars().take(MAX_CHARS).collect()
}
