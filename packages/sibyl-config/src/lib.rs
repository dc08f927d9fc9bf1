mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answer, ChatProviderConfig, Config, Directory, EmbeddingProviderConfig, Index, Providers,
	Service, Sources, Tracker,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.index.dimensions == 0 {
		return Err(Error::Validation {
			message: "index.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.index.dimensions {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match index.dimensions.".to_string(),
		});
	}
	if cfg.providers.embedding.batch_size == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.answer.top_k == 0 {
		return Err(Error::Validation {
			message: "answer.top_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.answer.temperature.is_finite() {
		return Err(Error::Validation {
			message: "answer.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.answer.temperature) {
		return Err(Error::Validation {
			message: "answer.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}
	if cfg.answer.max_tokens == 0 {
		return Err(Error::Validation {
			message: "answer.max_tokens must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("providers.embedding.api_key", &cfg.providers.embedding.api_key),
		("providers.chat.api_key", &cfg.providers.chat.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}
	if cfg.providers.chat.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.chat.model must be non-empty.".to_string(),
		});
	}
	if cfg.providers.chat.fallback_model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.chat.fallback_model must be non-empty.".to_string(),
		});
	}

	if let Some(tracker) = cfg.sources.tracker.as_ref() {
		for (label, value) in [
			("sources.tracker.base_url", &tracker.base_url),
			("sources.tracker.username", &tracker.username),
			("sources.tracker.token", &tracker.token),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}
		if !(1..=1_000).contains(&tracker.page_size) {
			return Err(Error::Validation {
				message: "sources.tracker.page_size must be in the range 1-1000.".to_string(),
			});
		}
	}
	if let Some(directory) = cfg.sources.directory.as_ref() {
		for (label, value) in [
			("sources.directory.tenant_id", &directory.tenant_id),
			("sources.directory.client_id", &directory.client_id),
			("sources.directory.client_secret", &directory.client_secret),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	trim_trailing_slash(&mut cfg.providers.embedding.api_base);
	trim_trailing_slash(&mut cfg.providers.chat.api_base);
	if let Some(tracker) = cfg.sources.tracker.as_mut() {
		trim_trailing_slash(&mut tracker.base_url);
	}
}

fn trim_trailing_slash(url: &mut String) {
	while url.ends_with('/') {
		url.pop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trims_trailing_slashes() {
		let mut url = "https://example.test/api//".to_string();
		trim_trailing_slash(&mut url);
		assert_eq!(url, "https://example.test/api");
	}
}
