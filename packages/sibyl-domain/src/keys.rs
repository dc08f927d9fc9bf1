use std::sync::LazyLock;

use regex::Regex;

/// Uppercase project code, dash, number, e.g. `OPS-142` or `SRE_2-9`.
static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"[A-Z][A-Z0-9_]+-\d+").expect("Work-item key pattern must compile.")
});

/// Scan free text for work-item keys, first occurrence order, no duplicates.
pub fn extract_keys(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	for found in KEY_PATTERN.find_iter(text) {
		let key = found.as_str();
		if !out.iter().any(|existing| existing == key) {
			out.push(key.to_string());
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_keys_in_prose() {
		let keys = extract_keys("Is OPS-142 still blocked by CORE_2-9 or OPS-142?");
		assert_eq!(keys, vec!["OPS-142".to_string(), "CORE_2-9".to_string()]);
	}

	#[test]
	fn ignores_lowercase_and_bare_numbers() {
		assert!(extract_keys("ops-142 and 12-34 and ABC").is_empty());
	}
}
