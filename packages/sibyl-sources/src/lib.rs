pub mod graph;
pub mod tracker;

mod error;

pub use error::{Error, Result};

pub(crate) fn truncate_body(body: String) -> String {
	const MAX_CHARS: usize = 300;

	if body.chars().count() <= MAX_CHARS {
		return body;
	}
	body.chars().take(MAX_CHARS).collect()
}
