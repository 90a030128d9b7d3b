//! Identifier formatting for log output.

/// Shortens an identifier for display.
///
/// Keeps the first 8 characters followed by ".." for longer ids. Cuts on a
/// char boundary so non-ASCII ids never panic.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}
