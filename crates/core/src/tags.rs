//! Tag parsing for the comma-separated tag field of the log form.

/// Split a raw tag field into clean tags.
///
/// Tokens are trimmed, empty tokens are dropped, case is preserved, and a tag
/// repeated within the same field is kept only once (first occurrence wins).
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in raw.split(',') {
        let tag = token.trim();
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}

/// Join tags back into the comma-separated form used by exports.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}
