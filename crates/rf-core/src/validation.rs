//! Input rules checked before anything is persisted.

use uuid::Uuid;

use crate::error::{AppError, Result};

pub const MAX_POST_CONTENT: usize = 500;
pub const MAX_COMMENT_CONTENT: usize = 500;
pub const MAX_TOPIC_NAME: usize = 100;

/// Non-empty after trimming and at most `max` characters.
pub fn content(field: &str, raw: &str, max: usize) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(AppError::validation(format!("{field} may not be blank")));
    }
    let len = raw.chars().count();
    if len > max {
        return Err(AppError::validation(format!(
            "{field} is {len} characters, the limit is {max}"
        )));
    }
    Ok(raw.to_string())
}

pub fn post_content(raw: &str) -> Result<String> {
    content("content", raw, MAX_POST_CONTENT)
}

pub fn comment_content(raw: &str) -> Result<String> {
    content("content", raw, MAX_COMMENT_CONTENT)
}

/// Topic names are stored trimmed.
pub fn topic_name(raw: &str) -> Result<String> {
    content("name", raw.trim(), MAX_TOPIC_NAME)
}

/// Drops repeated ids, keeping first occurrence order.
pub fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

/// `posts/<uuid>.<ext>` with the extension taken from the client file name.
pub fn media_path(prefix: &str, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}/{}.{}", prefix, Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_and_oversized_content() {
        assert!(post_content("").is_err());
        assert!(post_content("   \n").is_err());
        assert!(post_content(&"x".repeat(MAX_POST_CONTENT + 1)).is_err());
        assert_eq!(post_content(&"x".repeat(MAX_POST_CONTENT)).unwrap().len(), MAX_POST_CONTENT);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let emoji = "é".repeat(MAX_POST_CONTENT);
        assert!(post_content(&emoji).is_ok());
    }

    #[test]
    fn topic_names_are_trimmed() {
        assert_eq!(topic_name("  Rust ").unwrap(), "Rust");
        assert!(topic_name(&"n".repeat(MAX_TOPIC_NAME + 1)).is_err());
    }

    #[test]
    fn dedup_keeps_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(dedup_ids(&[a, b, a]), vec![a, b]);
    }

    #[test]
    fn media_path_keeps_lowercase_extension() {
        let path = media_path("posts", "Holiday.JPG");
        assert!(path.starts_with("posts/"));
        assert!(path.ends_with(".jpg"));

        assert!(media_path("comments", "noext").ends_with(".bin"));
        assert!(media_path("posts", "../../etc/pa.ss/wd").ends_with(".bin"));
    }
}
