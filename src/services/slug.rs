//! URL slugs for posts and courses

use anyhow::Result;
use std::future::Future;

/// Longest slug produced from a title, in characters
const MAX_SLUG_CHARS: usize = 80;

/// Turn a title, or a slug typed by an editor, into a slug.
///
/// ASCII letters and digits are lowercased, other ASCII becomes a hyphen,
/// and non-ASCII letters (Arabic titles, for example) are kept as is.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::new();
    let mut prev_hyphen = true;

    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    slug.trim_end_matches('-').to_string()
}

/// Find a free slug starting from `base`, appending `-2`, `-3`, ... as needed.
///
/// An empty base falls back to `fallback` plus a short random suffix.
pub async fn unique_slug<F, Fut>(base: String, fallback: &str, exists: F) -> Result<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let base = if base.is_empty() {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", fallback, &id[..8])
    } else {
        base
    };

    if !exists(base.clone()).await? {
        return Ok(base);
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum: 2024!  "), "rust-axum-2024");
        assert_eq!(generate_slug("a--b__c"), "a-b-c");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_generate_slug_keeps_arabic() {
        assert_eq!(generate_slug("ملتقى الطلاب 2024"), "ملتقى-الطلاب-2024");
    }

    #[test]
    fn test_generate_slug_is_bounded() {
        let long = "word ".repeat(100);
        let slug = generate_slug(&long);
        assert!(slug.chars().count() <= MAX_SLUG_CHARS);
        assert!(!slug.ends_with('-'));
    }

    #[tokio::test]
    async fn test_unique_slug_appends_suffix() {
        let taken = ["intro".to_string(), "intro-2".to_string()];
        let slug = unique_slug("intro".to_string(), "post", |s| {
            let hit = taken.contains(&s);
            async move { Ok(hit) }
        })
        .await
        .unwrap();
        assert_eq!(slug, "intro-3");
    }

    #[tokio::test]
    async fn test_unique_slug_empty_base_uses_fallback() {
        let slug = unique_slug(String::new(), "course", |_| async { Ok(false) })
            .await
            .unwrap();
        assert!(slug.starts_with("course-"));
        assert_eq!(slug.len(), "course-".len() + 8);
    }
}
