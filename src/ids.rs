//! Pure derivation functions for file identifiers, object keys, and public
//! URLs (spec §3 FileRecord). Kept free of I/O and clocks so they can be unit
//! tested directly against the formulas.

use sha2::{Digest, Sha256};

const USER_HASH_SALT_PREFIX: &str = "weblinq_user_";
const USER_HASH_SALT_SUFFIX: &str = "_salt_2025";

/// `sha256(user_id ∥ kind ∥ source_url ∥ created_at_unix_ms)`, first 12 hex chars.
pub fn file_id(user_id: &str, kind: &str, source_url: &str, created_at_unix_ms: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(kind.as_bytes());
    hasher.update(source_url.as_bytes());
    hasher.update(created_at_unix_ms.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..12].to_string()
}

/// `sha256("weblinq_user_" ∥ user_id ∥ "_salt_2025")[0:16 hex]`.
pub fn user_hash(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(USER_HASH_SALT_PREFIX.as_bytes());
    hasher.update(user_id.as_bytes());
    hasher.update(USER_HASH_SALT_SUFFIX.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Domain component of a filename, stripped to characters safe for a path
/// segment. Falls back to `"unknown"` when the URL carries no host.
pub fn sanitized_domain(source_url: &str) -> String {
    let host = url::Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    sanitize_filename::sanitize(host.replace(':', "_"))
}

/// `"{sanitized_domain}_{created_at_unix_ms}.{ext}"`.
pub fn filename(source_url: &str, created_at_unix_ms: u64, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitized_domain(source_url),
        created_at_unix_ms,
        ext
    )
}

/// `"{kind}s/{user_hash}/{yyyy-mm-dd}/{filename}"`.
pub fn object_key(
    kind: &str,
    user_id: &str,
    created_at: chrono::DateTime<chrono::Utc>,
    filename: &str,
) -> String {
    format!(
        "{kind}s/{}/{}/{filename}",
        user_hash(user_id),
        created_at.format("%Y-%m-%d"),
    )
}

/// `"https://{cdn_host}/{object_key}"`.
pub fn public_url(cdn_host: &str, object_key: &str) -> String {
    format!("https://{cdn_host}/{object_key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_id_is_12_hex_chars() {
        let id = file_id("user-1", "screenshot", "https://example.com", 1_700_000_000_000);
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn file_id_is_deterministic_and_sensitive_to_every_field() {
        let base = file_id("u", "screenshot", "https://a.com", 1);
        assert_eq!(base, file_id("u", "screenshot", "https://a.com", 1));
        assert_ne!(base, file_id("u2", "screenshot", "https://a.com", 1));
        assert_ne!(base, file_id("u", "pdf", "https://a.com", 1));
        assert_ne!(base, file_id("u", "screenshot", "https://b.com", 1));
        assert_ne!(base, file_id("u", "screenshot", "https://a.com", 2));
    }

    #[test]
    fn user_hash_is_16_hex_chars_and_stable() {
        let h = user_hash("user-42");
        assert_eq!(h.len(), 16);
        assert_eq!(h, user_hash("user-42"));
        assert_ne!(h, user_hash("user-43"));
    }

    #[test]
    fn object_key_matches_spec_shape() {
        let created_at = chrono::Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();
        let fname = filename("https://example.com/page", 1_700_000_000_000, "png");
        let key = object_key("screenshot", "user-1", created_at, &fname);
        assert!(key.starts_with("screenshots/"));
        assert!(key.contains("/2025-03-04/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn public_url_is_pure_function_of_object_key() {
        assert_eq!(
            public_url("cdn.weblinq.dev", "screenshots/abc/2025-03-04/x.png"),
            "https://cdn.weblinq.dev/screenshots/abc/2025-03-04/x.png"
        );
    }
}
