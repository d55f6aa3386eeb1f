//! Composite keys for owner-scoped tables.
//!
//! Every owner-scoped key starts with the escaped owner id followed by `:`.
//! Owner ids are escaped so that a prefix scan for owner `u1` never returns
//! keys of owner `u1:x`.

/// Escape a key segment so it never contains the `:` separator.
pub fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for ch in segment.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Prefix shared by every key belonging to `owner_id`.
pub fn owner_prefix(owner_id: &str) -> String {
    format!("{}:", escape_segment(owner_id))
}

/// Key of a single `(owner_id, request_id)` record.
pub fn record_key(owner_id: &str, request_id: &str) -> String {
    format!("{}{}", owner_prefix(owner_id), escape_segment(request_id))
}

/// Owner index key ordered newest first.
pub fn index_key(owner_id: &str, created_at_ms: i64, request_id: &str) -> String {
    let created_at_ms = created_at_ms.max(0) as u64;
    let reverse_ts = u64::MAX - created_at_ms;
    format!(
        "{}{reverse_ts:020}:{}",
        owner_prefix(owner_id),
        escape_segment(request_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_separator() {
        assert_eq!(escape_segment("a:b"), "a%3Ab");
        assert_eq!(escape_segment("50%"), "50%25");
        assert_eq!(escape_segment("plain"), "plain");
    }

    #[test]
    fn test_owner_prefixes_do_not_overlap() {
        let key = record_key("u1:x", "req");
        assert!(!key.starts_with(&owner_prefix("u1")));
        assert!(key.starts_with(&owner_prefix("u1:x")));
    }

    #[test]
    fn test_index_key_orders_newest_first() {
        let older = index_key("u1", 1_000, "a");
        let newer = index_key("u1", 2_000, "b");
        assert!(newer < older);
    }
}
