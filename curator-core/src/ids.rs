use rand::RngCore;

/// `req_<16 hex chars>`, echoed/generated for every HTTP response as `X-Request-Id`.
pub fn new_request_id() -> String {
    format!("req_{}", random_hex(8))
}

/// `api_<16 hex chars>` public API key identifier prefix, paired with a
/// `PublicApiKey.id_hint` (first 8 chars of a SHA-256 digest) at persistence time.
pub fn new_api_key_id() -> String {
    format!("ak_{}", random_hex(8))
}

fn random_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Coerce an optional caller-supplied request id: non-empty after trim, else a
/// stable placeholder (mirrors the original `_coerce_request_id`).
pub fn coerce_request_id(candidate: Option<&str>) -> String {
    let trimmed = candidate.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        "req_unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_has_expected_shape() {
        let id = new_request_id();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), "req_".len() + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn request_ids_are_not_constant() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
    }

    #[test]
    fn coerce_falls_back_on_blank() {
        assert_eq!(coerce_request_id(Some("  ")), "req_unknown");
        assert_eq!(coerce_request_id(None), "req_unknown");
        assert_eq!(coerce_request_id(Some(" req_abc ")), "req_abc");
    }
}
