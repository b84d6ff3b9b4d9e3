mod task;

pub(crate) use task::spawn_scoped;

pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

pub(crate) fn now_secs() -> i64 {
    now_ms() / 1000
}

/// `window.location.origin`, used to build OAuth redirect targets.
pub(crate) fn current_origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_default()
}

/// URL-safe random string for the PKCE code verifier (RFC 7636 allows 43..=128 chars).
pub(crate) fn random_code_verifier() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 48];
    getrandom::getrandom(&mut bytes)?;
    Ok(encode_unreserved(&bytes))
}

const UNRESERVED: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn encode_unreserved(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| UNRESERVED[(b & 0x3f) as usize] as char)
        .collect()
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
