use url::Url;

/// Schemes that can never be fetched, regardless of the base URL.
pub const SKIP_SCHEMES: &[&str] = &["data", "mailto", "tel", "javascript"];

/// Resolve a raw reference against `base` into an absolute, fragment-free
/// http(s) URL. Returns `None` for empty input, skipped schemes, malformed
/// references and anything that does not end up on http/https.
pub fn resolve(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(scheme) = scheme_of(raw) {
        if SKIP_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
            return None;
        }
    }

    let mut absolute = base.join(raw).ok()?;
    absolute.set_fragment(None);

    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

/// The scheme prefix of `raw`, if it syntactically has one.
fn scheme_of(raw: &str) -> Option<&str> {
    let (scheme, _) = raw.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

/// Turn user input into a seed URL string: trims whitespace and quotes and
/// assumes https when no http(s) scheme is given.
pub fn normalize_seed(input: &str) -> String {
    let trimmed = input.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
