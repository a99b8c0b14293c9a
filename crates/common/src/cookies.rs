use cookie::Cookie;

/// Raw (still percent-encoded) value of the first cookie named `name`.
///
/// Repeated names resolve to the first occurrence, as a `document.cookie`
/// scan would.
#[must_use]
pub fn first_cookie_value(header: &str, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    Cookie::split_parse(header.trim())
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
