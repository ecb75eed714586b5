use url::Url;

/// Where to send users when no valid `next` target was supplied.
pub const DEFAULT_LANDING: &str = "/";

/// Pick the post-login destination: the caller-supplied `next` target if
/// it is safe, otherwise the default landing page.
pub fn safe_redirect(next: Option<&str>, site_origin: &str) -> String {
    next.filter(|target| is_safe_target(target, site_origin))
        .map(ToString::to_string)
        .unwrap_or_else(|| DEFAULT_LANDING.to_string())
}

/// Open-redirect guard: a target is safe only if, resolved against our
/// own origin, it stays on http/https and on exactly our host and port.
/// Everything else (foreign hosts, scheme-relative URLs, `javascript:`
/// and friends, unparseable input) is discarded.
fn is_safe_target(target: &str, site_origin: &str) -> bool {
    let origin = match Url::parse(site_origin) {
        Ok(origin) => origin,
        Err(_) => return false,
    };
    let resolved = match origin.join(target) {
        Ok(resolved) => resolved,
        Err(_) => return false,
    };
    matches!(resolved.scheme(), "http" | "https")
        && resolved.host_str() == origin.host_str()
        && resolved.port_or_known_default() == origin.port_or_known_default()
}
