const fn api_host() -> &'static str {
    if let Some(host) = option_env!("TRACK_API_HOST") {
        host
    } else {
        "localhost"
    }
}

const fn api_port() -> u16 {
    if let Some(port) = option_env!("TRACK_API_PORT") {
        const_str::parse!(port, u16)
    } else {
        8000
    }
}

const fn api_secure() -> bool {
    if let Some(secure) = option_env!("TRACK_API_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        false
    }
}

const fn api_proto() -> &'static str {
    if api_secure() { "https" } else { "http" }
}

const API_HOST: &str = api_host();
const API_PORT: u16 = api_port();
const API_PROTO: &str = api_proto();

const API_SOCKET: &str = const_str::concat!(API_HOST, ":", API_PORT);

/// Default base URL of the tracking service, set at build time via
/// `TRACK_API_HOST` / `TRACK_API_PORT` / `TRACK_API_SECURE`.
pub const API_BASE_URL: &str = const_str::concat!(API_PROTO, "://", API_SOCKET);

/// Endpoint the device reports its own position to.
pub(crate) const TRACK_PATH: &str = "/api/v1/locations/track/";

/// Endpoint a caregiver fetches a subject's position from.
pub fn track_subject_path(subject_id: &str) -> String {
    format!("{TRACK_PATH}{subject_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_path() {
        assert_eq!(
            track_subject_path("01J0EXAMPLE"),
            "/api/v1/locations/track/01J0EXAMPLE"
        );
    }
}
