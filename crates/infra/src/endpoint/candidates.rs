use serde::{Deserialize, Serialize};

/// Origin used when nothing else resolves.
pub const FALLBACK_BASE_URL: &str = "http://localhost:8000/api";

/// One origin the client may talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub url: String,
    /// Lower is tried first.
    pub priority: u32,
    #[serde(default)]
    pub description: String,
}

impl EndpointCandidate {
    pub fn new(url: impl Into<String>, priority: u32, description: impl Into<String>) -> Self {
        Self { url: url.into(), priority, description: description.into() }
    }
}

/// LAN origins the native shell tries, in priority order.
pub fn default_mobile_candidates() -> Vec<EndpointCandidate> {
    vec![
        EndpointCandidate::new(
            "http://172.20.29.202:8000/api",
            1,
            "Current network IP (172.20.29.202)",
        ),
        EndpointCandidate::new("http://10.0.2.2:8000/api", 2, "Android emulator host"),
        EndpointCandidate::new(
            "http://192.168.55.101:8000/api",
            3,
            "Alternative development IP (192.168.55.101)",
        ),
        EndpointCandidate::new(
            "http://192.168.1.100:8000/api",
            4,
            "Alternative common IP (192.168.1.100)",
        ),
        EndpointCandidate::new(FALLBACK_BASE_URL, 5, "Localhost fallback"),
    ]
}

/// Candidates ordered by ascending priority; ties keep their configured order.
pub fn by_priority(candidates: &[EndpointCandidate]) -> Vec<&EndpointCandidate> {
    let mut sorted: Vec<&EndpointCandidate> = candidates.iter().collect();
    sorted.sort_by_key(|candidate| candidate.priority);
    sorted
}

/// Strip trailing slashes so `{origin}{path}` never doubles them.
pub fn normalize_origin(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
