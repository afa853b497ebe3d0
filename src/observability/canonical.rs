//! Route labels for metrics and logs.
//!
//! Concrete API paths are folded into templates such as
//! `v2/systems/{systemRef}/members` so the label set stays bounded. Paths on
//! any other host, or outside a known API version, get no label at all.

/// `(collection segment, placeholder for the segment after it)`.
const RULES: [(&str, &str); 6] = [
    ("systems", "{systemRef}"),
    ("members", "{memberRef}"),
    ("groups", "{groupRef}"),
    ("switches", "{switchRef}"),
    ("guilds", "{guild_id}"),
    ("messages", "{message}"),
];

/// Maps request paths on the API host to route templates.
#[derive(Debug, Clone)]
pub struct PathCanonicalizer {
    api_host: String,
    version_prefixes: Vec<String>,
}

impl PathCanonicalizer {
    pub fn new(api_host: impl Into<String>, version_prefixes: Vec<String>) -> Self {
        Self {
            api_host: api_host.into(),
            version_prefixes,
        }
    }

    /// Template for `path`, or an empty string when no label should be emitted.
    pub fn canonicalize(&self, host: &str, path: &str) -> String {
        if host != self.api_host || !self.is_versioned(path) {
            return String::new();
        }

        let mut segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let mut i = 0;
        while i + 1 < segments.len() {
            match RULES.iter().find(|(name, _)| *name == segments[i]) {
                Some((_, placeholder)) if !segments[i + 1].is_empty() => {
                    segments[i + 1] = *placeholder;
                    i += 2;
                }
                _ => i += 1,
            }
        }

        segments.join("/")
    }

    fn is_versioned(&self, path: &str) -> bool {
        self.version_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}
