//! Origin allow-policy for incoming connections.
//!
//! Pure functions only; logging of the decision happens in the access gate
//! use case.

use std::fmt;

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    /// Exact origin string, e.g. `https://app.example.com`
    Exact(String),
    /// Host suffix, e.g. `.example.com` (written `*.example.com` or `.example.com`)
    Suffix(String),
}

impl OriginRule {
    /// Parse a configured entry. Blank entries yield `None`.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if let Some(rest) = entry.strip_prefix("*.") {
            return Some(Self::Suffix(format!(".{}", rest.to_ascii_lowercase())));
        }
        if entry.starts_with('.') {
            return Some(Self::Suffix(entry.to_ascii_lowercase()));
        }
        Some(Self::Exact(entry.trim_end_matches('/').to_ascii_lowercase()))
    }

    fn matches(&self, origin: &str, host: Option<&str>) -> bool {
        match self {
            OriginRule::Exact(expected) => origin == expected,
            OriginRule::Suffix(suffix) => host.is_some_and(|h| h.ends_with(suffix.as_str())),
        }
    }
}

impl fmt::Display for OriginRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginRule::Exact(origin) => f.write_str(origin),
            OriginRule::Suffix(suffix) => write!(f, "*{}", suffix),
        }
    }
}

/// What to do with origins that match no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    /// Reject unknown origins (production)
    #[default]
    Strict,
    /// Admit unknown origins with a warning (development)
    Permissive,
}

/// Transport metadata of an incoming connection attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Admit { reason: String },
    AdmitWithWarning { reason: String },
    Reject { reason: String },
}

impl AccessDecision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, AccessDecision::Reject { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            AccessDecision::Admit { reason }
            | AccessDecision::AdmitWithWarning { reason }
            | AccessDecision::Reject { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    rules: Vec<OriginRule>,
    mode: GateMode,
}

impl OriginPolicy {
    pub fn new(rules: Vec<OriginRule>, mode: GateMode) -> Self {
        Self { rules, mode }
    }

    /// Build a policy from raw configured entries.
    pub fn from_entries<I, S>(entries: I, mode: GateMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = entries
            .into_iter()
            .filter_map(|entry| OriginRule::parse(entry.as_ref()))
            .collect();
        Self { rules, mode }
    }

    pub fn rules(&self) -> &[OriginRule] {
        &self.rules
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn evaluate(&self, origin: Option<&str>) -> AccessDecision {
        let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) else {
            return AccessDecision::Admit {
                reason: "no origin header".to_string(),
            };
        };

        let normalized = origin.trim_end_matches('/').to_ascii_lowercase();
        let host = origin_host(&normalized);

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&normalized, host)) {
            return AccessDecision::Admit {
                reason: format!("matched allow rule '{}'", rule),
            };
        }

        match self.mode {
            GateMode::Strict => AccessDecision::Reject {
                reason: format!("origin '{}' is not allowed", origin),
            },
            GateMode::Permissive => AccessDecision::AdmitWithWarning {
                reason: format!("origin '{}' is not allowed, admitted in permissive mode", origin),
            },
        }
    }
}

/// Host part of an origin (`scheme://host[:port]`).
fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host = rest.split(['/', ':']).next()?;
    if host.is_empty() { None } else { Some(host) }
}
