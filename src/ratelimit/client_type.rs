//! Client classification for rate-limit metrics.
//!
//! The class only labels metrics; it never changes which limit applies.

/// Coarse class of a client identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Admin,
    Premium,
    Developer,
    IpBased,
    Default,
}

impl ClientType {
    /// Classify a client identifier.
    ///
    /// Checked in order: exact `admin`, contains `premium`, contains
    /// `developer`, dotted-quad IPv4 shape, otherwise default.
    pub fn classify(client_id: &str) -> Self {
        if client_id == "admin" {
            Self::Admin
        } else if client_id.contains("premium") {
            Self::Premium
        } else if client_id.contains("developer") {
            Self::Developer
        } else if is_ipv4_shaped(client_id) {
            Self::IpBased
        } else {
            Self::Default
        }
    }

    /// Metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Premium => "premium",
            Self::Developer => "developer",
            Self::IpBased => "ip_based",
            Self::Default => "default",
        }
    }
}

/// Four non-empty runs of ASCII digits separated by dots. Octet ranges are
/// not checked.
fn is_ipv4_shaped(value: &str) -> bool {
    let mut parts = 0;
    for part in value.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 4
}
