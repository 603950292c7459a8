use serde::{Deserialize, Serialize};

/// Tri-state output of the decision loop, consumed by the indicator.
///
/// The wire tokens are the reference system's Portuguese LED commands
/// and are part of the channel file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Cleared / nothing to report. Encoded as an empty file.
    #[default]
    Idle,
    /// A resident was recognized this frame.
    Authorized,
    /// A frame with no recognized resident (including no face at all).
    Denied,
}

impl Signal {
    /// Token written to the channel file.
    pub fn token(&self) -> &'static str {
        match self {
            Signal::Idle => "",
            Signal::Authorized => "verde",
            Signal::Denied => "vermelho",
        }
    }

    /// Parse a channel token. Whitespace-trimmed empty input is `Idle`;
    /// anything unrecognized is `None`.
    pub fn from_token(token: &str) -> Option<Signal> {
        match token.trim() {
            "" => Some(Signal::Idle),
            "verde" => Some(Signal::Authorized),
            "vermelho" => Some(Signal::Denied),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_roundtrip() {
        for s in [Signal::Idle, Signal::Authorized, Signal::Denied] {
            assert_eq!(Signal::from_token(s.token()), Some(s));
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Signal::from_token("verde\n"), Some(Signal::Authorized));
        assert_eq!(Signal::from_token("  vermelho  "), Some(Signal::Denied));
        assert_eq!(Signal::from_token("   \n"), Some(Signal::Idle));
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(Signal::from_token("amarelo"), None);
        assert_eq!(Signal::from_token("VERDE"), None);
    }
}
