//! Interaction channels.

use serde::{Deserialize, Serialize};

/// The channel an event or session belongs to.
///
/// Multi-turn channels (`Ussd`, `Voice`) hold interaction state in the
/// session store across invocations; `Sms` and `Payment` sessions exist
/// only where a workflow explicitly opens one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// USSD menu sessions (`*123#`-style interactions).
    Ussd,
    /// Voice calls and IVR interactions.
    Voice,
    /// Inbound or outbound SMS.
    Sms,
    /// Mobile-money payment flows.
    Payment,
}

impl Channel {
    /// Returns `true` if the channel spans multiple request/response turns.
    #[must_use]
    pub fn is_multi_turn(&self) -> bool {
        matches!(self, Self::Ussd | Self::Voice)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ussd => write!(f, "ussd"),
            Self::Voice => write!(f, "voice"),
            Self::Sms => write!(f, "sms"),
            Self::Payment => write!(f, "payment"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ussd" => Ok(Self::Ussd),
            "voice" => Ok(Self::Voice),
            "sms" => Ok(Self::Sms),
            "payment" => Ok(Self::Payment),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn multi_turn_channels() {
        assert!(Channel::Ussd.is_multi_turn());
        assert!(Channel::Voice.is_multi_turn());
        assert!(!Channel::Sms.is_multi_turn());
        assert!(!Channel::Payment.is_multi_turn());
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(Channel::Ussd.to_string(), "ussd");
        assert_eq!(Channel::Payment.to_string(), "payment");
    }

    #[test]
    fn serde_snake_case() {
        let json = serde_json::to_string(&Channel::Voice).unwrap();
        assert_eq!(json, "\"voice\"");
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Channel::Voice);
    }

    #[test]
    fn from_str_roundtrip() {
        for channel in [Channel::Ussd, Channel::Voice, Channel::Sms, Channel::Payment] {
            let parsed: Channel = channel.to_string().parse().unwrap();
            assert_eq!(parsed, channel);
        }
        assert!("email".parse::<Channel>().is_err());
    }
}
