//! Documentation tiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three per-file documentation detail levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Micro,
    Standard,
    Expansive,
}

impl Tier {
    /// All tiers in write order
    pub const ALL: [Tier; 3] = [Tier::Micro, Tier::Standard, Tier::Expansive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Micro => "micro",
            Tier::Standard => "standard",
            Tier::Expansive => "expansive",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "micro" => Ok(Tier::Micro),
            "standard" => Ok(Tier::Standard),
            "expansive" => Ok(Tier::Expansive),
            _ => Err(format!(
                "Unknown tier: {}. Valid values: micro, standard, expansive",
                s
            )),
        }
    }
}

/// Tier recorded for a documented module file; `Unknown` when no artifact was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TierLabel {
    Micro,
    Standard,
    Expansive,
    #[default]
    Unknown,
}

impl From<Tier> for TierLabel {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Micro => TierLabel::Micro,
            Tier::Standard => TierLabel::Standard,
            Tier::Expansive => TierLabel::Expansive,
        }
    }
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TierLabel::Micro => "micro",
            TierLabel::Standard => "standard",
            TierLabel::Expansive => "expansive",
            TierLabel::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

impl From<Option<Tier>> for TierLabel {
    fn from(tier: Option<Tier>) -> Self {
        tier.map(TierLabel::from).unwrap_or(TierLabel::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse_and_display() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>().unwrap(), tier);
        }
        assert!("huge".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_label_serde() {
        assert_eq!(
            serde_json::to_string(&TierLabel::from(None)).unwrap(),
            "\"unknown\""
        );
        assert_eq!(
            serde_json::to_string(&TierLabel::from(Tier::Expansive)).unwrap(),
            "\"expansive\""
        );
    }
}
