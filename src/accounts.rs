//! Accounts
//!
//! The purchaser facts the engine prices against: commercial account class, loyalty tier and
//! customer group memberships.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::uuids::TypedUuid;

/// Customer group marker.
#[derive(Debug)]
pub struct CustomerGroup;

/// Customer group id.
pub type GroupUuid = TypedUuid<CustomerGroup>;

/// Customer marker.
#[derive(Debug)]
pub struct Customer;

/// Customer id, used for per-customer redemption limits.
pub type CustomerUuid = TypedUuid<Customer>;

/// Errors parsing account facts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    /// Unrecognised account class.
    #[error("unknown account class: {0}")]
    UnknownClass(String),

    /// Unrecognised loyalty tier.
    #[error("unknown loyalty tier: {0}")]
    UnknownTier(String),
}

/// Commercial class of the purchasing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountClass {
    /// Retail customer.
    #[serde(alias = "PERSONAL", alias = "B2C")]
    Consumer,

    /// Business / volume buyer.
    #[serde(alias = "B2B")]
    VolumeBuyer,

    /// Government contract buyer.
    #[serde(alias = "GSA")]
    Government,
}

impl AccountClass {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::VolumeBuyer => "VOLUME_BUYER",
            Self::Government => "GOVERNMENT",
        }
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountClass {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CONSUMER" | "PERSONAL" | "B2C" => Ok(Self::Consumer),
            "VOLUME_BUYER" | "B2B" => Ok(Self::VolumeBuyer),
            "GOVERNMENT" | "GSA" => Ok(Self::Government),
            _ => Err(AccountError::UnknownClass(s.to_string())),
        }
    }
}

/// Loyalty programme tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoyaltyTier {
    /// Bronze
    Bronze,

    /// Silver
    Silver,

    /// Gold
    Gold,

    /// Platinum
    Platinum,

    /// Diamond
    Diamond,
}

impl LoyaltyTier {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
            Self::Diamond => "DIAMOND",
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoyaltyTier {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRONZE" => Ok(Self::Bronze),
            "SILVER" => Ok(Self::Silver),
            "GOLD" => Ok(Self::Gold),
            "PLATINUM" => Ok(Self::Platinum),
            "DIAMOND" => Ok(Self::Diamond),
            _ => Err(AccountError::UnknownTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_canonical_and_legacy_class_names() -> TestResult {
        assert_eq!("consumer".parse::<AccountClass>()?, AccountClass::Consumer);
        assert_eq!("B2C".parse::<AccountClass>()?, AccountClass::Consumer);
        assert_eq!("personal".parse::<AccountClass>()?, AccountClass::Consumer);
        assert_eq!("volume-buyer".parse::<AccountClass>()?, AccountClass::VolumeBuyer);
        assert_eq!("b2b".parse::<AccountClass>()?, AccountClass::VolumeBuyer);
        assert_eq!("GSA".parse::<AccountClass>()?, AccountClass::Government);

        Ok(())
    }

    #[test]
    fn rejects_unknown_class() {
        assert_eq!(
            "wholesale".parse::<AccountClass>(),
            Err(AccountError::UnknownClass("wholesale".to_string()))
        );
    }

    #[test]
    fn deserializes_legacy_aliases() -> TestResult {
        let class: AccountClass = serde_json::from_str("\"GSA\"")?;

        assert_eq!(class, AccountClass::Government);
        assert_eq!(serde_json::to_string(&class)?, "\"GOVERNMENT\"");

        Ok(())
    }

    #[test]
    fn parses_loyalty_tiers() -> TestResult {
        assert_eq!("gold".parse::<LoyaltyTier>()?, LoyaltyTier::Gold);
        assert!("copper".parse::<LoyaltyTier>().is_err());

        Ok(())
    }
}
