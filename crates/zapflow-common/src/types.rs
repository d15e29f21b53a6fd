//! Common types for zapflow

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for tenants
pub type TenantId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for contacts
pub type ContactId = Uuid;

/// Unique identifier for contact lists
pub type ContactListId = Uuid;

/// Unique identifier for campaign log rows
pub type CampaignLogId = Uuid;

/// Unique identifier for API keys
pub type ApiKeyId = Uuid;

/// Tenant subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    /// Anything that is not a paid, active subscription gets trial quotas
    pub fn is_trial_tier(&self) -> bool {
        !matches!(self, SubscriptionStatus::Active)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Trial => write!(f, "trial"),
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(SubscriptionStatus::Trial),
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            _ => Err(crate::Error::Validation(format!(
                "Invalid subscription status: {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_status_roundtrip() {
        for status in [
            SubscriptionStatus::Trial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("gold".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn test_trial_tier() {
        assert!(SubscriptionStatus::Trial.is_trial_tier());
        assert!(SubscriptionStatus::Cancelled.is_trial_tier());
        assert!(!SubscriptionStatus::Active.is_trial_tier());
    }
}
