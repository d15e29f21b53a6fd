//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zapflow_common::types::{
    CampaignId, CampaignLogId, ContactId, ContactListId, SubscriptionStatus, TenantId,
};

/// Tenant model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub email: String,
    pub subscription_status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Get subscription status; unknown values are treated as trial
    pub fn subscription(&self) -> SubscriptionStatus {
        self.subscription_status
            .parse()
            .unwrap_or(SubscriptionStatus::Trial)
    }
}

/// Create tenant input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub email: String,
    pub subscription_status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Statuses from which a dispatch may start
    pub const DISPATCHABLE: [CampaignStatus; 2] = [CampaignStatus::Draft, CampaignStatus::Scheduled];
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Anti-ban pacing settings of a campaign.
///
/// Delays are in seconds, `batch_delay` is in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    pub delay_min: i32,
    pub delay_max: i32,
    pub batch_size: i32,
    pub batch_delay: i32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            delay_min: 6,
            delay_max: 12,
            batch_size: 10,
            batch_delay: 1,
        }
    }
}

impl Pacing {
    /// Check the bounds the gateway relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.delay_min < 1 {
            return Err("Minimum delay must be at least 1 second".to_string());
        }
        if self.delay_max < self.delay_min {
            return Err("Maximum delay must not be lower than the minimum delay".to_string());
        }
        if self.batch_size < 1 {
            return Err("Batch size must be at least 1".to_string());
        }
        if self.batch_delay < 0 {
            return Err("Batch delay must not be negative".to_string());
        }
        Ok(())
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub message: String,
    pub image_url: Option<String>,
    pub delay_min: i32,
    pub delay_max: i32,
    pub batch_size: i32,
    pub batch_delay: i32,
    pub contact_list_id: Option<ContactListId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub scheduled_contact_ids: Vec<ContactId>,
    pub status: String,
    pub total_contacts: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Get pacing settings
    pub fn pacing(&self) -> Pacing {
        Pacing {
            delay_min: self.delay_min,
            delay_max: self.delay_max,
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
        }
    }

    /// Whether the campaign is due for sending at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status_enum() == Some(CampaignStatus::Scheduled)
            && self.scheduled_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Calculate progress percentage
    pub fn progress_percentage(&self) -> f64 {
        if self.total_contacts == 0 {
            0.0
        } else {
            ((self.sent_count + self.failed_count) as f64 / self.total_contacts as f64) * 100.0
        }
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub tenant_id: TenantId,
    pub name: String,
    pub message: String,
    pub image_url: Option<String>,
    pub pacing: Pacing,
    pub contact_list_id: Option<ContactListId>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Update campaign input (draft campaigns only)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub delay_min: Option<i32>,
    pub delay_max: Option<i32>,
    pub batch_size: Option<i32>,
    pub batch_delay: Option<i32>,
    pub contact_list_id: Option<ContactListId>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Final result of a dispatch, written in one update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignOutcome {
    pub status: CampaignStatus,
    pub sent_count: i32,
    pub failed_count: i32,
    pub error_message: Option<String>,
}

/// Contact model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub tenant_id: TenantId,
    pub campaign_id: Option<CampaignId>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
    pub last_campaign_sent: Option<DateTime<Utc>>,
    pub total_campaigns_sent: i32,
    pub created_at: DateTime<Utc>,
}

/// Create contact input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateContact {
    pub tenant_id: TenantId,
    pub campaign_id: Option<CampaignId>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub custom_fields: Option<serde_json::Value>,
}

/// Contact query filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFilter {
    /// Only contacts imported for this campaign
    pub campaign_id: Option<CampaignId>,
    /// Only members of this list
    pub contact_list_id: Option<ContactListId>,
    /// Only contacts never sent to, or last sent to before this instant
    pub not_contacted_since: Option<DateTime<Utc>>,
}

/// Campaign log status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignLogStatus {
    Sent,
    Failed,
    Pending,
}

impl std::fmt::Display for CampaignLogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignLogStatus::Sent => write!(f, "sent"),
            CampaignLogStatus::Failed => write!(f, "failed"),
            CampaignLogStatus::Pending => write!(f, "pending"),
        }
    }
}

impl std::str::FromStr for CampaignLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(CampaignLogStatus::Sent),
            "failed" => Ok(CampaignLogStatus::Failed),
            "pending" => Ok(CampaignLogStatus::Pending),
            _ => Err(format!("Invalid campaign log status: {}", s)),
        }
    }
}

/// Campaign log model (one row per contact per dispatch)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignLog {
    pub id: CampaignLogId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CampaignLog {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignLogStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign log input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCampaignLog {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub status: CampaignLogStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Contact list model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactList {
    pub id: ContactListId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub contact_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create contact list input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContactList {
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Update contact list input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContactList {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_status_parse() {
        assert_eq!("scheduled".parse::<CampaignStatus>(), Ok(CampaignStatus::Scheduled));
        assert!("paused".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_pacing_validation() {
        assert!(Pacing::default().validate().is_ok());

        let inverted = Pacing {
            delay_min: 10,
            delay_max: 5,
            ..Pacing::default()
        };
        assert!(inverted.validate().is_err());

        let empty_batch = Pacing {
            batch_size: 0,
            ..Pacing::default()
        };
        assert!(empty_batch.validate().is_err());

        let equal_bounds = Pacing {
            delay_min: 8,
            delay_max: 8,
            ..Pacing::default()
        };
        assert!(equal_bounds.validate().is_ok());
    }
}
