//! Zapflow Core - Campaign dispatch, scheduling and quota enforcement
//!
//! This crate holds the bulk-send pipeline: the messaging gateway client,
//! the campaign dispatcher, the scheduler that picks up due campaigns and
//! the trial quota guard.

pub mod campaign;
pub mod gateway;
pub mod import;
pub mod quota;
pub mod scheduler;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use campaign::{
    CampaignDispatcher, CampaignService, DispatchSummary, ImportSummary, NewCampaign,
    Personalizer, SendOutcome,
};
pub use gateway::{HttpGateway, MessagingGateway};
pub use import::{parse_contacts, ParsedContact, ParsedImport};
pub use quota::{QuotaUsage, TrialQuotaGuard};
pub use scheduler::{CampaignScheduler, SchedulerHandle, TickSummary};
