//! Campaigns: personalization, dispatch and the operations behind the API

mod dispatcher;
mod personalize;
mod service;

pub use dispatcher::{CampaignDispatcher, DispatchSummary, NO_CONTACTS_SELECTED};
pub use personalize::Personalizer;
pub(crate) use service::resolve_targets;
pub use service::{
    CampaignService, ImportSummary, NewCampaign, SendOutcome, NOT_CONNECTED,
};
