//! Messaging gateway contract
//!
//! The gateway is an external service that holds each tenant's WhatsApp
//! session and performs the actual delivery. It also applies the pacing
//! delays, both between messages and between batches.

mod client;

pub use client::HttpGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zapflow_common::types::TenantId;
use zapflow_common::Result;
use zapflow_storage::models::Pacing;

/// Session state of a tenant's messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
}

/// Pairing code (QR) to link a device. `None` once connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCode {
    pub code: Option<String>,
    pub connected: bool,
}

/// One recipient of a bulk send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayContact {
    pub name: String,
    pub phone: String,
    /// Message with placeholders already substituted for this contact
    pub message: String,
}

/// Pacing hints in the units the gateway expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingHints {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub batch_size: u32,
    pub batch_delay_ms: u64,
}

impl From<Pacing> for PacingHints {
    fn from(pacing: Pacing) -> Self {
        Self {
            delay_min_ms: pacing.delay_min.max(0) as u64 * 1000,
            delay_max_ms: pacing.delay_max.max(0) as u64 * 1000,
            batch_size: pacing.batch_size.max(1) as u32,
            batch_delay_ms: pacing.batch_delay.max(0) as u64 * 60_000,
        }
    }
}

/// One bulk-send call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSendRequest {
    pub contacts: Vec<GatewayContact>,
    /// Unpersonalized template, for gateways that substitute server-side
    pub template: String,
    pub image_url: Option<String>,
    pub pacing: PacingHints,
}

/// Aggregate result of a bulk-send call. The gateway does not say which
/// contacts failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSendResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<String>,
}

/// Messaging gateway operations used by the dispatcher and the API
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn connection_status(&self, tenant_id: TenantId) -> Result<ConnectionStatus>;

    async fn pairing_code(&self, tenant_id: TenantId) -> Result<PairingCode>;

    async fn send_bulk(&self, tenant_id: TenantId, request: BulkSendRequest)
        -> Result<BulkSendResult>;

    async fn disconnect(&self, tenant_id: TenantId) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_hint_units() {
        let hints = PacingHints::from(Pacing {
            delay_min: 6,
            delay_max: 12,
            batch_size: 10,
            batch_delay: 2,
        });
        assert_eq!(hints.delay_min_ms, 6_000);
        assert_eq!(hints.delay_max_ms, 12_000);
        assert_eq!(hints.batch_size, 10);
        assert_eq!(hints.batch_delay_ms, 120_000);
    }
}
