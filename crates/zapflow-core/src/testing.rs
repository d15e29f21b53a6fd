//! Scripted messaging gateway for tests

use crate::gateway::{
    BulkSendRequest, BulkSendResult, ConnectionStatus, MessagingGateway, PairingCode,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use zapflow_common::types::TenantId;
use zapflow_common::{Error, Result};

/// Scripted answer to one `send_bulk` call
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver all but the last `failures` contacts of the batch
    Deliver { failures: usize, error: Option<String> },
    /// Fail the whole call
    Fail(String),
    /// Never answer within `Duration`
    Hang(Duration),
}

#[derive(Default)]
struct Inner {
    disconnected_by_default: bool,
    connected: HashMap<TenantId, bool>,
    script: VecDeque<Step>,
    calls: Vec<(TenantId, BulkSendRequest)>,
}

/// Gateway that answers from a script and records every call.
/// Unscripted calls deliver every contact.
#[derive(Default)]
pub struct ScriptedGateway {
    inner: Mutex<Inner>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_connected(&self, tenant_id: TenantId, connected: bool) {
        self.inner().connected.insert(tenant_id, connected);
    }

    /// Report tenants without an explicit state as disconnected
    pub fn disconnect_everyone(&self) {
        self.inner().disconnected_by_default = true;
    }

    pub fn push(&self, step: Step) {
        self.inner().script.push_back(step);
    }

    pub fn calls(&self) -> Vec<(TenantId, BulkSendRequest)> {
        self.inner().calls.clone()
    }

    /// Contact count of each recorded call, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner()
            .calls
            .iter()
            .map(|(_, request)| request.contacts.len())
            .collect()
    }

    fn is_connected(&self, tenant_id: TenantId) -> bool {
        let inner = self.inner();
        inner
            .connected
            .get(&tenant_id)
            .copied()
            .unwrap_or(!inner.disconnected_by_default)
    }
}

#[async_trait]
impl MessagingGateway for ScriptedGateway {
    async fn connection_status(&self, tenant_id: TenantId) -> Result<ConnectionStatus> {
        Ok(ConnectionStatus {
            connected: self.is_connected(tenant_id),
        })
    }

    async fn pairing_code(&self, tenant_id: TenantId) -> Result<PairingCode> {
        let connected = self.is_connected(tenant_id);
        Ok(PairingCode {
            code: if connected {
                None
            } else {
                Some(format!("qr-{}", tenant_id))
            },
            connected,
        })
    }

    async fn send_bulk(
        &self,
        tenant_id: TenantId,
        request: BulkSendRequest,
    ) -> Result<BulkSendResult> {
        let size = request.contacts.len();
        let step = {
            let mut inner = self.inner();
            inner.calls.push((tenant_id, request));
            inner.script.pop_front()
        };

        match step {
            None => Ok(BulkSendResult {
                success_count: size,
                failure_count: 0,
                errors: Vec::new(),
            }),
            Some(Step::Deliver { failures, error }) => {
                let failures = failures.min(size);
                Ok(BulkSendResult {
                    success_count: size - failures,
                    failure_count: failures,
                    errors: error.into_iter().collect(),
                })
            }
            Some(Step::Fail(message)) => Err(Error::Gateway(message)),
            Some(Step::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Err(Error::Gateway("hung call returned".to_string()))
            }
        }
    }

    async fn disconnect(&self, tenant_id: TenantId) -> Result<bool> {
        self.set_connected(tenant_id, false);
        Ok(true)
    }
}
