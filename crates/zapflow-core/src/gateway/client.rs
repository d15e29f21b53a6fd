//! HTTP client for the messaging gateway service

use super::{BulkSendRequest, BulkSendResult, ConnectionStatus, MessagingGateway, PairingCode};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use zapflow_common::config::GatewayConfig;
use zapflow_common::types::TenantId;
use zapflow_common::{Error, Result};

/// `GET /connect` response
#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default, rename = "qrCode")]
    qr_code: Option<String>,
    #[serde(default, rename = "isConnected")]
    is_connected: Option<bool>,
    #[serde(default)]
    connected: Option<bool>,
}

/// `GET /` response
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default, rename = "isConnected")]
    is_connected: bool,
}

#[derive(Debug, Serialize)]
struct WireContact<'a> {
    nome: &'a str,
    numero: &'a str,
    mensagem: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AntiBanSettings {
    random_delay_min: u64,
    random_delay_max: u64,
    batch_size: u32,
    batch_delay_ms: u64,
}

/// `POST /send-bulk` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBulkBody<'a> {
    user_id: String,
    contatos: Vec<WireContact<'a>>,
    mensagem_base: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    imagem_url: Option<&'a str>,
    anti_ban_settings: AntiBanSettings,
}

#[derive(Debug, Deserialize)]
struct SendBulkError {
    #[serde(default)]
    nome: String,
    #[serde(default)]
    erro: String,
}

/// `POST /send-bulk` response
#[derive(Debug, Deserialize)]
struct SendBulkResponse {
    #[serde(default)]
    enviados: usize,
    #[serde(default)]
    total: usize,
    #[serde(default)]
    erros: Vec<SendBulkError>,
}

impl From<SendBulkResponse> for BulkSendResult {
    fn from(response: SendBulkResponse) -> Self {
        Self {
            success_count: response.enviados,
            failure_count: response.total.saturating_sub(response.enviados),
            errors: response
                .erros
                .into_iter()
                .map(|e| format!("{}: {}", e.nome, e.erro))
                .collect(),
        }
    }
}

/// Messaging gateway reached over HTTP
pub struct HttpGateway {
    config: GatewayConfig,
    client: Client,
}

impl HttpGateway {
    /// Create a new gateway client
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build a request with optional auth header
    fn build_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let mut request = self.client.request(method, &url);

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        request
    }

    async fn error_from_response(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|e| {
            warn!("Failed to read gateway response body: {}", e);
            String::new()
        });
        if body.trim().is_empty() {
            Error::Gateway(format!("HTTP {}", status))
        } else {
            Error::Gateway(body)
        }
    }
}

fn request_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Gateway(format!("{} timed out", context))
    } else {
        Error::Gateway(format!("{} failed: {}", context, e))
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn connection_status(&self, tenant_id: TenantId) -> Result<ConnectionStatus> {
        let response = self
            .build_request(reqwest::Method::GET, "/")
            .query(&[("userId", tenant_id.to_string())])
            .send()
            .await
            .map_err(|e| request_error("Status request", e))?;

        // The gateway answers non-2xx for unknown sessions
        if !response.status().is_success() {
            debug!(%tenant_id, status = %response.status(), "Gateway reports no session");
            return Ok(ConnectionStatus { connected: false });
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("Invalid status response: {}", e)))?;

        Ok(ConnectionStatus {
            connected: status.is_connected,
        })
    }

    async fn pairing_code(&self, tenant_id: TenantId) -> Result<PairingCode> {
        let response = self
            .build_request(reqwest::Method::GET, "/connect")
            .query(&[("userId", tenant_id.to_string())])
            .send()
            .await
            .map_err(|e| request_error("Connect request", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let data: ConnectResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("Invalid connect response: {}", e)))?;

        let connected = data.is_connected == Some(true) || data.connected == Some(true);
        Ok(PairingCode {
            code: if connected { None } else { data.qr_code },
            connected,
        })
    }

    async fn send_bulk(
        &self,
        tenant_id: TenantId,
        request: BulkSendRequest,
    ) -> Result<BulkSendResult> {
        let body = SendBulkBody {
            user_id: tenant_id.to_string(),
            contatos: request
                .contacts
                .iter()
                .map(|c| WireContact {
                    nome: &c.name,
                    numero: &c.phone,
                    mensagem: &c.message,
                })
                .collect(),
            mensagem_base: &request.template,
            imagem_url: request.image_url.as_deref(),
            anti_ban_settings: AntiBanSettings {
                random_delay_min: request.pacing.delay_min_ms,
                random_delay_max: request.pacing.delay_max_ms,
                batch_size: request.pacing.batch_size,
                batch_delay_ms: request.pacing.batch_delay_ms,
            },
        };

        debug!(
            %tenant_id,
            contacts = request.contacts.len(),
            "Sending bulk request to gateway"
        );

        let response = self
            .build_request(reqwest::Method::POST, "/send-bulk")
            .timeout(Duration::from_secs(self.config.bulk_timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Bulk send", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let data: SendBulkResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("Invalid send-bulk response: {}", e)))?;

        Ok(data.into())
    }

    async fn disconnect(&self, tenant_id: TenantId) -> Result<bool> {
        let response = self
            .build_request(reqwest::Method::POST, "/disconnect")
            .json(&serde_json::json!({ "userId": tenant_id.to_string() }))
            .send()
            .await
            .map_err(|e| request_error("Disconnect request", e))?;

        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayContact, PacingHints};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> HttpGateway {
        HttpGateway::new(GatewayConfig {
            url: server.uri(),
            api_key: None,
            timeout_secs: 5,
            bulk_timeout_secs: 5,
        })
        .unwrap()
    }

    fn bulk_request() -> BulkSendRequest {
        BulkSendRequest {
            contacts: vec![
                GatewayContact {
                    name: "Ana".to_string(),
                    phone: "5511999990001".to_string(),
                    message: "Oi Ana".to_string(),
                },
                GatewayContact {
                    name: "Bruno".to_string(),
                    phone: "5511999990002".to_string(),
                    message: "Oi Bruno".to_string(),
                },
            ],
            template: "Oi [nome]".to_string(),
            image_url: None,
            pacing: PacingHints {
                delay_min_ms: 6000,
                delay_max_ms: 12000,
                batch_size: 10,
                batch_delay_ms: 60000,
            },
        }
    }

    #[tokio::test]
    async fn test_send_bulk_maps_response() {
        let server = MockServer::start().await;
        let tenant = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/send-bulk"))
            .and(body_partial_json(serde_json::json!({
                "userId": tenant.to_string(),
                "mensagemBase": "Oi [nome]",
                "antiBanSettings": { "randomDelayMin": 6000, "batchDelayMs": 60000 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "enviados": 1,
                "total": 2,
                "erros": [{ "nome": "Bruno", "erro": "number not on WhatsApp" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server).send_bulk(tenant, bulk_request()).await.unwrap();
        assert_eq!(
            result,
            BulkSendResult {
                success_count: 1,
                failure_count: 1,
                errors: vec!["Bruno: number not on WhatsApp".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_send_bulk_error_status_is_gateway_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send-bulk"))
            .respond_with(ResponseTemplate::new(503).set_body_string("session offline"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .send_bulk(Uuid::new_v4(), bulk_request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gateway(ref msg) if msg == "session offline"));
    }

    #[tokio::test]
    async fn test_send_bulk_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send-bulk"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "enviados": 2, "total": 2 }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(GatewayConfig {
            url: server.uri(),
            api_key: None,
            timeout_secs: 5,
            bulk_timeout_secs: 1,
        })
        .unwrap();

        let err = gateway
            .send_bulk(Uuid::new_v4(), bulk_request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
    }

    #[tokio::test]
    async fn test_pairing_code_is_none_when_connected() {
        let server = MockServer::start().await;
        let tenant = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/connect"))
            .and(query_param("userId", tenant.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "qrCode": "data:image/png;base64,AAAA",
                "connected": true
            })))
            .mount(&server)
            .await;

        let code = gateway(&server).pairing_code(tenant).await.unwrap();
        assert_eq!(code.code, None);
        assert!(code.connected);
    }

    #[tokio::test]
    async fn test_connection_status() {
        let server = MockServer::start().await;
        let tenant = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("userId", tenant.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "isConnected": true })),
            )
            .mount(&server)
            .await;

        let status = gateway(&server).connection_status(tenant).await.unwrap();
        assert!(status.connected);

        let unknown = gateway(&server)
            .connection_status(Uuid::new_v4())
            .await
            .unwrap();
        assert!(!unknown.connected);
    }
}
