//! HTTP control-plane client.
//!
//! Speaks the JSON API of the virtualization control plane:
//! - `GET /v1/vrouters/{id}` for the router snapshot
//! - `GET /v1/vms/{id}` for a VM's lifecycle state
//! - `POST /v1/vrouters/{id}/nics` to request an attach
//! - `DELETE /v1/vrouters/{id}/nics/{nic_id}` to request a detach
//!
//! Every read goes to the server; nothing is cached.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use nebula_id::{NicId, RouterId, VmId};
use nebula_reconcile::{
    ControlPlane, ControlPlaneError, InstanceState, NicDescriptor, NicRequest, RouterSnapshot,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;

/// Control plane reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    /// Create a client for `endpoint`; each request is bounded by `request_timeout`.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from CLI configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.endpoint, config.request_timeout())
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and map any non-2xx status to a control-plane error.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<reqwest::Response, ControlPlaneError> {
        let response = request
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, resource = %resource, body = %body, "Control plane request failed");
        Err(status_error(status, resource, &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, ControlPlaneError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = self.send(self.client.get(&url), resource).await?;
        response.json().await.map_err(|e| {
            ControlPlaneError::Transient(format!("failed to decode {resource}: {e}"))
        })
    }
}

/// Map an HTTP error status onto the control-plane error kinds.
pub fn status_error(status: StatusCode, resource: &str, body: &str) -> ControlPlaneError {
    let message = error_message(status, body);
    match status {
        StatusCode::NOT_FOUND => ControlPlaneError::NotFound(resource.to_string()),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ControlPlaneError::Transient(message)
        }
        s if s.is_server_error() => ControlPlaneError::Transient(message),
        _ => ControlPlaneError::Rejected(message),
    }
}

/// Prefer the server's `message` field, then the raw body, then the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(body) {
        return parsed.message;
    }

    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn router_snapshot(
        &self,
        router_id: RouterId,
    ) -> Result<RouterSnapshot, ControlPlaneError> {
        let resource = format!("virtual router {router_id}");
        let body: RouterResponse = self
            .get_json(&format!("/v1/vrouters/{router_id}"), &resource)
            .await?;

        debug!(
            router_id = %router_id,
            nic_count = body.nics.len(),
            vm_count = body.vms.len(),
            "Fetched virtual router"
        );
        Ok(RouterSnapshot::new(router_id, body.nics, body.vms))
    }

    async fn instance_state(&self, vm_id: VmId) -> Result<InstanceState, ControlPlaneError> {
        let resource = format!("VM {vm_id}");
        let body: VmResponse = self
            .get_json(&format!("/v1/vms/{vm_id}"), &resource)
            .await?;
        Ok(body.state)
    }

    async fn attach_nic(
        &self,
        router_id: RouterId,
        request: &NicRequest,
    ) -> Result<(), ControlPlaneError> {
        let url = self.url(&format!("/v1/vrouters/{router_id}/nics"));
        let body = AttachNicRequest {
            nic: request.to_descriptor(),
        };
        debug!(url = %url, nic = %body.nic, "POST");

        self.send(
            self.client.post(&url).json(&body),
            &format!("virtual router {router_id}"),
        )
        .await?;
        Ok(())
    }

    async fn detach_nic(
        &self,
        router_id: RouterId,
        nic_id: NicId,
    ) -> Result<(), ControlPlaneError> {
        let url = self.url(&format!("/v1/vrouters/{router_id}/nics/{nic_id}"));
        debug!(url = %url, "DELETE");

        self.send(
            self.client.delete(&url),
            &format!("NIC {nic_id} on virtual router {router_id}"),
        )
        .await?;
        Ok(())
    }
}

/// Router response from the API.
#[derive(Debug, Deserialize)]
struct RouterResponse {
    #[serde(default)]
    nics: Vec<NicDescriptor>,

    #[serde(default)]
    vms: Vec<VmId>,
}

/// VM response from the API.
#[derive(Debug, Deserialize)]
struct VmResponse {
    state: InstanceState,
}

/// Attach request body.
#[derive(Debug, Serialize)]
struct AttachNicRequest {
    nic: NicDescriptor,
}

/// API error response structure.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::NOT_FOUND, "not_found")]
    #[case(StatusCode::REQUEST_TIMEOUT, "transient")]
    #[case(StatusCode::TOO_MANY_REQUESTS, "transient")]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, "transient")]
    #[case(StatusCode::SERVICE_UNAVAILABLE, "transient")]
    #[case(StatusCode::BAD_REQUEST, "rejected")]
    #[case(StatusCode::CONFLICT, "rejected")]
    #[case(StatusCode::FORBIDDEN, "rejected")]
    fn test_status_mapping(#[case] status: StatusCode, #[case] expected: &str) {
        let kind = match status_error(status, "virtual router 3", "") {
            ControlPlaneError::NotFound(_) => "not_found",
            ControlPlaneError::Transient(_) => "transient",
            ControlPlaneError::Rejected(_) => "rejected",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_error_message_prefers_api_message() {
        let err = status_error(
            StatusCode::CONFLICT,
            "virtual router 3",
            r#"{"message":"NIC 12 does not exist"}"#,
        );
        assert_eq!(
            err,
            ControlPlaneError::Rejected("NIC 12 does not exist".to_string())
        );
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        let err = status_error(StatusCode::BAD_GATEWAY, "virtual router 3", "upstream down\n");
        assert_eq!(
            err,
            ControlPlaneError::Transient("502 Bad Gateway: upstream down".to_string())
        );
    }

    #[test]
    fn test_not_found_names_resource() {
        let err = status_error(StatusCode::NOT_FOUND, "VM 40", "");
        assert_eq!(err.to_string(), "VM 40 not found");
    }

    #[test]
    fn test_url_building() {
        let client =
            HttpControlPlane::new("http://localhost:2633/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("/v1/vrouters/3"),
            "http://localhost:2633/v1/vrouters/3"
        );
    }

    #[test]
    fn test_router_response_decoding() {
        let body: RouterResponse = serde_json::from_str(
            r#"{"id":3,"nics":[[["NETWORK_ID","5"],["NIC_ID","12"]]],"vms":[40]}"#,
        )
        .unwrap();

        assert_eq!(body.nics.len(), 1);
        assert_eq!(body.nics[0].nic_id(), Some(NicId::new(12)));
        assert_eq!(body.vms, vec![VmId::new(40)]);
    }
}
