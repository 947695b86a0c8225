//! HTTP client for the management API

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use deployctl_api::requests::DeploymentRequest;
use deployctl_api::responses::{ArtifactDescriptor, DeploymentSnapshot, Device};
use deployctl_core::{
    ArtifactCatalog, CoreError, DeploymentBackend, DeploymentHandle, DeviceInventory,
};

use crate::error::{ClientError, Result};

const ARTIFACTS_PATH: &str = "/api/management/v1/deployments/artifacts";
const DEPLOYMENTS_PATH: &str = "/api/management/v1/deployments/deployments";
const DEVICES_PATH: &str = "/api/management/v1/inventory/devices";

const CONFLICT_MESSAGE: &str =
    "unfinished deployment with same name and targeting same device already exists";

/// Kind of request a failing status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Query,
    Create,
}

/// HTTP client for communicating with the management API
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client authenticated with a bearer token
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    ///
    /// # Example
    /// ```no_run
    /// use deployctl_client::HttpClient;
    ///
    /// let client = HttpClient::new("https://hosted.mender.io", "token")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a client that optionally skips TLS certificate verification
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the TLS backend fails to
    /// initialize.
    pub fn with_skip_verify(
        base_url: impl AsRef<str>,
        token: impl Into<String>,
        skip_verify: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(skip_verify)
            .build()?;
        Self::with_client(base_url, token, client)
    }

    /// Create a new HTTP client with custom `reqwest::Client`
    ///
    /// A path in the base URL (e.g. `https://example.com/mender`) is kept as a
    /// prefix of every API path.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(
        base_url: impl AsRef<str>,
        token: impl Into<String>,
        client: Client,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Build a full URL from a path below the base URL
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ClientError::Url)
    }

    /// Perform a GET request and deserialize the response
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(error_for_status(response, RequestKind::Query).await);
        }

        Ok(response.json().await?)
    }

    /// List every artifact known to the backend
    ///
    /// # Errors
    /// Returns an error if the request fails or the backend returns an error.
    pub async fn list_artifacts(&self) -> Result<Vec<ArtifactDescriptor>> {
        self.get(self.url(ARTIFACTS_PATH)?).await
    }

    /// Create a deployment and return its id
    ///
    /// # Errors
    /// `Unauthorized` on 401, `Conflict` on 409, `Api` on any other non-201
    /// status, `InvalidResponse` when the `Location` header is missing.
    pub async fn create_deployment(&self, request: &DeploymentRequest) -> Result<String> {
        let url = self.url(DEPLOYMENTS_PATH)?;
        debug!(url = %url, name = %request.name, "POST");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(error_for_status(response, RequestKind::Create).await);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ClientError::InvalidResponse("response does not contain a Location header".into())
            })?;

        deployment_id_from_location(location)
    }

    /// Fetch the current state of a deployment
    ///
    /// # Errors
    /// Returns an error if the request fails or the backend returns an error.
    pub async fn get_deployment(&self, id: &str) -> Result<DeploymentSnapshot> {
        let url = self.url(&format!("{DEPLOYMENTS_PATH}/{id}"))?;
        self.get(url).await
    }

    /// Find the device whose identity hostname matches
    ///
    /// # Errors
    /// `NotFound` when no device matches, otherwise request or backend errors.
    pub async fn get_device_by_hostname(&self, hostname: &str) -> Result<Device> {
        let url = self.devices_url(hostname)?;
        let devices: Vec<Device> = self.get(url).await?;

        devices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound("no device found".into()))
    }

    fn devices_url(&self, hostname: &str) -> Result<Url> {
        let mut url = self.url(DEVICES_PATH)?;
        url.query_pairs_mut().append_pair("hostname", hostname);
        Ok(url)
    }
}

/// Map a non-success response to an error, consuming its body
async fn error_for_status(response: Response, kind: RequestKind) -> ClientError {
    let status = response.status();
    debug!(status = %status, url = %response.url(), "request failed");

    let message = response.text().await.unwrap_or_default();
    classify_status(status, kind, message)
}

/// 401 is always `Unauthorized`; 409 is `Conflict` only when creating
fn classify_status(status: StatusCode, kind: RequestKind, message: String) -> ClientError {
    match (status, kind) {
        (StatusCode::UNAUTHORIZED, _) => ClientError::Unauthorized,
        (StatusCode::CONFLICT, RequestKind::Create) => {
            ClientError::Conflict(CONFLICT_MESSAGE.into())
        }
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Deployment id is the last path segment of the `Location` header
fn deployment_id_from_location(location: &str) -> Result<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ClientError::InvalidResponse(format!("malformed Location header: {location}"))
        })
}

#[async_trait]
impl ArtifactCatalog for HttpClient {
    async fn list_artifacts(&self) -> std::result::Result<Vec<ArtifactDescriptor>, CoreError> {
        Ok(HttpClient::list_artifacts(self).await?)
    }
}

#[async_trait]
impl DeploymentBackend for HttpClient {
    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> std::result::Result<DeploymentHandle, CoreError> {
        let id = HttpClient::create_deployment(self, request).await?;
        Ok(DeploymentHandle::new(id))
    }

    async fn get_deployment(
        &self,
        handle: &DeploymentHandle,
    ) -> std::result::Result<DeploymentSnapshot, CoreError> {
        Ok(HttpClient::get_deployment(self, handle.as_str()).await?)
    }
}

#[async_trait]
impl DeviceInventory for HttpClient {
    async fn device_by_hostname(&self, hostname: &str) -> std::result::Result<Device, CoreError> {
        Ok(self.get_device_by_hostname(hostname).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new("https://hosted.mender.io", "token");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let client = HttpClient::new("not a url", "token");
        assert!(matches!(client, Err(ClientError::Url(_))));
    }

    #[test]
    fn test_skip_verify_client() {
        let client = HttpClient::with_skip_verify("https://localhost:8443", "token", true);
        assert!(client.is_ok());
    }

    #[test]
    fn test_url_building() {
        let client = HttpClient::new("https://hosted.mender.io", "token").unwrap();

        let url = client.url(ARTIFACTS_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hosted.mender.io/api/management/v1/deployments/artifacts"
        );

        let url = client.url(&format!("{DEPLOYMENTS_PATH}/abc-123")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hosted.mender.io/api/management/v1/deployments/deployments/abc-123"
        );
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        for base in ["https://example.com/mender", "https://example.com/mender/"] {
            let client = HttpClient::new(base, "token").unwrap();
            let url = client.url(ARTIFACTS_PATH).unwrap();
            assert_eq!(
                url.as_str(),
                "https://example.com/mender/api/management/v1/deployments/artifacts"
            );
        }
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, RequestKind::Create, String::new()),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, RequestKind::Query, String::new()),
            ClientError::Unauthorized
        ));

        match classify_status(StatusCode::CONFLICT, RequestKind::Create, "dup".into()) {
            ClientError::Conflict(message) => assert_eq!(message, CONFLICT_MESSAGE),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, RequestKind::Query, "dup".into()),
            ClientError::Api { status: 409, ref message } if message == "dup"
        ));

        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, RequestKind::Create, "oops".into()),
            ClientError::Api { status: 500, ref message } if message == "oops"
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, RequestKind::Query, String::new()),
            ClientError::Api { status: 404, .. }
        ));
    }

    #[test]
    fn test_create_conflict_converts_to_core_conflict() {
        let err = classify_status(StatusCode::CONFLICT, RequestKind::Create, String::new());
        assert_eq!(
            CoreError::from(err),
            CoreError::Conflict(CONFLICT_MESSAGE.into())
        );
    }

    #[test]
    fn test_devices_url_encodes_hostname() {
        let client = HttpClient::new("https://hosted.mender.io", "token").unwrap();
        let url = client.devices_url("rpi 4&lab").unwrap();

        assert_eq!(url.path(), DEVICES_PATH);
        assert_eq!(url.query(), Some("hostname=rpi+4%26lab"));
    }

    #[test]
    fn test_deployment_id_from_location() {
        let id = deployment_id_from_location(
            "https://hosted.mender.io/api/management/v1/deployments/deployments/0e3b9a6c",
        )
        .unwrap();
        assert_eq!(id, "0e3b9a6c");

        let id = deployment_id_from_location("/deployments/deployments/42/").unwrap();
        assert_eq!(id, "42");

        assert!(matches!(
            deployment_id_from_location(""),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_backend_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let client = HttpClient::new("http://127.0.0.1:9", "token").unwrap();

        let err = DeploymentBackend::get_deployment(&client, &DeploymentHandle::new("d1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Backend { status: None, .. }));
    }
}
