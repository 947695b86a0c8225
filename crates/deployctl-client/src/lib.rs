//! deployctl-client: HTTP client for the device-management API
//!
//! Wraps the deployments and inventory endpoints and implements the backend
//! traits of `deployctl-core`, so the orchestrator can drive a real server.
//!
//! # Example
//!
//! ```no_run
//! use deployctl_client::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new("https://hosted.mender.io", "token")?;
//!
//! let artifacts = client.list_artifacts().await?;
//! println!("{} artifacts", artifacts.len());
//!
//! let device = client.get_device_by_hostname("rpi4").await?;
//! println!("id: {}", device.id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;

pub use error::{ClientError, Result};
pub use http::HttpClient;
