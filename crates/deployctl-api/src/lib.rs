//! deployctl-api: Wire types for the device-management backend
//!
//! Contains the artifact, deployment and inventory payloads exchanged with the
//! management API, plus the progress events emitted while a deployment is tracked.

pub mod events;
pub mod requests;
pub mod responses;
