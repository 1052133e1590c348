//! assetscan-discover: TCP-connect host discovery for the asset inventory.
//!
//! Expands an IPv4 range, checks each candidate for a listening service,
//! fingerprints the live ones from ports and banners, and records them in a
//! discovered-hosts store while reporting progress events.

pub mod api;
pub mod banner;
pub mod config;
pub mod dns;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod host_info;
pub mod jobs;
pub mod liveness;
pub mod orchestrator;
pub mod ports;
pub mod probe;
pub mod range;
