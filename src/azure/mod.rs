//! Azure collaborators: REST record shapes, the paginating HTTP client,
//! portal links and resource-id helpers.

pub mod client;
pub mod models;
pub mod resource_id;
pub mod web_linker;

pub use client::{AzureClient, IterationStats};
pub use web_linker::AzureWebLinker;
