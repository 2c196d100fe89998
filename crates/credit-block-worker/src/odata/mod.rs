//! S/4HANA OData v2 访问层

pub mod batch;
pub mod client;

pub use batch::{BatchOperation, ChangesetResponse, ItemResponse};
pub use client::ODataClient;
