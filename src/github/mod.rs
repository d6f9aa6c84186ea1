//! GitHub GraphQL API integration.

pub mod client;
pub mod error;
pub mod pagination;
pub mod queries;
pub mod types;

pub use client::GraphQlClient;
pub use error::GitHubError;
pub use pagination::{find_page, Page};
pub use queries::Query;
pub use types::{PageInfo, Repository, Viewer};
