//! Cursor pagination over GraphQL connections.
//!
//! All three list queries share the `{ nodes, pageInfo }` connection shape,
//! but at different nesting depths. [`find_page`] locates the connection by
//! descending through sole-key wrapper objects, so the walker does not need a
//! per-query response path.

use serde_json::Value;
use tracing::{debug, warn};

use super::client::GraphQlClient;
use super::error::GitHubError;
use super::queries::{self, Query};
use super::types::PageInfo;

/// Wrapper objects the locator is willing to descend through. GraphQL
/// responses nest a handful of levels (`data.repository.ref.target.history`);
/// anything deeper is not a shape we produce.
const MAX_WRAPPER_DEPTH: usize = 12;

/// One page of a connection.
#[derive(Debug, Default)]
pub struct Page {
    pub nodes: Vec<Value>,
    pub page_info: PageInfo,
}

/// Locate the `{ nodes, pageInfo }` connection inside a response.
///
/// Starting at the response root, descends into objects that have exactly one
/// key until it finds an object carrying both `nodes` and `pageInfo`. A
/// response without that shape (missing branch, null target, error-only
/// payload) yields an empty page with no next cursor.
#[must_use]
pub fn find_page(response: &Value) -> Page {
    fn walk(value: &Value, depth: usize) -> Option<Page> {
        let obj = value.as_object()?;
        if let (Some(nodes), Some(page_info)) = (obj.get("nodes"), obj.get("pageInfo")) {
            let nodes = nodes.as_array().cloned().unwrap_or_default();
            let page_info: PageInfo =
                serde_json::from_value(page_info.clone()).unwrap_or_default();
            return Some(Page { nodes, page_info });
        }
        if depth == 0 || obj.len() != 1 {
            return None;
        }
        let (_, inner) = obj.iter().next()?;
        walk(inner, depth - 1)
    }

    walk(response, MAX_WRAPPER_DEPTH).unwrap_or_default()
}

impl GraphQlClient {
    /// Fetch every node of a paginated connection, following `endCursor`
    /// until `hasNextPage` is false.
    pub async fn paginate(
        &self,
        query: Query,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, GitHubError> {
        debug_assert!(
            query.is_paginated(),
            "paginate called with a query that has no pagination marker"
        );
        let mut response = self.execute(query, params, &queries::first_page()).await?;
        let mut page = find_page(&response);
        let mut nodes = page.nodes;
        let mut pages = 1u32;

        while page.page_info.has_next_page {
            let Some(cursor) = page.page_info.end_cursor else {
                warn!(?query, "connection claims another page but has no end cursor");
                break;
            };
            response = self
                .execute(query, params, &queries::next_page(&cursor))
                .await?;
            page = find_page(&response);
            nodes.append(&mut page.nodes);
            pages += 1;
        }

        debug!(?query, pages, count = nodes.len(), "pagination complete");
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{json_response, MockTransport};
    use std::sync::Arc;

    use serde_json::json;

    #[test]
    fn find_page_reads_flat_connection() {
        let response = json!({
            "nodes": [{"name": "main"}],
            "pageInfo": {"endCursor": "abc", "hasNextPage": true}
        });
        let page = find_page(&response);
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("abc"));
        assert!(page.page_info.has_next_page);
    }

    #[test]
    fn find_page_descends_through_sole_key_wrappers() {
        let response = json!({
            "data": {
                "repository": {
                    "ref": {
                        "target": {
                            "history": {
                                "nodes": [{"oid": "c1"}, {"oid": "c2"}],
                                "pageInfo": {"endCursor": null, "hasNextPage": false}
                            }
                        }
                    }
                }
            }
        });
        let page = find_page(&response);
        assert_eq!(page.nodes.len(), 2);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn find_page_stops_at_multi_key_objects() {
        // Two keys at the repository level: not a sole-key wrapper, and no
        // connection here, so the page is empty.
        let response = json!({
            "data": {
                "repository": {
                    "name": "x",
                    "refs": {
                        "nodes": [],
                        "pageInfo": {"endCursor": null, "hasNextPage": false}
                    }
                }
            }
        });
        let page = find_page(&response);
        assert!(page.nodes.is_empty());
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn find_page_yields_empty_page_for_unrecognized_shapes() {
        let page = find_page(&json!({"key": "value"}));
        assert!(page.nodes.is_empty());
        assert!(!page.page_info.has_next_page);

        let page = find_page(&json!(["not", "an", "object"]));
        assert!(page.nodes.is_empty());
    }

    #[test]
    fn find_page_handles_null_branches() {
        let response = json!({"data": {"repository": {"ref": null}}});
        let page = find_page(&response);
        assert!(page.nodes.is_empty());
        assert!(!page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn paginate_makes_one_request_per_page() {
        let transport = MockTransport::new();
        transport.push_response(
            &["after:"],
            json_response(json!({
                "data": {"user": {"repositories": {
                    "nodes": [{"name": "b"}],
                    "pageInfo": {"endCursor": null, "hasNextPage": false}
                }}}
            })),
        );
        transport.push_response(
            &[],
            json_response(json!({
                "data": {"user": {"repositories": {
                    "nodes": [{"name": "a"}],
                    "pageInfo": {"endCursor": "cursor-1", "hasNextPage": true}
                }}}
            })),
        );

        let client = GraphQlClient::new("t", Arc::new(transport.clone()))
            .with_endpoint("https://github.test/graphql");
        let nodes = client
            .paginate(Query::RepositoryList, &[("username", "octocat")])
            .await
            .expect("paginate");

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["name"], json!("a"));
        assert_eq!(nodes[1]["name"], json!("b"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].body_text().contains("first: 100"));
        assert!(!requests[0].body_text().contains("after:"));
        assert!(requests[1].body_text().contains(r#"after: \"cursor-1\""#));
    }

    #[tokio::test]
    async fn paginate_stops_on_missing_cursor() {
        let transport = MockTransport::new();
        transport.push_response(
            &[],
            json_response(json!({
                "data": {"user": {"repositories": {
                    "nodes": [{"name": "a"}],
                    "pageInfo": {"endCursor": null, "hasNextPage": true}
                }}}
            })),
        );

        let client = GraphQlClient::new("t", Arc::new(transport.clone()))
            .with_endpoint("https://github.test/graphql");
        let nodes = client
            .paginate(Query::RepositoryList, &[("username", "octocat")])
            .await
            .expect("paginate");

        assert_eq!(nodes.len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }
}
