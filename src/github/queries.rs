//! GraphQL query templates.
//!
//! Queries are stored as templates with `$placeholder` markers and rendered
//! by plain substitution. Every paginated connection requests the same page
//! size and the same `pageInfo` shape so that the pagination walker can treat
//! all three list queries uniformly.

/// Nodes requested per page on every paginated connection.
pub const PAGE_SIZE: u32 = 100;

/// The queries the client knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Repositories owned by a user, newest first.
    RepositoryList,
    /// Branch names of one repository.
    BranchList,
    /// Commit history of one branch, restricted to a single author.
    CommitList,
    /// The identity of the authenticated user.
    Viewer,
}

impl Query {
    fn template(self) -> &'static str {
        match self {
            Query::RepositoryList => {
                r#"{
    user(login: "$username") {
        repositories($pagination, affiliations: [OWNER, COLLABORATOR], isFork: false, orderBy: {field: CREATED_AT, direction: DESC}) {
            nodes {
                name
                isPrivate
                owner { login }
                primaryLanguage { name }
            }
            pageInfo { endCursor hasNextPage }
        }
    }
}"#
            }
            Query::BranchList => {
                r#"{
    repository(owner: "$owner", name: "$name") {
        refs(refPrefix: "refs/heads/", $pagination) {
            nodes { name }
            pageInfo { endCursor hasNextPage }
        }
    }
}"#
            }
            Query::CommitList => {
                r#"{
    repository(owner: "$owner", name: "$name") {
        ref(qualifiedName: "refs/heads/$branch") {
            target {
                ... on Commit {
                    history($pagination, author: {id: "$id"}) {
                        nodes {
                            oid
                            committedDate
                            additions
                            deletions
                        }
                        pageInfo { endCursor hasNextPage }
                    }
                }
            }
        }
    }
}"#
            }
            Query::Viewer => "{ viewer { id login } }",
        }
    }

    /// Whether the query carries a `$pagination` marker.
    #[must_use]
    pub fn is_paginated(self) -> bool {
        !matches!(self, Query::Viewer)
    }
}

/// Pagination argument for the first page of a connection.
#[must_use]
pub fn first_page() -> String {
    format!("first: {PAGE_SIZE}")
}

/// Pagination argument for the page after `cursor`.
#[must_use]
pub fn next_page(cursor: &str) -> String {
    format!("first: {PAGE_SIZE}, after: \"{}\"", escape(cursor))
}

/// Render a query by substituting `$pagination` and each named parameter.
///
/// Parameter names are given without the `$` sigil. Values are escaped for
/// embedding inside double-quoted GraphQL strings.
#[must_use]
pub fn render(query: Query, params: &[(&str, &str)], pagination: &str) -> String {
    let mut rendered = query.template().replace("$pagination", pagination);
    for (name, value) in params {
        rendered = rendered.replace(&format!("${name}"), &escape(value));
    }
    rendered
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
