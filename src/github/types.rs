//! Typed views over GraphQL response nodes.

use serde::Deserialize;

/// Cursor state of a paginated connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub end_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerNode {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageNode {
    pub name: String,
}

/// A repository node from the repository-list query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    pub owner: OwnerNode,
    #[serde(default)]
    pub primary_language: Option<LanguageNode>,
}

/// A branch node from the branch-list query.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchNode {
    pub name: String,
}

/// A commit node from the commit-history query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub oid: String,
    pub committed_date: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

/// The authenticated user, from the viewer query. The node `id` is what the
/// commit-history query filters on as author.
#[derive(Debug, Clone, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub login: String,
}

/// A repository selected for synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub is_private: bool,
    pub primary_language: Option<String>,
}

impl Repository {
    /// Name safe for logs and progress output: private repositories are
    /// masked. Cache keys and aggregates always use the real name.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.is_private {
            "[private]".to_string()
        } else {
            format!("{}/{}", self.owner, self.name)
        }
    }
}

impl From<RepoNode> for Repository {
    fn from(node: RepoNode) -> Self {
        Self {
            owner: node.owner.login,
            name: node.name,
            is_private: node.is_private,
            primary_language: node.primary_language.map(|l| l.name),
        }
    }
}
