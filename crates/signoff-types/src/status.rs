//! Status enums and their stable storage spellings.
//!
//! The `as_str`/`parse` pairs are the single source of truth for how a
//! status is written to and read from a backend. `parse` returns `None`
//! for unknown spellings; adapters turn that into a storage error.

use serde::{Deserialize, Serialize};

// ── Directory status ─────────────────────────────────────────────────

/// Lifecycle status of a directory node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryStatus {
    Draft,
    Wip,
    Archive,
}

impl DirectoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectoryStatus::Draft => "draft",
            DirectoryStatus::Wip => "wip",
            DirectoryStatus::Archive => "archive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(DirectoryStatus::Draft),
            "wip" => Some(DirectoryStatus::Wip),
            "archive" => Some(DirectoryStatus::Archive),
            _ => None,
        }
    }
}

impl std::fmt::Display for DirectoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── File status ──────────────────────────────────────────────────────

/// Lifecycle status of a file node.
///
/// Only `Draft` files may enter approval or be deleted; `Archive` files are
/// visible to every user through the archive view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Draft,
    OnApproval,
    Annotated,
    Approved,
    Archive,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Draft => "draft",
            FileStatus::OnApproval => "on_approval",
            FileStatus::Annotated => "annotated",
            FileStatus::Approved => "approved",
            FileStatus::Archive => "archive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(FileStatus::Draft),
            "on_approval" => Some(FileStatus::OnApproval),
            "annotated" => Some(FileStatus::Annotated),
            "approved" => Some(FileStatus::Approved),
            "archive" => Some(FileStatus::Archive),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Approval status ──────────────────────────────────────────────────

/// Status of an approval record as it moves through workflow stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    OnApproval,
    Annotated,
    Approved,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::OnApproval => "on_approval",
            ApprovalStatus::Annotated => "annotated",
            ApprovalStatus::Approved => "approved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "on_approval" => Some(ApprovalStatus::OnApproval),
            "annotated" => Some(ApprovalStatus::Annotated),
            "approved" => Some(ApprovalStatus::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_status_round_trips_through_str() {
        for status in [
            FileStatus::Draft,
            FileStatus::OnApproval,
            FileStatus::Annotated,
            FileStatus::Approved,
            FileStatus::Archive,
        ] {
            assert_eq!(FileStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FileStatus::parse("signed"), None);
    }

    #[test]
    fn serde_spelling_matches_storage_spelling() {
        let json = serde_json::to_string(&FileStatus::OnApproval).unwrap();
        assert_eq!(json, "\"on_approval\"");

        let json = serde_json::to_string(&DirectoryStatus::Wip).unwrap();
        assert_eq!(json, "\"wip\"");
    }

    #[test]
    fn approval_status_rejects_unknown_spellings() {
        assert_eq!(ApprovalStatus::parse("draft"), None);
        assert_eq!(ApprovalStatus::parse("annotated"), Some(ApprovalStatus::Annotated));
    }
}
