//! Branch references in historical stock data are inconsistent: some rows
//! carry a branch id, some only a display name. A [`BranchKey`] resolves a
//! reference once and then matches records with an explicit, ordered list
//! of comparisons — id first, display name second.

use serde::{Deserialize, Serialize};

/// A salon branch as stored in the live registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
}

/// Compiled-in registry used when the live branch list is empty, e.g. on a
/// fresh install before any branch has been saved.
const FALLBACK_BRANCHES: &[(&str, &str)] = &[
    ("branch-main", "Main Salon"),
    ("branch-downtown", "Downtown"),
    ("branch-uptown", "Uptown"),
];

/// The fallback registry as owned values.
pub fn fallback_branches() -> Vec<Branch> {
    FALLBACK_BRANCHES
        .iter()
        .map(|(id, name)| Branch {
            id: (*id).to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

/// A resolved branch reference.
///
/// `resolve` looks the reference up by id, then by display name, against
/// the live registry (or the fallback table when the registry is empty).
/// An unrecognized reference still yields a key that matches by raw id,
/// so filtering on a just-deleted branch degrades to id equality instead
/// of matching nothing by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchKey {
    pub id: String,
    pub name: Option<String>,
}

impl BranchKey {
    pub fn resolve(reference: &str, live: &[Branch]) -> BranchKey {
        let fallback;
        let table: &[Branch] = if live.is_empty() {
            fallback = fallback_branches();
            &fallback
        } else {
            live
        };

        if let Some(b) = table.iter().find(|b| b.id == reference) {
            return BranchKey {
                id: b.id.clone(),
                name: Some(b.name.clone()),
            };
        }
        if let Some(b) = table.iter().find(|b| b.name == reference) {
            return BranchKey {
                id: b.id.clone(),
                name: Some(b.name.clone()),
            };
        }
        BranchKey {
            id: reference.to_string(),
            name: None,
        }
    }

    /// Ordered matchers: branch id equality, then display-name equality.
    pub fn matches(&self, branch_id: &str, branch_name: &str) -> bool {
        if branch_id == self.id {
            return true;
        }
        match &self.name {
            Some(name) => branch_name == name,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> Vec<Branch> {
        vec![
            Branch {
                id: "b1".into(),
                name: "Harbor".into(),
            },
            Branch {
                id: "b2".into(),
                name: "Hillside".into(),
            },
        ]
    }

    #[test]
    fn test_resolve_by_id_wins_over_name() {
        // A branch whose display name collides with another branch's id.
        let branches = vec![
            Branch {
                id: "b1".into(),
                name: "b2".into(),
            },
            Branch {
                id: "b2".into(),
                name: "Hillside".into(),
            },
        ];
        let key = BranchKey::resolve("b2", &branches);
        assert_eq!(key.id, "b2");
        assert_eq!(key.name.as_deref(), Some("Hillside"));
    }

    #[test]
    fn test_resolve_by_name() {
        let key = BranchKey::resolve("Hillside", &live());
        assert_eq!(key.id, "b2");
        assert_eq!(key.name.as_deref(), Some("Hillside"));
    }

    #[test]
    fn test_resolve_falls_back_when_registry_empty() {
        let key = BranchKey::resolve("Downtown", &[]);
        assert_eq!(key.id, "branch-downtown");
        assert_eq!(key.name.as_deref(), Some("Downtown"));
    }

    #[test]
    fn test_resolve_unknown_reference_matches_raw_id_only() {
        let key = BranchKey::resolve("gone", &live());
        assert_eq!(key.id, "gone");
        assert_eq!(key.name, None);
        assert!(key.matches("gone", "whatever"));
        assert!(!key.matches("b1", "Harbor"));
    }

    #[test]
    fn test_matches_by_id_then_name() {
        let key = BranchKey::resolve("b1", &live());
        assert!(key.matches("b1", ""));
        // Historical rows that predate branch ids carry only the name.
        assert!(key.matches("", "Harbor"));
        assert!(!key.matches("b2", "Hillside"));
    }
}
