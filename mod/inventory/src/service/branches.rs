use salondesk_core::ServiceError;
use salondesk_sql::Value;

use super::InventoryService;
use crate::branch::Branch;

impl InventoryService {
    /// The live branch registry, ordered by display name. Callers fall
    /// back to `branch::fallback_branches` when this comes back empty.
    pub fn list_branches(&self) -> Result<Vec<Branch>, ServiceError> {
        self.query_docs("SELECT data FROM branches ORDER BY name", &[])
    }

    /// Create or update a registry entry.
    pub fn upsert_branch(&self, id: &str, name: &str) -> Result<Branch, ServiceError> {
        if id.trim().is_empty() || name.trim().is_empty() {
            return Err(ServiceError::Validation("branch id and name are required".into()));
        }

        let branch = Branch {
            id: id.to_string(),
            name: name.to_string(),
        };
        let json = serde_json::to_string(&branch)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.sql
            .exec(
                "INSERT INTO branches (id, data, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, name = excluded.name",
                &[
                    Value::Text(branch.id.clone()),
                    Value::Text(json),
                    Value::Text(branch.name.clone()),
                ],
            )
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        Ok(branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::test_service;

    #[test]
    fn test_branch_registry_upsert_and_list() {
        let svc = test_service();
        assert!(svc.list_branches().unwrap().is_empty());

        svc.upsert_branch("b1", "Harbor").unwrap();
        svc.upsert_branch("b2", "Hillside").unwrap();
        svc.upsert_branch("b1", "Harbor East").unwrap();

        let branches = svc.list_branches().unwrap();
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().any(|b| b.id == "b1" && b.name == "Harbor East"));
    }

    #[test]
    fn test_upsert_rejects_blank_fields() {
        let svc = test_service();
        assert!(svc.upsert_branch("", "Harbor").is_err());
        assert!(svc.upsert_branch("b1", "  ").is_err());
    }
}
