//! SQLite `acl` document store.

use crate::{Error, Result};
use catalog::{
    AclDocument, CapabilityType, CatalogRecords, CatalogSource, DocumentType, FunctionId, GroupId,
    RoleId, documents_from_values, validate_document,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;

/// A document as stored, with the time it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub document: AclDocument,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed `acl` collection.
///
/// Ids are unique across the whole table, not per document type: writing
/// a role with the id of an existing function replaces the function.
pub struct AclStore {
    conn: Connection,
}

impl AclStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        // Partial expression indexes; lookups must repeat the exact
        // json_extract expression for SQLite to use them.
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS acl (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_acl_type ON acl(type);
            CREATE INDEX IF NOT EXISTS idx_acl_endpoint_operationid
                ON acl(type, json_extract(data, '$.endpoint.operationid'))
                WHERE type = 'function'
                  AND json_extract(data, '$.endpoint.operationid') IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_acl_capability_captype
                ON acl(type, json_extract(data, '$.capability.captype'))
                WHERE type = 'function'
                  AND json_extract(data, '$.capability.captype') IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_acl_capability_appid
                ON acl(type, json_extract(data, '$.capability.appid'))
                WHERE type = 'function'
                  AND json_extract(data, '$.capability.appid') IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_acl_menu_appid
                ON acl(type, json_extract(data, '$.menu.appid'))
                WHERE type = 'function'
                  AND json_extract(data, '$.menu.appid') IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_acl_menu_isleaf
                ON acl(type, json_extract(data, '$.menu.isleaf'))
                WHERE type = 'function'
                  AND json_extract(data, '$.menu.isleaf') IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_acl_menu_functionparentid
                ON acl(type, json_extract(data, '$.menu.functionparentid'))
                WHERE type = 'function'
                  AND json_extract(data, '$.menu.functionparentid') IS NOT NULL;
            "#,
        )?;
        Ok(())
    }

    /// Insert or replace one document.
    ///
    /// Documents that fail validation are refused with every violation.
    pub fn upsert(&self, document: &AclDocument) -> Result<()> {
        let violations = validate_document(document);
        if !violations.is_empty() {
            return Err(catalog::Error::Rejected(violations).into());
        }
        self.write(document)
    }

    /// Insert or replace `documents` in one transaction.
    ///
    /// Either every document is written or none is; all violations of the
    /// batch are reported together.
    pub fn upsert_all(&mut self, documents: &[AclDocument]) -> Result<usize> {
        let violations: Vec<_> = documents.iter().flat_map(validate_document).collect();
        if !violations.is_empty() {
            tracing::warn!(
                violations = violations.len(),
                "Refused acl document batch"
            );
            return Err(catalog::Error::Rejected(violations).into());
        }

        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for document in documents {
            upsert_row(&tx, document, &now)?;
        }
        tx.commit()?;

        tracing::info!(documents = documents.len(), "Upserted acl documents");
        Ok(documents.len())
    }

    fn write(&self, document: &AclDocument) -> Result<()> {
        upsert_row(&self.conn, document, &Utc::now().to_rfc3339())
    }

    /// Delete every document. Returns how many were removed.
    pub fn reset(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM acl", [])?;
        tracing::info!(removed, "Reset acl store");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT data, updated_at FROM acl WHERE id = ?1",
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((data, updated_at)) = row else {
            return Ok(None);
        };
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|source| Error::Timestamp {
                id: id.to_string(),
                source,
            })?
            .with_timezone(&Utc);
        Ok(Some(StoredDocument {
            document: serde_json::from_str(&data)?,
            updated_at,
        }))
    }

    /// Number of stored documents of `document_type`.
    pub fn count(&self, document_type: DocumentType) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM acl WHERE type = ?1",
            [document_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Every stored document, ordered by type then id.
    pub fn documents(&self) -> Result<Vec<AclDocument>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM acl ORDER BY type, id")?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|data| -> Result<Value> { Ok(serde_json::from_str(&data?)?) })
            .collect::<Result<Vec<Value>>>()?;
        Ok(documents_from_values(values)?)
    }

    /// Roles whose `functiongroups` contain `group_id`.
    pub fn roles_with_group(&self, group_id: &str) -> Result<Vec<RoleId>> {
        self.ids(
            "SELECT DISTINCT acl.id FROM acl, json_each(acl.data, '$.functiongroups') AS member
             WHERE acl.type = 'role' AND member.value = ?1 ORDER BY acl.id",
            group_id,
        )
    }

    /// Function groups whose `functions` contain `function_id`.
    pub fn groups_with_function(&self, function_id: &str) -> Result<Vec<GroupId>> {
        self.ids(
            "SELECT DISTINCT acl.id FROM acl, json_each(acl.data, '$.functions') AS member
             WHERE acl.type = 'functiongroup' AND member.value = ?1 ORDER BY acl.id",
            function_id,
        )
    }

    /// Endpoint functions granting `operation_id`.
    pub fn functions_by_operation(&self, operation_id: &str) -> Result<Vec<FunctionId>> {
        self.ids(
            "SELECT id FROM acl
             WHERE type = 'function'
               AND json_extract(data, '$.endpoint.operationid') = ?1
             ORDER BY id",
            operation_id,
        )
    }

    /// Capability functions of `capability_type`.
    pub fn functions_by_capability(&self, capability_type: CapabilityType) -> Result<Vec<FunctionId>> {
        self.ids(
            "SELECT id FROM acl
             WHERE type = 'function'
               AND json_extract(data, '$.capability.captype') = ?1
             ORDER BY id",
            capability_type.as_str(),
        )
    }

    /// Menu functions naming `parent_id` as their parent.
    pub fn menu_children(&self, parent_id: &str) -> Result<Vec<FunctionId>> {
        self.ids(
            "SELECT id FROM acl
             WHERE type = 'function'
               AND json_extract(data, '$.menu.functionparentid') = ?1
             ORDER BY id",
            parent_id,
        )
    }

    fn ids(&self, sql: &str, param: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([param], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

fn upsert_row(conn: &Connection, document: &AclDocument, updated_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO acl (id, type, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             type = excluded.type,
             data = excluded.data,
             updated_at = excluded.updated_at",
        params![
            document.id(),
            document.document_type().as_str(),
            serde_json::to_string(document)?,
            updated_at,
        ],
    )?;
    Ok(())
}

impl CatalogSource for AclStore {
    fn load_all(&self) -> catalog::Result<CatalogRecords> {
        let documents = self.documents().map_err(|e| match e {
            Error::Catalog(inner) => inner,
            other => catalog::Error::Source(Box::new(other)),
        })?;
        tracing::debug!(documents = documents.len(), "Read acl store");
        Ok(CatalogRecords::from_documents(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::{Catalog, RawFunction, sample};
    use serde_json::json;

    fn seeded() -> AclStore {
        let mut store = AclStore::in_memory().unwrap();
        store.upsert_all(&sample::documents().unwrap()).unwrap();
        store
    }

    #[test]
    fn test_seed_and_count() {
        let store = seeded();
        assert_eq!(store.count(DocumentType::Function).unwrap(), 11);
        assert_eq!(store.count(DocumentType::FunctionGroup).unwrap(), 3);
        assert_eq!(store.count(DocumentType::Role).unwrap(), 3);
    }

    #[test]
    fn test_seeding_twice_is_idempotent() {
        let mut store = seeded();
        store.upsert_all(&sample::documents().unwrap()).unwrap();
        assert_eq!(store.count(DocumentType::Function).unwrap(), 11);
    }

    #[test]
    fn test_get_round_trips_document() {
        let store = seeded();
        let stored = store.get("MENU_USERS_LIST").unwrap().unwrap();
        let AclDocument::Function(raw) = &stored.document else {
            panic!("expected a function");
        };
        let menu = raw.menu.as_ref().unwrap();
        assert_eq!(menu.functionparentid, Some(json!("MENU_USERS")));
        assert_eq!(menu.order, Some(json!(11)));
        assert!(stored.updated_at <= Utc::now());

        assert!(store.get("NOPE").unwrap().is_none());
    }

    #[test]
    fn test_upsert_refuses_invalid_function() {
        let store = AclStore::in_memory().unwrap();
        let doc = AclDocument::Function(RawFunction {
            id: "EMPTY".into(),
            ..Default::default()
        });

        let err = store.upsert(&doc).unwrap_err();
        let Error::Catalog(inner) = err else {
            panic!("expected a catalog error");
        };
        assert_eq!(inner.violations().len(), 1);
        assert!(store.get("EMPTY").unwrap().is_none());
    }

    #[test]
    fn test_upsert_all_is_all_or_nothing() {
        let mut store = AclStore::in_memory().unwrap();
        let mut documents = sample::documents().unwrap();
        documents.push(
            serde_json::from_value(json!({
                "_id": "BAD_CAP", "type": "function", "capability": { "captype": "desktop" }
            }))
            .unwrap(),
        );

        assert!(store.upsert_all(&documents).is_err());
        assert_eq!(store.count(DocumentType::Role).unwrap(), 0);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let store = seeded();
        let doc: AclDocument = serde_json::from_value(json!({
            "_id": "ROLE_USER", "type": "role", "functiongroups": ["FG_COMMON"]
        }))
        .unwrap();
        store.upsert(&doc).unwrap();

        assert_eq!(store.roles_with_group("FG_USERS").unwrap(), vec!["ROLE_ADMIN"]);
        assert_eq!(store.count(DocumentType::Role).unwrap(), 3);
    }

    #[test]
    fn test_reset() {
        let store = seeded();
        assert_eq!(store.reset().unwrap(), 17);
        assert!(store.documents().unwrap().is_empty());
    }

    #[test]
    fn test_reverse_lookups() {
        let store = seeded();
        assert_eq!(
            store.roles_with_group("FG_REPORTS").unwrap(),
            vec!["ROLE_ADMIN", "ROLE_REPORT"]
        );
        assert_eq!(
            store.groups_with_function("MENU_HOME").unwrap(),
            vec!["FG_COMMON"]
        );
        assert_eq!(
            store.functions_by_operation("getUsers").unwrap(),
            vec!["FUNC_USER_LIST"]
        );
        assert_eq!(
            store.functions_by_capability(CapabilityType::Client).unwrap(),
            vec!["CAP_EXPORT"]
        );
        assert_eq!(
            store.menu_children("MENU_USERS").unwrap(),
            vec!["MENU_USERS_LIST"]
        );
        assert!(store.menu_children("MENU_HOME").unwrap().is_empty());
    }

    #[test]
    fn test_store_is_a_catalog_source() {
        let store = seeded();
        let catalog = Catalog::build(store.load_all().unwrap(), 1).unwrap();
        assert_eq!(catalog.function_count(), 11);
        assert!(catalog.role("ROLE_REPORT").is_some());
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let store = seeded();
        store
            .conn
            .execute(
                "UPDATE acl SET data = '{\"_id\":\"ROLE_USER\",\"type\":\"admin\"}' WHERE id = 'ROLE_USER'",
                [],
            )
            .unwrap();

        let err = store.load_all().unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].record, "ROLE_USER");
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acl.db");
        {
            let mut store = AclStore::open(&path).unwrap();
            store.upsert_all(&sample::documents().unwrap()).unwrap();
        }
        let store = AclStore::open(&path).unwrap();
        assert_eq!(store.count(DocumentType::Role).unwrap(), 3);
    }
}
