use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::repo::KeyValueRepository;

/// Schemaless record, as stored in a simulated table.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: `{0}`")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: `{0}`")]
    Serialization(#[from] serde_json::Error),
}

/// Simulated relational tables: each table is a single key-value entry holding
/// a serialized array of rows.
#[derive(Clone)]
pub struct TableStore {
    kv: KeyValueRepository,
}

impl TableStore {
    pub fn new(kv: KeyValueRepository) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &KeyValueRepository {
        &self.kv
    }

    fn table_key(table: &str) -> String {
        format!("table:{table}")
    }

    /// A table that was never written is empty, not an error.
    pub async fn load_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let Some(raw) = self.kv.get_item(&Self::table_key(table)).await? else {
            return Ok(Vec::new());
        };

        let values: Vec<Value> = serde_json::from_str(&raw)?;
        let rows = values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(row) => Some(row),
                other => {
                    warn!("Skipping non-object row in table `{table}`: {other}");
                    None
                }
            })
            .collect();

        Ok(rows)
    }

    pub async fn save_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(rows)?;
        self.kv.set_item(&Self::table_key(table), &raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::connect_in_memory;
    use serde_json::json;

    async fn store() -> TableStore {
        TableStore::new(KeyValueRepository::new(connect_in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn missing_table_is_empty() {
        let store = store().await;

        assert!(store.load_rows("photos").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_are_scoped_by_table_name() {
        let store = store().await;
        let row = json!({"id": "1", "name": "a"}).as_object().cloned().unwrap();

        store.save_rows("photos", &[row.clone()]).await.unwrap();

        assert_eq!(store.load_rows("photos").await.unwrap(), vec![row]);
        assert!(store.load_rows("albums").await.unwrap().is_empty());
        assert_eq!(
            store.kv().get_item("table:photos").await.unwrap().as_deref(),
            Some(r#"[{"id":"1","name":"a"}]"#)
        );
    }

    #[tokio::test]
    async fn non_object_entries_are_skipped() {
        let store = store().await;
        store
            .kv()
            .set_item("table:photos", r#"[1, {"id": "x"}, "y"]"#)
            .await
            .unwrap();

        let rows = store.load_rows("photos").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "x");
    }

    #[tokio::test]
    async fn corrupt_table_is_a_serialization_error() {
        let store = store().await;
        store.kv().set_item("table:photos", "not json").await.unwrap();

        assert!(matches!(
            store.load_rows("photos").await,
            Err(StoreError::Serialization(_))
        ));
    }
}
