use sqlx::{SqlitePool, query, query_scalar};

/// Flat string-to-string storage, the persisted layer under every simulated
/// table, bucket and session entry.
#[derive(Clone)]
pub struct KeyValueRepository {
    pool: SqlitePool,
}

impl KeyValueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        query_scalar::<_, String>("select value from key_value_store where key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        query(
            "insert into key_value_store (key, value) values ($1, $2)
            on conflict (key) do update set value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map(|_| ())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), sqlx::Error> {
        query("delete from key_value_store where key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::connect_in_memory;

    #[tokio::test]
    async fn set_get_and_remove() {
        let repo = KeyValueRepository::new(connect_in_memory().await.unwrap());

        assert_eq!(repo.get_item("a").await.unwrap(), None);

        repo.set_item("a", "1").await.unwrap();
        repo.set_item("a", "2").await.unwrap();
        assert_eq!(repo.get_item("a").await.unwrap().as_deref(), Some("2"));

        repo.remove_item("a").await.unwrap();
        assert_eq!(repo.get_item("a").await.unwrap(), None);
    }
}
