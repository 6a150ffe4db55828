use anyhow::Result;

use super::schema::Database;
use super::types::CacheSnapshot;
use crate::model::ArticleRecord;

impl Database {
    // ========================================================================
    // Page Cache Operations
    // ========================================================================

    /// Replace the cached first page wholesale.
    ///
    /// The slot is never appended to. Concurrent writers are last-writer-wins.
    pub async fn write_page_cache(&self, items: &[ArticleRecord]) -> Result<()> {
        let payload = serde_json::to_string(items)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO page_cache (slot, payload, item_count, written_at)
            VALUES (0, ?, ?, datetime('now'))
        "#,
        )
        .bind(&payload)
        .bind(items.len() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read the cached first page.
    ///
    /// A missing slot or an undecodable payload yields an empty snapshot: the
    /// cache is advisory and must never block the real fetch. Only storage
    /// failures surface as `Err`.
    pub async fn read_page_cache(&self) -> Result<CacheSnapshot> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT payload, written_at FROM page_cache WHERE slot = 0")
                .fetch_optional(&self.pool)
                .await?;

        let Some((payload, written_at)) = row else {
            return Ok(CacheSnapshot::default());
        };

        match serde_json::from_str::<Vec<ArticleRecord>>(&payload) {
            Ok(items) => Ok(CacheSnapshot {
                items,
                written_at: Some(written_at),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Page cache payload is corrupt, treating as empty");
                Ok(CacheSnapshot {
                    items: Vec::new(),
                    written_at: Some(written_at),
                })
            }
        }
    }

    /// Drop the cached page.
    pub async fn clear_page_cache(&self) -> Result<()> {
        sqlx::query("DELETE FROM page_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
