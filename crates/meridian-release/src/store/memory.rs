//! In-memory release table for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Collaborator, ReleaseError, ReleaseResult};

use super::{attr, Item, ReleaseTable};

/// In-memory release tables for testing.
///
/// This implementation is not suitable for production use as data is lost
/// when the process exits.
#[derive(Debug, Default)]
pub struct MemoryReleaseTable {
    tables: RwLock<HashMap<String, HashMap<String, Item>>>,
}

impl MemoryReleaseTable {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in a table.
    pub fn len(&self, table: &str) -> ReleaseResult<usize> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.get(table).map_or(0, HashMap::len))
    }

    /// Returns true if a table holds no items.
    pub fn is_empty(&self, table: &str) -> ReleaseResult<bool> {
        Ok(self.len(table)? == 0)
    }
}

fn poisoned() -> ReleaseError {
    ReleaseError::dependency(Collaborator::MetadataStore, "lock", "lock poisoned")
}

#[async_trait]
impl ReleaseTable for MemoryReleaseTable {
    async fn get(&self, table: &str, id: &str) -> ReleaseResult<Option<Item>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.get(table).and_then(|items| items.get(id)).cloned())
    }

    async fn query_app(&self, table: &str, app: &str, limit: usize) -> ReleaseResult<Vec<Item>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;

        let mut results: Vec<Item> = tables
            .get(table)
            .map(|items| {
                items
                    .values()
                    .filter(|item| item.get(attr::APP).map(String::as_str) == Some(app))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        results.sort_by(|a, b| b.get(attr::CREATED).cmp(&a.get(attr::CREATED)));
        results.truncate(limit);

        Ok(results)
    }

    async fn put(&self, table: &str, item: Item) -> ReleaseResult<()> {
        let id = item
            .get(attr::ID)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| ReleaseError::validation("item has no id"))?;

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.entry(table.to_owned()).or_default().insert(id, item);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, app: &str, created: &str) -> Item {
        let mut item = Item::new();
        item.insert(attr::ID.to_owned(), id.to_owned());
        item.insert(attr::APP.to_owned(), app.to_owned());
        item.insert(attr::CREATED.to_owned(), created.to_owned());
        item
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = MemoryReleaseTable::new();

        store
            .put("t", item("R1", "shop", "20240101.000000.000000000"))
            .await
            .expect("put failed");

        let retrieved = store
            .get("t", "R1")
            .await
            .expect("get failed")
            .expect("item not found");
        assert_eq!(retrieved[attr::APP], "shop");

        assert!(store.get("t", "R2").await.expect("get failed").is_none());
        assert!(store.get("other", "R1").await.expect("get failed").is_none());
    }

    #[tokio::test]
    async fn put_replaces_whole_item() {
        let store = MemoryReleaseTable::new();

        let mut first = item("R1", "shop", "20240101.000000.000000000");
        first.insert(attr::BUILD.to_owned(), "B1".to_owned());
        store.put("t", first).await.expect("put failed");
        store
            .put("t", item("R1", "shop", "20240101.000000.000000000"))
            .await
            .expect("put failed");

        let retrieved = store.get("t", "R1").await.unwrap().unwrap();
        assert!(!retrieved.contains_key(attr::BUILD));
        assert_eq!(store.len("t").unwrap(), 1);
    }

    #[tokio::test]
    async fn put_without_id_fails() {
        let store = MemoryReleaseTable::new();
        assert!(store.put("t", Item::new()).await.is_err());
        assert!(store.is_empty("t").unwrap());
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_limits() {
        let store = MemoryReleaseTable::new();

        for i in 0..5 {
            store
                .put("t", item(&format!("R{i}"), "shop", &format!("2024010{i}.000000.000000000")))
                .await
                .unwrap();
        }
        store
            .put("t", item("X", "other", "20991231.000000.000000000"))
            .await
            .unwrap();

        let page = store.query_app("t", "shop", 3).await.unwrap();
        let ids: Vec<_> = page.iter().map(|i| i[attr::ID].as_str()).collect();
        assert_eq!(ids, vec!["R4", "R3", "R2"]);
    }
}
