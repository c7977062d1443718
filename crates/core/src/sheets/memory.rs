use crate::sheets::{Row, SheetStore};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// In-process spreadsheet. Ranges must be seeded before use, like a real sheet's tabs.
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    ranges: Mutex<BTreeMap<String, Vec<Row>>>,
    failing_appends: Mutex<BTreeSet<String>>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(self, range: &str, rows: Vec<Row>) -> Self {
        self.lock_ranges().insert(range.to_string(), rows);
        self
    }

    /// Makes every later append to `range` fail.
    pub fn fail_appends_to(&self, range: &str) {
        self.failing_appends
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(range.to_string());
    }

    pub fn rows(&self, range: &str) -> Vec<Row> {
        self.lock_ranges().get(range).cloned().unwrap_or_default()
    }

    fn lock_ranges(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<Row>>> {
        self.ranges.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl SheetStore for MemorySheetStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn read_all(&self, range: &str) -> Result<Vec<Row>> {
        let ranges = self.lock_ranges();
        let rows = ranges
            .get(range)
            .ok_or_else(|| anyhow::anyhow!("unknown range '{range}'"))?;
        Ok(rows.clone())
    }

    async fn append_row(&self, range: &str, row: Row) -> Result<()> {
        let failing = self
            .failing_appends
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(range);
        anyhow::ensure!(!failing, "append to '{range}' rejected");

        let mut ranges = self.lock_ranges();
        let rows = ranges
            .get_mut(range)
            .ok_or_else(|| anyhow::anyhow!("unknown range '{range}'"))?;
        rows.push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn appends_to_seeded_ranges_only() {
        let store = MemorySheetStore::new().with_range("rawdata", vec![row(&["Date", "dollar"])]);

        store
            .append_row("rawdata", row(&["2026-10-16", "1350.55"]))
            .await
            .unwrap();
        assert_eq!(store.read_all("rawdata").await.unwrap().len(), 2);

        assert!(store.append_row("missing", row(&["x"])).await.is_err());
        assert!(store.read_all("missing").await.is_err());
    }

    #[tokio::test]
    async fn failing_range_rejects_appends() {
        let store = MemorySheetStore::new().with_range("dollar", vec![]);
        store.fail_appends_to("dollar");
        assert!(store.append_row("dollar", row(&["a"])).await.is_err());
        assert!(store.rows("dollar").is_empty());
    }
}
