pub mod google;
pub mod memory;

use anyhow::Result;

pub use google::GoogleSheetsClient;
pub use memory::MemorySheetStore;

/// One spreadsheet row, cells rendered as strings.
pub type Row = Vec<String>;

/// Append-only view of the named ranges the updater touches.
#[async_trait::async_trait]
pub trait SheetStore: Send + Sync {
    fn store_name(&self) -> &'static str;

    /// Every row the range currently holds, header row included.
    async fn read_all(&self, range: &str) -> Result<Vec<Row>>;

    async fn append_row(&self, range: &str, row: Row) -> Result<()>;
}
