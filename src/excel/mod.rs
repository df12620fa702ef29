//! Spreadsheet I/O: calamine-based ingestion plus in-place status write-back.

mod reader;
mod status;

pub use reader::read_worksheet;
pub use status::{apply_status_updates, StatusUpdate};
