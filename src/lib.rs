//! docmill - batch Word document generation from spreadsheet rows
//!
//! This library reads an Excel worksheet, reconciles each row against the
//! documents already present in an output folder, and renders a .docx
//! template with the row's values projected into custom document properties.
//! Generation status is written back to the spreadsheet's status column.
//!
//! # Example
//!
//! ```no_run
//! use docmill::docx::DocxTemplate;
//! use docmill::engine::{Engine, StatusColumn};
//! use docmill::mapping::load_mapping;
//! use docmill::types::DocumentType;
//! use std::path::Path;
//!
//! let mapping = load_mapping(Path::new("column_mappings.txt"))?;
//! let mut template = DocxTemplate::open(Path::new("template.docx"))?;
//! let sheet = docmill::excel::read_worksheet(Path::new("apps.xlsx"), "Applications")?;
//! let mut status = StatusColumn::locate(&sheet, DocumentType::Type1);
//!
//! let run = Engine::new(&mapping, DocumentType::Type1, Path::new("output"))
//!     .run(&sheet, &mut template, &mut status);
//!
//! println!("created {} document(s)", run.totals.created);
//! # Ok::<(), docmill::error::DocmillError>(())
//! ```

pub mod cli;
pub mod docx;
pub mod engine;
pub mod error;
pub mod excel;
pub mod mapping;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use error::{DocmillError, DocmillResult};
pub use types::{ColumnMapping, DocumentOutcome, DocumentType, RowOutcome, RunTotals};
