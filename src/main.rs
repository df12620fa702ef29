use clap::{Parser, Subcommand};
use colored::Colorize;
use docmill::cli;
use docmill::types::DocumentType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docmill")]
#[command(about = "Batch-generate Word analysis documents from spreadsheet rows")]
#[command(long_about = "docmill - Spreadsheet-driven Word document generation

Reads rows from an Excel worksheet, instantiates a .docx template once per
row by filling its custom document properties, and records progress back in
the spreadsheet's status column. Re-runs are idempotent: rows whose document
already exists are skipped.

COMMANDS:
  generate - Create documents for every row of a worksheet
  mapping  - Parse and display a column-mapping file

EXAMPLES:
  docmill generate apps.xlsx -w Applications -d type1 \\
      -t 'Type 1 Template.docx' -o ./output
  docmill generate apps.xlsx -w Applications -d type2 \\
      -t template.docx -o ./output -m custom_mappings.txt --dry-run
  docmill mapping column_mappings.txt")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Create documents for every row of a worksheet.

For each data row (the first row is the header), the value of the
'Application / System' column identifies the row. The output document is
named '{identity} - {Type label} Analysis.docx' and placed under the output
root, in a subfolder taken from the mapping's DOCUMENT_FOLDER column.

Rows whose document already exists are skipped; their status cell is
corrected to 'Yes' if needed. Rendering failures are logged and the run
continues. Three CSV logs (created, existing, errors) are written under the
output root.

The mapping file defaults to 'column_mappings.txt' next to the spreadsheet:

  Division, DOCUMENT_FOLDER
  Application / System, System Name
  Business Owner, Owner")]
    /// Create documents for every row of a worksheet
    Generate {
        /// Path to the .xlsx workbook
        spreadsheet: PathBuf,

        /// Worksheet name inside the workbook
        #[arg(short, long)]
        worksheet: String,

        /// Kind of analysis document to generate
        #[arg(short, long, value_enum)]
        doc_type: DocumentType,

        /// Path to the .docx template with custom document properties
        #[arg(short, long)]
        template: PathBuf,

        /// Root folder for generated documents and run logs
        #[arg(short, long)]
        output_root: PathBuf,

        /// Mapping file (default: column_mappings.txt next to the spreadsheet)
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Decide and report without writing documents, logs, or status cells
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show one line per processed row
        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse and display a column-mapping file
    Mapping {
        /// Path to the mapping file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            spreadsheet,
            worksheet,
            doc_type,
            template,
            output_root,
            mapping,
            dry_run,
            verbose,
        } => cli::generate(
            spreadsheet,
            worksheet,
            doc_type,
            template,
            output_root,
            mapping,
            dry_run,
            verbose,
        ),

        Commands::Mapping { file } => cli::mapping(file),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
