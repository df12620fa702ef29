use crate::docx::DocxTemplate;
use crate::engine::{Engine, StatusColumn};
use crate::error::DocmillResult;
use crate::excel;
use crate::mapping::{load_mapping, DEFAULT_MAPPING_FILE};
use crate::report::{print_summary, RunLogger};
use crate::types::{DocumentOutcome, DocumentType};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Execute the generate command: one full reconciliation run.
#[allow(clippy::too_many_arguments)]
pub fn generate(
    spreadsheet: PathBuf,
    worksheet: String,
    doc_type: DocumentType,
    template: PathBuf,
    output_root: PathBuf,
    mapping_file: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
) -> DocmillResult<()> {
    println!(
        "{}",
        format!("docmill - Generating {} Analysis documents", doc_type.label())
            .bold()
            .green()
    );
    println!("   Spreadsheet: {} [{}]", spreadsheet.display(), worksheet);
    println!("   Template:    {}", template.display());
    println!("   Output root: {}", output_root.display());
    println!();

    if dry_run {
        println!("{}", "DRY RUN - no documents or status cells will be written\n".yellow());
    }

    let mapping_path = mapping_file.unwrap_or_else(|| default_mapping_path(&spreadsheet));
    let mapping = load_mapping(&mapping_path)?;
    if verbose {
        println!(
            "   Mapping: {} rule(s) from {}",
            mapping.len(),
            mapping_path.display()
        );
    }
    if mapping.is_empty() {
        println!(
            "{}",
            format!("Warning: {} contains no usable rules", mapping_path.display()).yellow()
        );
    }

    let mut template = DocxTemplate::open(&template)?;
    let sheet = excel::read_worksheet(&spreadsheet, &worksheet)?;
    if verbose {
        println!("   Rows: {} data row(s), {} column(s)", sheet.rows.len(), sheet.headers.len());
    }

    let mut status = StatusColumn::locate(&sheet, doc_type);
    if !status.is_present() {
        println!(
            "{}",
            format!(
                "Warning: no '{}' column in worksheet; status tracking disabled",
                doc_type.status_column()
            )
            .yellow()
        );
    }

    let run = Engine::new(&mapping, doc_type, &output_root)
        .dry_run(dry_run)
        .run(&sheet, &mut template, &mut status);

    let mut logger = (!dry_run)
        .then(|| RunLogger::new(&output_root))
        .transpose()?;
    for row in &run.outcomes {
        if verbose || matches!(row.outcome, DocumentOutcome::Failed { .. }) {
            print_outcome(row);
        }
        if let Some(logger) = logger.as_mut() {
            logger.log(row)?;
        }
    }

    if !dry_run {
        // Persist the workbook even when rows failed along the way.
        excel::apply_status_updates(&spreadsheet, &worksheet, status.pending())?;
        if verbose && !status.pending().is_empty() {
            println!(
                "   Updated {} status cell(s) in {}",
                status.pending().len(),
                spreadsheet.display()
            );
        }
    }

    if let Some(logger) = logger {
        for path in logger.finish()? {
            println!("   Log: {}", path.display());
        }
    }

    print_summary(&run.totals);

    // Row failures are reported, never fatal.
    Ok(())
}

fn print_outcome(row: &crate::types::RowOutcome) {
    match &row.outcome {
        DocumentOutcome::Created { path, fields } => {
            println!(
                "   {} {} -> {} ({} field(s))",
                "created".green(),
                row.identity.bold(),
                path.display(),
                fields.len()
            );
        }
        DocumentOutcome::AlreadyExists { status_updated, .. } => {
            let note = if *status_updated {
                "status corrected"
            } else {
                "up to date"
            };
            println!("   {} {} ({})", "exists ".yellow(), row.identity.bold(), note);
        }
        DocumentOutcome::Failed { reason } => {
            println!("   {} {}: {}", "failed ".red().bold(), row.identity.bold(), reason);
        }
    }
}

fn default_mapping_path(spreadsheet: &Path) -> PathBuf {
    spreadsheet
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_MAPPING_FILE)
}

/// Execute the mapping command: parse a mapping file and show what it does.
pub fn mapping(file: PathBuf) -> DocmillResult<()> {
    let mapping = load_mapping(&file)?;

    println!("{}", format!("Mapping rules in {}", file.display()).bold());
    match mapping.partition_source() {
        Some(col) => println!(
            "   {} {} (partitions output folders)",
            "folder: ".cyan(),
            col.bold()
        ),
        None => println!("   {} none (documents go directly under the output root)", "folder: ".cyan()),
    }
    for rule in mapping.rules() {
        println!("   {} {} -> {}", "field:  ".cyan(), rule.source, rule.target.bold());
    }
    if mapping.is_empty() {
        println!("{}", "   (no usable rules)".yellow());
    }
    Ok(())
}
