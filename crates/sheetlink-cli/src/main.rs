//! sheetlink CLI - inspect and edit spreadsheets from the shell

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand};
use sheetlink::prelude::*;
use sheetlink::{cell_name, ExcelBridgeConfig, LiveOptions, StyleRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetlink")]
#[command(
    author,
    version,
    about = "Inspect and edit spreadsheets through the file or a running Excel"
)]
struct Cli {
    /// Backend to use: auto, file or live
    #[arg(long, global = true, default_value = "auto")]
    backend: BackendPreference,

    /// Cell budget of one page when paging by size
    #[arg(
        long,
        global = true,
        env = "SHEETLINK_PAGING_CELLS_LIMIT",
        default_value_t = 4000
    )]
    page_cells: usize,

    /// Path of excel-com-bridge.exe
    #[arg(long, global = true)]
    bridge_exe: Option<PathBuf>,

    /// Start Excel and open the workbook when it is not already open
    #[arg(long, global = true)]
    launch: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Workbook and sheet every sheet-level command works on
#[derive(Args)]
struct SheetArgs {
    /// Workbook file
    input: PathBuf,

    /// Sheet name
    sheet: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Workbook file
        input: PathBuf,
    },

    /// List the pages of a sheet
    Pages {
        #[command(flatten)]
        target: SheetArgs,

        /// Print only the page after this one
        #[arg(long, conflicts_with = "known")]
        after: Option<String>,

        /// Leave out pages already seen
        #[arg(long, num_args = 1..)]
        known: Vec<String>,
    },

    /// Print the values of a range, tab separated
    Read {
        #[command(flatten)]
        target: SheetArgs,

        /// Range such as A1:D20; defaults to the used region
        range: Option<String>,

        /// Refuse ranges that are not one of the sheet's pages
        #[arg(long)]
        page: bool,

        /// Also print each cell's style ids and the style definitions
        #[arg(long)]
        styles: bool,
    },

    /// Write values into a row starting at a cell
    Write {
        #[command(flatten)]
        target: SheetArgs,

        /// First cell to write
        cell: String,

        /// Values; numbers and TRUE/FALSE are typed, the rest is text
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Print or set the formula of a cell
    Formula {
        #[command(flatten)]
        target: SheetArgs,

        cell: String,

        /// New formula, with or without the leading `=`
        #[arg(long)]
        set: Option<String>,
    },

    /// Read or change cell styles as JSON
    Style {
        #[command(subcommand)]
        action: StyleAction,
    },

    /// Copy a sheet; prints the name given to the copy
    CopySheet {
        /// Workbook file
        input: PathBuf,

        source: String,

        destination: String,
    },

    /// Add an empty sheet
    NewSheet {
        /// Workbook file
        input: PathBuf,

        name: String,
    },

    /// Turn a range into a table
    AddTable {
        #[command(flatten)]
        target: SheetArgs,

        range: String,

        name: String,
    },

    /// List the tables and pivot tables of a sheet
    Tables {
        #[command(flatten)]
        target: SheetArgs,
    },

    /// Save a range as a bitmap (live backend only)
    Capture {
        #[command(flatten)]
        target: SheetArgs,

        range: String,

        /// Output BMP file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum StyleAction {
    /// Print the style of a cell
    Get {
        #[command(flatten)]
        target: SheetArgs,

        cell: String,
    },

    /// Apply a JSON style to a cell; unset fields are left alone
    Set {
        #[command(flatten)]
        target: SheetArgs,

        cell: String,

        /// Style JSON, e.g. '{"font":{"bold":true}}'
        style: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = SessionConfig {
        backend: cli.backend,
        bridge: ExcelBridgeConfig {
            bridge_exe_path: cli.bridge_exe.clone(),
            ..Default::default()
        },
        live: LiveOptions {
            launch_if_missing: cli.launch,
            ..Default::default()
        },
    };

    match cli.command {
        Commands::Sheets { input } => with_workbook(&input, &config, list_sheets),
        Commands::Pages {
            target,
            after,
            known,
        } => with_sheet(&target, &config, |sheet| {
            list_pages(sheet, cli.page_cells, after.as_deref(), &known)
        }),
        Commands::Read {
            target,
            range,
            page,
            styles,
        } => with_sheet(&target, &config, |sheet| {
            read_range(sheet, range.as_deref(), page.then_some(cli.page_cells), styles)
        }),
        Commands::Write {
            target,
            cell,
            values,
        } => edit_sheet(&target, &config, |sheet| {
            let row: Vec<CellValue> = values.iter().map(|v| CellValue::infer(v)).collect();
            sheet
                .write_range(&cell, &[row])
                .with_context(|| format!("Failed to write at {cell}"))
        }),
        Commands::Formula { target, cell, set } => match set {
            Some(formula) => edit_sheet(&target, &config, |sheet| {
                sheet
                    .set_formula(&cell, &formula)
                    .with_context(|| format!("Failed to set formula of {cell}"))
            }),
            None => with_sheet(&target, &config, |sheet| {
                println!("{}", sheet.get_formula(&cell)?);
                Ok(())
            }),
        },
        Commands::Style { action } => match action {
            StyleAction::Get { target, cell } => with_sheet(&target, &config, |sheet| {
                let style = sheet.cell_style(&cell)?;
                println!("{}", serde_json::to_string_pretty(&style)?);
                Ok(())
            }),
            StyleAction::Set {
                target,
                cell,
                style,
            } => {
                let style: CellStyle =
                    serde_json::from_str(&style).context("Style is not valid JSON")?;
                edit_sheet(&target, &config, |sheet| {
                    sheet
                        .set_cell_style(&cell, &style)
                        .with_context(|| format!("Failed to style {cell}"))
                })
            }
        },
        Commands::CopySheet {
            input,
            source,
            destination,
        } => edit_workbook(&input, &config, |workbook| {
            let name = workbook.copy_sheet(&source, &destination)?;
            println!("{name}");
            Ok(())
        }),
        Commands::NewSheet { input, name } => edit_workbook(&input, &config, |workbook| {
            workbook
                .create_new_sheet(&name)
                .with_context(|| format!("Failed to create sheet '{name}'"))
        }),
        Commands::AddTable {
            target,
            range,
            name,
        } => edit_sheet(&target, &config, |sheet| {
            let table = sheet.add_table(&range, &name)?;
            println!("{table}");
            Ok(())
        }),
        Commands::Tables { target } => with_sheet(&target, &config, list_tables),
        Commands::Capture {
            target,
            range,
            output,
        } => with_sheet(&target, &config, |sheet| capture(sheet, &range, &output)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

/// The library wants absolute paths; resolve relative ones against the
/// working directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    Ok(cwd.join(path))
}

fn run_workbook<F>(input: &Path, config: &SessionConfig, save: bool, f: F) -> Result<()>
where
    F: FnOnce(&dyn Workbook) -> Result<()>,
{
    let path = absolute(input)?;
    let (workbook, mut cleanup) = open_file_with(&path, config)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    tracing::debug!(backend = workbook.backend_name(), "opened workbook");

    f(workbook.as_ref())?;
    if save {
        workbook
            .save()
            .with_context(|| format!("Failed to save '{}'", input.display()))?;
    }
    drop(workbook);
    cleanup.run().context("Failed to close the session")?;
    Ok(())
}

fn with_workbook<F>(input: &Path, config: &SessionConfig, f: F) -> Result<()>
where
    F: FnOnce(&dyn Workbook) -> Result<()>,
{
    run_workbook(input, config, false, f)
}

fn edit_workbook<F>(input: &Path, config: &SessionConfig, f: F) -> Result<()>
where
    F: FnOnce(&dyn Workbook) -> Result<()>,
{
    run_workbook(input, config, true, f)
}

fn run_sheet<F>(target: &SheetArgs, config: &SessionConfig, save: bool, f: F) -> Result<()>
where
    F: FnOnce(&dyn Worksheet) -> Result<()>,
{
    run_workbook(&target.input, config, save, |workbook| {
        let sheet = workbook
            .find_sheet(&target.sheet)
            .with_context(|| format!("Sheet '{}' not found", target.sheet))?;
        let result = f(sheet.as_ref());
        sheet.release()?;
        result
    })
}

fn with_sheet<F>(target: &SheetArgs, config: &SessionConfig, f: F) -> Result<()>
where
    F: FnOnce(&dyn Worksheet) -> Result<()>,
{
    run_sheet(target, config, false, f)
}

fn edit_sheet<F>(target: &SheetArgs, config: &SessionConfig, f: F) -> Result<()>
where
    F: FnOnce(&dyn Worksheet) -> Result<()>,
{
    run_sheet(target, config, true, f)
}

fn list_sheets(workbook: &dyn Workbook) -> Result<()> {
    for name in workbook.sheet_names()? {
        println!("{name}");
    }
    Ok(())
}

fn list_pages(
    sheet: &dyn Worksheet,
    budget: usize,
    after: Option<&str>,
    known: &[String],
) -> Result<()> {
    let service = PagingRangeService::new(sheet.paging_strategy(budget)?);
    let pages = service.paging_ranges();
    tracing::debug!(kind = ?service.kind(), count = pages.len(), "paged sheet");

    if let Some(current) = after {
        let next = service.find_next_range(&pages, current);
        if !next.is_empty() {
            println!("{next}");
        }
        return Ok(());
    }
    for page in service.filter_remaining_paging_ranges(&pages, known) {
        println!("{page}");
    }
    Ok(())
}

fn read_range(
    sheet: &dyn Worksheet,
    range: Option<&str>,
    page_budget: Option<usize>,
    styles: bool,
) -> Result<()> {
    let range = match range {
        Some(range) => range.to_string(),
        None => sheet.dimension()?.to_string(),
    };
    if let Some(budget) = page_budget {
        PagingRangeService::new(sheet.paging_strategy(budget)?)
            .validate_page(&range)
            .with_context(|| format!("{range} cannot be read as one page"))?;
    }
    for row in sheet.read_range(&range)? {
        println!("{}", row.join("\t"));
    }
    if styles {
        print_styles(sheet, &Range::parse(&range)?)?;
    }
    Ok(())
}

/// Style ids per styled cell, then every definition once
fn print_styles(sheet: &dyn Worksheet, range: &Range) -> Result<()> {
    let mut registry = StyleRegistry::new();
    println!();
    for row in range.start_row..=range.end_row {
        for col in range.start_col..=range.end_col {
            let cell = cell_name(col, row)?;
            let ids = registry.register(&sheet.cell_style(&cell)?);
            if !ids.is_empty() {
                println!("{cell}\t{}", ids.join(" "));
            }
        }
    }
    for definition in registry.definitions() {
        println!("{}\t{}", definition.id, definition.body);
    }
    Ok(())
}

fn list_tables(sheet: &dyn Worksheet) -> Result<()> {
    for table in sheet.tables()? {
        println!("table\t{table}");
    }
    for pivot in sheet.pivot_tables()? {
        println!("pivot\t{pivot}");
    }
    Ok(())
}

fn capture(sheet: &dyn Worksheet, range: &str, output: &Path) -> Result<()> {
    let encoded = sheet.capture_picture(range)?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Bridge returned an invalid image")?;
    if bytes.is_empty() {
        bail!("Bridge returned an empty image");
    }
    std::fs::write(output, &bytes)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    eprintln!("Wrote {} bytes to '{}'", bytes.len(), output.display());
    Ok(())
}
