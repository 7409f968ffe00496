//! Demandsum CLI - Summarize Firm+Forecast demand per part and vendor
//!
//! # Commands
//!
//! ```bash
//! demandsum aggregate plan.xlsb           # Write plan_FirmForecast_Sum.xlsx next to it
//! demandsum aggregate plan.xlsx -o out.xlsx
//! demandsum inspect plan.xls              # Show sheet, columns and demand range
//! demandsum serve                         # Start HTTP server (port 3000)
//! ```

use clap::{Parser, Subcommand};
use demandsum::api::logs::{log_info, log_info_indent, log_success, log_warning};
use demandsum::config::{DEFAULT_PORT, PREVIEW_ROWS};
use demandsum::transform::ColumnLayout;
use demandsum::{aggregate_file, output_file_name, parse_file, write_xlsx_file};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "demandsum")]
#[command(about = "Summarize Firm+Forecast demand per part and vendor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a planning workbook and write the summary workbook
    Aggregate {
        /// Input workbook (.xlsx, .xls, .xlsb)
        input: PathBuf,

        /// Output file (default: <input>_FirmForecast_Sum.xlsx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of result rows to print (0 to print none)
        #[arg(long, default_value_t = PREVIEW_ROWS)]
        preview_rows: usize,
    },

    /// Show what the reader sees in a workbook, without aggregating
    Inspect {
        /// Input workbook (.xlsx, .xls, .xlsb)
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Aggregate {
            input,
            output,
            preview_rows,
        } => cmd_aggregate(&input, output.as_deref(), preview_rows),

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_aggregate(
    input: &Path,
    output: Option<&Path>,
    preview_rows: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = aggregate_file(input)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input));
    write_xlsx_file(&result.table, &output)?;
    log_success(format!("💾 Output written to: {}", output.display()));

    if preview_rows > 0 {
        println!("\n{}", result.table.render(preview_rows));
    }

    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = parse_file(input)?;
    let mut table = parsed.table;

    log_info(format!("📄 {} ({})", input.display(), parsed.format));
    log_info_indent(format!("Sheet: {}", parsed.sheet_name), 1);
    log_info_indent(format!("Rows: {}", table.row_count()), 1);
    log_info_indent(format!("Columns: {}", table.columns().join(", ")), 1);

    table.trim_columns();
    match ColumnLayout::resolve(&table) {
        Ok(layout) => {
            let demand: Vec<&str> = layout.demand_names().collect();
            log_info_indent(
                format!("Demand columns ({}): {}", demand.len(), demand.join(", ")),
                1,
            );
            let metadata: Vec<&str> = layout.metadata.iter().map(|(n, _)| n.as_str()).collect();
            log_info_indent(format!("Metadata: {}", metadata.join(", ")), 1);
            if layout.site.is_none() {
                log_warning("No 'Site' column: stock quantities will be 0");
            }
            log_success("Ready to aggregate");
        }
        Err(e) => log_warning(format!("Cannot aggregate: {}", e)),
    }

    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    demandsum::server::start_server(port).await
}

/// `<dir>/<stem>_FirmForecast_Sum.xlsx` next to the input.
fn default_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    input.with_file_name(output_file_name(&name))
}
