//! rqlx: resource queries over SQLite from the command line
//!
//! # Usage
//!
//! ```bash
//! # Read rows
//! rqlx --database-url sqlite://app.db read users 'and(gt(age,26),contains(name,a))&sort(-age)'
//!
//! # Same filter in infix form, as JSON
//! rqlx read users 'age=gt=26&name=contains=a&sort(-age)' --format json
//!
//! # Writes
//! rqlx create users '{"name":"Carol","age":41}'
//! rqlx update users 'eq(id,2)' '{"age":26}'
//! rqlx delete users '' --all
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use rqlx::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rqlx")]
#[command(version)]
#[command(about = "Resource queries over SQLite", long_about = None)]
#[command(after_help = "EXAMPLES:
    rqlx read users 'gt(age,26)'
    rqlx read users 'name=Alice&sort(-age)&select(name,age)&limit(10)'
    rqlx explain users 'in(status,(active,pending))'
    rqlx update users 'eq(id,2)' '{\"age\":26}'")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "RQLX_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Config file (defaults to <config dir>/rqlx/config.toml)
    #[arg(long, env = "RQLX_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Read rows matching a query
    Read {
        table: String,
        #[arg(default_value = "")]
        query: String,
    },
    /// Insert a row given as a JSON object
    Create { table: String, row: String },
    /// Set columns (JSON object) on rows matching a query
    Update {
        table: String,
        query: String,
        patch: String,
        /// Allow an empty query to update every row
        #[arg(long)]
        all: bool,
    },
    /// Delete rows matching a query
    Delete {
        table: String,
        query: String,
        /// Allow an empty query to delete every row
        #[arg(long)]
        all: bool,
    },
    /// Show the SQL a read would run
    Explain {
        table: String,
        #[arg(default_value = "")]
        query: String,
    },
    /// Parse a query without a database
    Parse { query: String },
    /// List tables and columns
    Tables,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rqlx=debug" } else { "rqlx=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(cli: &Cli) -> anyhow::Result<RqlDb> {
    let config = Config::load(cli.config.as_deref())?;
    let url = cli
        .database_url
        .clone()
        .or_else(|| config.database_url.clone())
        .context("No database URL. Use --database-url or set RQLX_DATABASE_URL")?;
    if cli.verbose {
        eprintln!("{} {}", "Connecting to:".dimmed(), url);
    }
    Ok(RqlDb::connect(&url, config).await?)
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Read { table, query } => {
            let db = connect(cli).await?;
            let result = db.read(table, query).await?;
            match cli.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => format_output(&result.rows),
            }
        }
        Commands::Create { table, row } => {
            let row = parse_row(row)?;
            let db = connect(cli).await?;
            let result = db.create(table, &row).await?;
            match cli.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => {
                    println!("{} created", "✓".green());
                    format_output(std::slice::from_ref(&result.row));
                }
            }
        }
        Commands::Update {
            table,
            query,
            patch,
            all,
        } => {
            let patch = parse_row(patch)?;
            let db = connect(cli).await?;
            let options = WriteOptions {
                confirm_unfiltered: *all,
            };
            let result = db.update(table, query, &patch, options).await?;
            print_affected(&result, cli.format)?;
        }
        Commands::Delete { table, query, all } => {
            let db = connect(cli).await?;
            let options = WriteOptions {
                confirm_unfiltered: *all,
            };
            let result = db.delete(table, query, options).await?;
            print_affected(&result, cli.format)?;
        }
        Commands::Explain { table, query } => {
            let db = connect(cli).await?;
            let explain = db.explain(table, query)?;
            match cli.format {
                OutputFormat::Json => print_json(&explain)?,
                OutputFormat::Table => print_explain(query, &explain),
            }
        }
        Commands::Parse { query } => {
            let parsed = rqlx::parse(query)?;
            match cli.format {
                OutputFormat::Json => print_json(&parsed)?,
                OutputFormat::Table => {
                    println!("{} {}", "Query:".dimmed(), query.yellow());
                    println!("{} {}", "Canonical:".dimmed(), parsed.to_string().white());
                    println!();
                    println!("{:#?}", parsed);
                }
            }
        }
        Commands::Tables => {
            let db = connect(cli).await?;
            match cli.format {
                OutputFormat::Json => print_json(db.catalog())?,
                OutputFormat::Table => print_tables(db.catalog()),
            }
        }
    }
    Ok(())
}

fn parse_row(json: &str) -> anyhow::Result<Row> {
    serde_json::from_str(json).with_context(|| format!("Expected a JSON object, got: {}", json))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_affected(result: &WriteResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => println!("{} {} rows affected", "✓".green(), result.affected),
    }
    Ok(())
}

fn format_output(rows: &[Row]) {
    let Some(first) = rows.first() else {
        println!("{}", "(no results)".dimmed());
        return;
    };

    let columns: Vec<&str> = first.columns().collect();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            let len = row.get(col).map(|v| v.to_string().chars().count()).unwrap_or(0);
            widths[i] = widths[i].max(len);
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, &w)| format!("{:width$}", c, width = w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(c, &w)| {
                let val = row.get(c).map(|v| v.to_string()).unwrap_or_default();
                format!("{:width$}", val, width = w)
            })
            .collect();
        println!("{}", cells.join(" │ "));
    }

    println!();
    println!("{} row(s) returned", rows.len().to_string().cyan());
}

fn print_explain(query: &str, explain: &Explain) {
    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();
    match explain {
        Explain::Compiled(statement) => {
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", statement.sql.white());
            if !statement.params.is_empty() {
                println!();
                println!("{}", "Bindings:".cyan());
                for (i, param) in statement.params.iter().enumerate() {
                    println!("  ?{} = {}", i + 1, param.to_string().yellow());
                }
            }
        }
        Explain::Fallback { reason } => {
            println!("{}", "Filtered in memory:".yellow().bold());
            println!("  {}", reason);
        }
    }
}

fn print_tables(catalog: &Catalog) {
    for table in &catalog.tables {
        println!("{}", table.name.cyan().bold());
        for column in &table.columns {
            let key = if column.primary_key { " (pk)" } else { "" };
            println!(
                "  {:20} {}{}",
                column.name.white(),
                column.typ.dimmed(),
                key.yellow()
            );
        }
    }
}
