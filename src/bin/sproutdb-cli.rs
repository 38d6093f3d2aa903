//! SproutDB interactive shell
//!
//! Runs one statement with `-e`, otherwise starts a REPL where every line
//! (or `;`-terminated statement) is executed against an in-memory engine.

use anyhow::{Context, Result};
use clap::Parser;
use sproutdb::{Engine, EngineConfig, ExecutionContext, ExecutionResult, ResultData, Row, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "sproutdb-cli", version, about = "Interactive shell for the SproutDB query language")]
struct Args {
    /// Execute a single statement and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database to create and select at startup
    #[arg(short, long)]
    database: Option<String>,

    /// Describe statements without executing them
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("SPROUTDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if args.database.is_some() {
        config.default_database = args.database.clone();
    }

    let engine = Engine::with_config(config).context("failed to start engine")?;
    let mut ctx = engine.config().context();
    ctx.dry_run = args.dry_run;

    match &args.execute {
        Some(statement) => {
            let result = engine.execute_with(statement, &ctx);
            display_result(&result);
            if !result.success {
                std::process::exit(1);
            }
            Ok(())
        }
        None => interactive_mode(&engine, ctx),
    }
}

fn interactive_mode(engine: &Engine, mut ctx: ExecutionContext) -> Result<()> {
    println!("SproutDB v{}", VERSION);
    println!("Type '.help' for help, '.exit' to quit\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("sprout> ");
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }

        let input = buffer.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            if !dot_command(engine, &mut ctx, input) {
                break;
            }
            continue;
        }

        for statement in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            display_result(&engine.execute_with(statement, &ctx));
        }
    }

    Ok(())
}

/// Handle a dot-command; `false` ends the session
fn dot_command(engine: &Engine, ctx: &mut ExecutionContext, input: &str) -> bool {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument = parts.next();

    match (command, argument) {
        (".exit" | ".quit", _) => {
            println!("Goodbye!");
            return false;
        }
        (".help", _) => print_interactive_help(),
        (".databases", _) => {
            let current = engine.current_database();
            let databases = engine.list_databases();
            if databases.is_empty() {
                println!("No databases");
            }
            for name in databases {
                let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!(" {} {}", marker, name);
            }
        }
        (".tables", _) => {
            let tables = engine.list_tables();
            if tables.is_empty() {
                println!("No tables found");
            }
            for table in tables {
                println!("  {}", table);
            }
        }
        (".use", Some(name)) => match engine.use_database(name) {
            Ok(()) => println!("Using database '{}'", name),
            Err(e) => eprintln!("Error: {}", e),
        },
        (".dry-run", Some("on")) => {
            ctx.dry_run = true;
            println!("Dry run enabled");
        }
        (".dry-run", Some("off")) => {
            ctx.dry_run = false;
            println!("Dry run disabled");
        }
        _ => {
            eprintln!("Unknown command: {}", input);
            println!("Type '.help' for available commands");
        }
    }
    true
}

fn display_result(result: &ExecutionResult) {
    if !result.success {
        eprintln!("Error: {}", result.error.as_deref().unwrap_or("unknown error"));
        return;
    }

    match &result.data {
        Some(ResultData::Rows(rows)) => display_table(rows),
        Some(ResultData::Value(value)) => println!("{}", value_json(value)),
        None => println!("OK"),
    }

    let mut footer = format!("({:.3} ms", result.elapsed.as_secs_f64() * 1000.0);
    if result.rows_affected > 0 {
        footer.push_str(&format!(", {} row(s) affected", result.rows_affected));
    }
    if let Some(commit) = &result.commit_id {
        footer.push_str(&format!(", commit {}", commit));
    }
    footer.push(')');
    println!("{}", footer);
}

fn value_json(value: &Value) -> String {
    serde_json::to_string_pretty(&value.to_json()).unwrap_or_else(|_| value.to_string())
}

fn display_table(rows: &[Row]) {
    if rows.is_empty() {
        println!("No results");
        return;
    }

    let mut columns = vec!["id".to_string()];
    for row in rows {
        for key in row.fields.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    let value = if col == "id" { Some(&row.id) } else { row.get(col) };
                    format_cell(value)
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    print_border(&widths, '┌', '┬', '┐');
    print_cells(&columns, &widths);
    print_border(&widths, '├', '┼', '┤');
    for row in &cells {
        print_cells(row, &widths);
    }
    print_border(&widths, '└', '┴', '┘');

    println!("{} row(s) returned", rows.len());
}

fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::Float(f)) => format!("{:.2}", f),
        Some(Value::Double(d)) if d.fract() != 0.0 => format!("{:.2}", d),
        Some(value) => {
            let text = value.to_string();
            if text.chars().count() > 50 {
                format!("{}...", text.chars().take(47).collect::<String>())
            } else {
                text
            }
        }
    }
}

fn print_border(widths: &[usize], left: char, middle: char, right: char) {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    println!("{}{}{}", left, segments.join(&middle.to_string()), right);
}

fn print_cells(cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!(" {:width$} ", cell, width = width))
        .collect();
    println!("│{}│", padded.join("│"));
}

fn print_interactive_help() {
    println!(
        r#"
Statements:
  create database <name>            create table <name>
  add column <table>.<col> [type]   purge column <table>.<col>
  upsert <table> {{ ... }} [on <field>]
  get <table> [follow ...] [where ...] [group by ...] [having ...]
              [order by ...] [select ...] [page <n> of size <m>]
  count|sum|avg <table>[.<field>] [where ...]
  delete <table> [where ...]

Commands:
  .help               Show this help
  .databases          List databases (* marks the current one)
  .tables             List tables of the current database
  .use <database>     Switch the current database
  .dry-run on|off     Describe statements without executing them
  .exit               Quit
"#
    );
}
