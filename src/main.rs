//! CLI entry point for globalnav.
//!
//! Runs the language server on stdio, or answers a single navigation query
//! from the command line using the same query adapter.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use globalnav::io::{ExitCode, JsonResponse, OutputFormat};
use globalnav::{
    ConfigError, ConfigStore, Global, LocationResult, Position, Settings, SymbolResult,
    TextDocument, logging, lsp,
};
use serde::Serialize;
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// GNU Global navigation for editors
#[derive(Parser)]
#[command(
    name = "globalnav",
    version = env!("CARGO_PKG_VERSION"),
    about = "Editor navigation backed by GNU Global",
    long_about = "Serve go-to-definition, references, completion and document symbols from GNU Global tag files.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to a user settings.toml file (replaces the one in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Run the language server on stdio
    #[command(alias = "lsp", about = "Start the language server on stdio")]
    Serve,

    /// Run a single query against the tag files
    #[command(
        about = "Run one navigation query",
        after_help = "Examples:\n  globalnav query definition src/nfs.c 42 10\n  globalnav query references src/nfs.c 42 10 --json\n  globalnav query completion src/nfs.c 42 7\n  globalnav query symbols include/nfs.h --json | jq '.data[].name'\n\nLines and columns are one-based."
    )]
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },

    /// Show effective settings
    #[command(about = "Display the effective settings for a file or directory")]
    Config {
        /// File or directory whose workspace settings apply (defaults to the current directory)
        file: Option<PathBuf>,

        /// Write a .globalnav/settings.toml template into the current directory
        #[arg(long)]
        init: bool,

        /// Overwrite an existing template
        #[arg(short, long, requires = "init")]
        force: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the GNU Global version in use
    #[command(about = "Print the version of the wrapped global executable")]
    Version,
}

/// One-based cursor position in a file
#[derive(Args)]
struct CursorArgs {
    /// Source file
    file: PathBuf,

    /// Line number (one-based)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    line: u32,

    /// Column (one-based, UTF-16 code units)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    column: u32,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl CursorArgs {
    fn position(&self) -> Position {
        Position::new(self.line - 1, self.column - 1)
    }
}

/// Navigation queries
#[derive(Subcommand)]
enum QueryCommand {
    /// Definitions of the symbol under the cursor
    Definition(CursorArgs),

    /// References to the symbol under the cursor
    References(CursorArgs),

    /// Completions for the word under the cursor
    Completion(CursorArgs),

    /// Symbols defined in a file
    Symbols {
        /// Source file
        file: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => ConfigStore::with_user_config(Some(path.clone())),
        None => ConfigStore::new(),
    };

    let code = match cli.command {
        Commands::Serve => serve(store),
        Commands::Query { query } => {
            logging::init("warn");
            run_query(&store, query)
        }
        Commands::Config {
            file,
            init,
            force,
            json,
        } => {
            logging::init("warn");
            show_config(&store, file, init, force, OutputFormat::from_json_flag(json))
        }
        Commands::Version => {
            logging::init("warn");
            show_version(&store)
        }
    };

    code.into()
}

fn serve(store: ConfigStore) -> ExitCode {
    let level: String = store.get("log_level", current_dir().as_deref(), "info".to_string());
    let log_handle = logging::init(&level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting globalnav language server");
    match lsp::serve(store, Some(log_handle)) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Language server stopped");
            ExitCode::GeneralError
        }
    }
}

fn run_query(store: &ConfigStore, query: QueryCommand) -> ExitCode {
    let (file, json) = match &query {
        QueryCommand::Definition(args)
        | QueryCommand::References(args)
        | QueryCommand::Completion(args) => (&args.file, args.json),
        QueryCommand::Symbols { file, json } => (file, *json),
    };
    let format = OutputFormat::from_json_flag(json);

    let document = match TextDocument::open(file) {
        Ok(document) => document,
        Err(e) => return report_error(&e, format),
    };
    let executable: String = store.get(
        "global.executable",
        Some(document.path()),
        "global".to_string(),
    );
    let global = Global::new(executable);

    match query {
        QueryCommand::Definition(args) => {
            let symbol = document.word_at(args.position()).unwrap_or_default();
            match global.provide_definition(&document, args.position()) {
                Ok(results) => print_locations(&results, "definitions", &symbol, format),
                Err(e) => report_error(&e, format),
            }
        }
        QueryCommand::References(args) => {
            let symbol = document.word_at(args.position()).unwrap_or_default();
            match global.provide_references(&document, args.position()) {
                Ok(results) => print_locations(&results, "references", &symbol, format),
                Err(e) => report_error(&e, format),
            }
        }
        QueryCommand::Completion(args) => {
            let prefix = document.word_at(args.position()).unwrap_or_default();
            match global.provide_completion_items(&document, args.position()) {
                Ok(labels) => {
                    if format.is_json() {
                        print_json(&labels, "completions", &prefix)
                    } else {
                        for label in &labels {
                            println!("{label}");
                        }
                        ExitCode::from_results(&labels)
                    }
                }
                Err(e) => report_error(&e, format),
            }
        }
        QueryCommand::Symbols { .. } => match global.provide_document_symbols(&document) {
            Ok(symbols) => print_symbols(&symbols, &document.path().display().to_string(), format),
            Err(e) => report_error(&e, format),
        },
    }
}

fn print_locations(
    results: &[LocationResult],
    query: &str,
    symbol: &str,
    format: OutputFormat,
) -> ExitCode {
    if format.is_json() {
        return print_json(results, query, symbol);
    }
    for result in results {
        // Columns print one-based; 0 marks a symbol missing from its line
        println!(
            "{}:{}:{}",
            result.path.display(),
            result.range.start_line + 1,
            result.range.start_column + 1
        );
    }
    ExitCode::from_results(results)
}

fn print_symbols(symbols: &[SymbolResult], file: &str, format: OutputFormat) -> ExitCode {
    if format.is_json() {
        return print_json(symbols, "symbols", file);
    }
    for symbol in symbols {
        println!(
            "{:<8} {} {}:{}",
            symbol.kind,
            symbol.name,
            symbol.location.path.display(),
            symbol.location.range.start_line + 1
        );
    }
    ExitCode::from_results(symbols)
}

fn print_json<T: Serialize>(results: &[T], query: &str, subject: &str) -> ExitCode {
    let code = ExitCode::from_results(results);
    let rendered = if code.is_success() {
        serde_json::to_string_pretty(&JsonResponse::success(results))
    } else {
        serde_json::to_string_pretty(&JsonResponse::not_found(query, subject))
    };
    match rendered {
        Ok(json) => {
            println!("{json}");
            code
        }
        Err(e) => {
            eprintln!("Error: failed to serialize output: {e}");
            ExitCode::GeneralError
        }
    }
}

fn report_error(error: &globalnav::GlobalError, format: OutputFormat) -> ExitCode {
    if format.is_json() {
        if let Ok(json) = serde_json::to_string_pretty(&JsonResponse::from_error(error)) {
            println!("{json}");
        }
    } else {
        eprintln!("Error: {error}");
        for suggestion in error.recovery_suggestions() {
            eprintln!("  - {suggestion}");
        }
    }
    ExitCode::from_error(error)
}

fn show_config(
    store: &ConfigStore,
    file: Option<PathBuf>,
    init: bool,
    force: bool,
    format: OutputFormat,
) -> ExitCode {
    if init {
        let dir = current_dir().unwrap_or_else(|| PathBuf::from("."));
        return match Settings::init_config_file(&dir, force) {
            Ok(path) if format.is_json() => print_json_value(&JsonResponse::success(path)),
            Ok(path) => {
                println!("Created configuration file at: {}", path.display());
                println!("Edit this file to customize your settings.");
                ExitCode::Success
            }
            Err(e) => report_config_error(&e, format),
        };
    }

    let resource = file
        .as_deref()
        .and_then(|path| std::path::absolute(path).ok())
        .or_else(current_dir);
    let settings = match store.load(resource.as_deref()) {
        Ok(settings) => settings,
        Err(e) => return report_config_error(&e, format),
    };
    if format.is_json() {
        return print_json_value(&JsonResponse::success(settings));
    }

    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    if let Some(resource) = &resource {
        println!("# resource: {}", resource.display());
    }
    match toml::to_string_pretty(&settings) {
        Ok(toml_str) => {
            println!("{toml_str}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error displaying config: {e}");
            ExitCode::GeneralError
        }
    }
}

fn report_config_error(error: &ConfigError, format: OutputFormat) -> ExitCode {
    if format.is_json() {
        if let Ok(json) = serde_json::to_string_pretty(&JsonResponse::from_config_error(error)) {
            println!("{json}");
        }
    } else {
        eprintln!("Configuration error: {error}");
    }
    ExitCode::from_config_error(error)
}

fn print_json_value<T: Serialize>(response: &JsonResponse<T>) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: failed to serialize output: {e}");
            ExitCode::GeneralError
        }
    }
}

fn show_version(store: &ConfigStore) -> ExitCode {
    let executable: String = store.get(
        "global.executable",
        current_dir().as_deref(),
        "global".to_string(),
    );
    println!("globalnav {}", env!("CARGO_PKG_VERSION"));
    match Global::new(executable).version() {
        Ok(version) => {
            println!("{version}");
            ExitCode::Success
        }
        Err(e) => report_error(&e, OutputFormat::Text),
    }
}

fn current_dir() -> Option<PathBuf> {
    std::env::current_dir().ok()
}
