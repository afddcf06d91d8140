//! OpenAPI Graph Extractor CLI
//!
//! Command-line interface for crawling OpenAPI v2 services into RDF and an
//! inferred GraphQL schema.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use openapi_graph_extractor_common::Diagnostics;
use openapi_graph_extractor_engine::{
    extract, resolve_root, DeclarativeConfig, Fetch, FetchRequest, HttpFetcher, NTriplesSink,
    ServiceConfig,
};
use openapi_graph_extractor_parser::OpenApiDocument;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "openapi-graph-extractor")]
#[command(version, about = "Crawl OpenAPI v2 services into RDF and a GraphQL schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction using a service configuration and an OpenAPI document
    #[command(after_help = "EXAMPLES:\n  \
        # Extract to stdout using a local document\n  \
        openapi-graph-extractor extract --config tracker.yaml swagger.json\n\n  \
        # Fetch the document remotely and write triples to a file\n  \
        openapi-graph-extractor extract \\\n    \
        --config tracker.yaml \\\n    \
        --triples build/tracker.nt \\\n    \
        https://tracker.example.com/rest/v1/swagger.json")]
    Extract {
        /// Service configuration (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// OpenAPI document as a local file or remote URL, JSON or YAML
        document: Option<String>,

        /// Directory for schema.graphql and context.jsonld
        #[arg(short, long, default_value = "./build")]
        output: PathBuf,

        /// Write N-Triples to this file instead of stdout
        #[arg(short, long)]
        triples: Option<PathBuf>,
    },

    /// Load a document and report which paths would be extracted, without fetching
    #[command(after_help = "EXAMPLES:\n  \
        openapi-graph-extractor inspect swagger.json\n  \
        openapi-graph-extractor inspect --config tracker.yaml")]
    Inspect {
        /// OpenAPI document as a local file or remote URL, JSON or YAML
        document: Option<String>,

        /// Service configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Extract {
            config,
            document,
            output,
            triples,
        } => {
            extract_command(
                config.as_path(),
                document.as_deref(),
                output.as_path(),
                triples.as_deref(),
                cli.verbose,
            )
            .await?;
        }
        Commands::Inspect { document, config } => {
            inspect_command(document.as_deref(), config.as_deref(), cli.verbose).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,openapi_graph_extractor_engine=debug,openapi_graph_extractor_parser=debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn extract_command(
    config_path: &Path,
    document: Option<&str>,
    output: &Path,
    triples: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    // stdout may carry the triples, so progress goes to stderr
    eprintln!(
        "{} Loading configuration: {}",
        "→".cyan(),
        config_path.display()
    );
    let declarative = DeclarativeConfig::from_file(config_path)
        .context("Failed to load the configuration file")?;

    let source = declarative
        .open_api_document
        .clone()
        .or_else(|| document.map(String::from))
        .context("No document was specified in config, must provide one in CLI arg")?;

    eprintln!("{} Loading API document: {}", "→".cyan(), source);
    let mut document = load_document(&source).await?;

    let config = declarative
        .into_service_config()
        .context("Invalid service configuration")?;
    let root = resolve_root(&mut document, &config)?;

    if verbose {
        eprintln!("  Root: {}", root);
        eprintln!("  Paths: {}", document.paths().len());
        eprintln!("  Output: {}", output.display());
    }

    let writer: Box<dyn Write + Send> = match triples {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let sink = NTriplesSink::new(writer, format!("{}#", root));

    eprintln!("{} Extracting from {}", "→".cyan(), root.yellow());
    let extraction = extract(document, config, HttpFetcher::new(), sink)
        .await
        .context("Extraction failed")?;

    let written = extraction
        .artifacts
        .write_to_directory(output)
        .context("Failed to write schema artifacts")?;

    eprintln!("\n{}", "✓ Extraction complete!".green().bold());
    eprintln!("  Resources: {}", extraction.obtained.len());
    eprintln!("  Requests: {}", extraction.fetch_count);
    eprintln!("  Triples: {}", extraction.sink.written());
    report_warnings(&extraction.diagnostics, verbose);

    eprintln!("\n{}", "Generated files:".bold());
    for path in &written {
        eprintln!("  📄 {}", path.display());
    }
    if let Some(path) = triples {
        eprintln!("  📄 {}", path.display());
    }

    Ok(())
}

async fn inspect_command(
    document: Option<&str>,
    config_path: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let declarative = match config_path {
        Some(path) => {
            println!("{} Loading configuration: {}", "→".cyan(), path.display());
            Some(DeclarativeConfig::from_file(path).context("Failed to load the configuration file")?)
        }
        None => None,
    };

    let source = declarative
        .as_ref()
        .and_then(|d| d.open_api_document.clone())
        .or_else(|| document.map(String::from))
        .context("No document was specified in config, must provide one in CLI arg")?;

    println!("{} Loading API document: {}", "→".cyan(), source);
    let mut document = load_document(&source).await?;

    // unresolved variables stay as written; nothing is sent anywhere
    let config = match declarative {
        Some(declarative) => declarative
            .into_service_config_with(|name| {
                std::env::var(name)
                    .ok()
                    .or_else(|| Some(format!("${{{}}}", name)))
            })
            .context("Invalid service configuration")?,
        None => ServiceConfig::new(),
    };
    let root = resolve_root(&mut document, &config)?;

    println!("\n{}", "✓ Document is valid!".green().bold());
    println!("  Swagger: {}", document.swagger_version().unwrap_or("-").yellow());
    println!("  Root: {}", root.yellow());
    println!("  Paths: {}", document.paths().len());

    println!("\n{}", "GET paths:".bold());
    for (template, item) in document.paths().iter() {
        let Some(operation) = item.get.as_ref() else {
            if verbose {
                println!("  {} {}", template.dimmed(), "(no GET)".dimmed());
            }
            continue;
        };

        let mut notes = Vec::new();
        if config.paths_matching(template).any(|c| c.skip()) {
            notes.push("skipped".red().to_string());
        }
        if document.response_schema(operation, "200").is_none() {
            notes.push("no response schema".red().to_string());
        }
        if config
            .pagination
            .as_deref()
            .is_some_and(|p| p.requires_pagination(operation))
        {
            notes.push("paginated".green().to_string());
        }

        let required: Vec<&str> = operation
            .parameters()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        if !required.is_empty() {
            notes.push(format!("requires {}", required.join(", ")).yellow().to_string());
        }

        if notes.is_empty() {
            println!("  • {}", template.cyan());
        } else {
            println!("  • {} ({})", template.cyan(), notes.join(", "));
        }
    }

    Ok(())
}

/// Read a document from a local path or an `http(s)://` URL
async fn load_document(source: &str) -> Result<OpenApiDocument> {
    tracing::debug!(source, remote = is_remote(source), "Loading API document");

    if !is_remote(source) {
        return OpenApiDocument::from_file(source)
            .with_context(|| format!("Failed to load API document {}", source));
    }

    let request =
        FetchRequest::default().with_header("accept", "application/json,application/yaml");
    let response = HttpFetcher::new()
        .fetch(source, &request)
        .await
        .with_context(|| format!("Failed to fetch remote API document from <{}>", source))?;

    if !response.is_success() {
        bail!(
            "Remote server returned non-200 response to document fetch request <{}>: {} \n{}",
            source,
            response.status,
            response.text()
        );
    }

    OpenApiDocument::from_str(response.text())
        .with_context(|| format!("Failed to parse API document from <{}>", source))
}

fn is_remote(source: &str) -> bool {
    source
        .split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_lowercase()))
}

fn report_warnings(diagnostics: &Diagnostics, verbose: bool) {
    let warnings = diagnostics.warnings();
    if warnings.is_empty() {
        return;
    }

    eprintln!(
        "  Warnings: {} ({} repeats suppressed)",
        warnings.len().to_string().yellow(),
        diagnostics.suppressed()
    );
    if verbose {
        for warning in warnings {
            eprintln!("    {} {}", "!".yellow(), warning);
        }
    }
}
