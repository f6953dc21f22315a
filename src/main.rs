use clap::{Parser, Subcommand};
use f1_rag::Result;
use f1_rag::commands::{
    SeedOptions, ask, configure, load_config, prune, search, seed, serve_http, show_status,
};
use f1_rag::database::MetadataFilter;
use f1_rag::documents::DocumentType;
use f1_rag::documents::rss::DEFAULT_MAX_ITEMS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "f1-rag")]
#[command(about = "Formula 1 question answering over a local vector knowledge base")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize the configuration
    Config {
        /// Print the effective configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write a config.toml with default values
        #[arg(long)]
        init: bool,
    },
    /// Embed and store documents in the knowledge base
    Seed {
        /// Remove every stored document first
        #[arg(long)]
        clear: bool,
        /// Skip the curated historical facts
        #[arg(long)]
        no_facts: bool,
        /// RSS feed file to ingest, may be repeated
        #[arg(long = "rss", value_name = "FILE")]
        rss: Vec<PathBuf>,
        /// JSONL document file to ingest, may be repeated
        #[arg(long = "documents", value_name = "FILE")]
        documents: Vec<PathBuf>,
        /// News items kept per feed
        #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
        max_items: usize,
    },
    /// Delete stored documents matching every given filter
    Prune {
        #[arg(long)]
        source: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,
        #[arg(long)]
        season: Option<u32>,
    },
    /// Retrieve documents without generating an answer
    Search {
        query: String,
        /// Keep only documents mentioning this driver, team or circuit
        #[arg(long, conflicts_with = "doc_type")]
        entity: Option<String>,
        /// Restrict results to one document type
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer a question using retrieved context
    Ask { question: String },
    /// Start the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show configuration, Ollama reachability and document counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Config { show, init } => {
            configure(&config, show, init)?;
        }
        Commands::Seed {
            clear,
            no_facts,
            rss,
            documents,
            max_items,
        } => {
            let options = SeedOptions {
                clear,
                include_facts: !no_facts,
                rss_files: rss,
                document_files: documents,
                max_feed_items: max_items,
            };
            seed(&config, &options).await?;
        }
        Commands::Prune {
            source,
            doc_type,
            season,
        } => {
            let filter = MetadataFilter {
                doc_type,
                source,
                season,
            };
            prune(&config, &filter).await?;
        }
        Commands::Search {
            query,
            entity,
            doc_type,
            limit,
        } => {
            search(&config, &query, entity.as_deref(), doc_type, limit).await?;
        }
        Commands::Ask { question } => {
            ask(&config, &question).await?;
        }
        Commands::Serve { host, port } => {
            serve_http(&config, host, port).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn seed_with_sources() {
        let cli = Cli::try_parse_from([
            "f1-rag",
            "seed",
            "--clear",
            "--rss",
            "bbc.xml",
            "--rss",
            "motorsport.xml",
            "--documents",
            "results.jsonl",
        ])
        .expect("should parse seed");

        let Commands::Seed {
            clear,
            no_facts,
            rss,
            documents,
            max_items,
        } = cli.command
        else {
            panic!("expected seed command");
        };
        assert!(clear);
        assert!(!no_facts);
        assert_eq!(rss, vec![PathBuf::from("bbc.xml"), PathBuf::from("motorsport.xml")]);
        assert_eq!(documents, vec![PathBuf::from("results.jsonl")]);
        assert_eq!(max_items, DEFAULT_MAX_ITEMS);
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["f1-rag", "status", "--config-dir", "/tmp/f1"])
            .expect("should parse status");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/f1")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn prune_parses_document_type() {
        let cli = Cli::try_parse_from([
            "f1-rag",
            "prune",
            "--type",
            "standings",
            "--season",
            "2024",
        ])
        .expect("should parse prune");
        let Commands::Prune {
            source,
            doc_type,
            season,
        } = cli.command
        else {
            panic!("expected prune command");
        };
        assert_eq!(source, None);
        assert_eq!(doc_type, Some(DocumentType::Standings));
        assert_eq!(season, Some(2024));
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        let result = Cli::try_parse_from(["f1-rag", "prune", "--type", "gossip"]);
        assert!(result.is_err());
    }

    #[test]
    fn search_with_entity() {
        let cli = Cli::try_parse_from([
            "f1-rag",
            "search",
            "pole laps",
            "--entity",
            "Leclerc",
            "--limit",
            "3",
        ])
        .expect("should parse search");
        let Commands::Search {
            query,
            entity,
            doc_type,
            limit,
        } = cli.command
        else {
            panic!("expected search command");
        };
        assert_eq!(query, "pole laps");
        assert_eq!(entity.as_deref(), Some("Leclerc"));
        assert_eq!(doc_type, None);
        assert_eq!(limit, Some(3));
    }

    #[test]
    fn entity_and_type_conflict() {
        let result = Cli::try_parse_from([
            "f1-rag", "search", "q", "--entity", "Leclerc", "--type", "news",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn config_show_and_init_conflict() {
        let result = Cli::try_parse_from(["f1-rag", "config", "--show", "--init"]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn serve_overrides() {
        let cli = Cli::try_parse_from(["f1-rag", "serve", "--host", "0.0.0.0", "--port", "8080"])
            .expect("should parse serve");
        let Commands::Serve { host, port } = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(host.as_deref(), Some("0.0.0.0"));
        assert_eq!(port, Some(8080));
    }

    #[test]
    fn invalid_command() {
        let result = Cli::try_parse_from(["f1-rag", "crawl"]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let result = Cli::try_parse_from(["f1-rag", "--help"]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
