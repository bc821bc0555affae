use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use vellum_chunk::DEFAULT_MAX_CHUNK_SIZE;
use vellum_embed::{ProviderBackend, ProviderConfig};
use vellum_retriever::embedding_cache::{CACHE_DIR, EmbeddingCache};
use vellum_retriever::engine::{AskRequest, RetrievalEngine, RetrievalEngineConfig};
use vellum_retriever::similarity::DEFAULT_TOP_K;
use vellum_retriever::storage::{DATABASE_FILE, Database, QueryFeedback};

/// A CLI for the vellum document question answering pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory holding the database file and embedding cache
    #[arg(short, long, default_value = ".vellum")]
    base_dir: PathBuf,

    /// Provider backend ("fixed" for offline deterministic providers, "http"
    /// for an OpenAI-compatible API; the http backend reads its key from
    /// VELLUM_API_KEY)
    #[arg(long, default_value = "fixed")]
    provider: ProviderBackend,

    /// API base URL for the http provider
    #[arg(long, default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// Embedding model for the http provider
    #[arg(long)]
    embed_model: Option<String>,

    /// Generation model for the http provider
    #[arg(long)]
    generate_model: Option<String>,

    /// Embedding vector width
    #[arg(long)]
    dimension: Option<usize>,

    /// Per-request timeout in seconds for the http provider
    #[arg(long)]
    timeout_seconds: Option<u64>,

    /// Maximum chunk size in bytes for document splitting
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// How many chunks to use as context per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the database and embedding cache
    Init,
    /// Ingest a file and process it into embeddings
    Add {
        /// Path of the file to ingest
        file: PathBuf,
    },
    /// Ask a question against an ingested document
    Ask {
        /// The question to ask
        prompt: String,
        /// Document id to answer from
        #[arg(short, long)]
        document: i64,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List non-deleted documents, newest first
    Documents {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List the most recent queries, newest first
    Queries {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Update feedback flags on a query
    Feedback {
        /// Query id
        id: i64,
        /// Set the liked flag to true or false
        #[arg(long)]
        liked: Option<bool>,
        /// Set the disliked flag to true or false
        #[arg(long)]
        disliked: Option<bool>,
    },
    /// Delete a document (soft by default, permanent with --hard)
    RmDoc {
        /// Document id
        id: i64,
        /// Remove the row permanently instead of flagging it
        #[arg(long)]
        hard: bool,
    },
    /// Delete a query (soft by default, permanent with --hard)
    RmQuery {
        /// Query id
        id: i64,
        /// Remove the row permanently instead of flagging it
        #[arg(long)]
        hard: bool,
    },
    /// Clear a store completely, resetting row ids
    Truncate {
        /// Which store to clear
        target: TruncateTarget,
    },
    /// List cached embedding artifacts
    Cache {
        /// Delete the artifact with this id instead of listing
        #[arg(long)]
        delete: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TruncateTarget {
    Documents,
    Queries,
    All,
}

impl std::str::FromStr for TruncateTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "documents" => Ok(TruncateTarget::Documents),
            "queries" => Ok(TruncateTarget::Queries),
            "all" => Ok(TruncateTarget::All),
            _ => Err(format!("Invalid target: {s} (expected documents, queries, or all)")),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Commands::Init => {
            let db = Database::open(&args.base_dir).await?;
            db.close().await;
            EmbeddingCache::open(args.base_dir.join(CACHE_DIR))?;

            println!("Initialized vellum data directory at {}", args.base_dir.display());
            println!(
                "Database location: {}",
                args.base_dir.join(DATABASE_FILE).display()
            );
            Ok(())
        }
        Commands::Add { file } => {
            let engine = open_engine(&args).await?;
            let document = engine.ingest_file(file).await?;

            println!(
                "Ingested {} as document {}",
                document.original_name, document.id
            );
            println!("Chunks embedded: {}", document.total_embeddings);
            Ok(())
        }
        Commands::Ask {
            prompt,
            document,
            format,
        } => {
            let engine = open_engine(&args).await?;
            let response = engine
                .ask(AskRequest {
                    prompt: prompt.clone(),
                    document_id: *document,
                })
                .await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                OutputFormat::Summary => {
                    println!("{}", response.answer);
                    println!();
                    println!(
                        "Query ID: {}{}",
                        response.query_id,
                        if response.cached {
                            " (replayed from history)"
                        } else {
                            ""
                        }
                    );
                }
            }
            Ok(())
        }
        Commands::Documents { format } => {
            let db = Database::open(&args.base_dir).await?;
            let documents = db.documents().list().await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&documents)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} documents:", documents.len());
                    for doc in documents {
                        println!(
                            "  ID: {} | {} | {} bytes | {} | {}",
                            doc.id,
                            doc.original_name,
                            doc.file_size,
                            doc.mime_type,
                            if doc.processed_at.is_some() {
                                "processed"
                            } else {
                                "pending"
                            }
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Queries { format } => {
            let db = Database::open(&args.base_dir).await?;
            let queries = db.queries().recent().await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&queries)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} queries:", queries.len());
                    for query in queries {
                        let feedback = match (query.liked, query.disliked) {
                            (true, true) => "liked+disliked",
                            (true, false) => "liked",
                            (false, true) => "disliked",
                            (false, false) => "-",
                        };
                        println!(
                            "  ID: {} | {} | {}",
                            query.id,
                            query.prompt.chars().take(60).collect::<String>(),
                            feedback
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Feedback { id, liked, disliked } => {
            if liked.is_none() && disliked.is_none() {
                anyhow::bail!("nothing to update: pass --liked and/or --disliked");
            }

            let db = Database::open(&args.base_dir).await?;
            let query = db
                .queries()
                .update_feedback(
                    *id,
                    QueryFeedback {
                        liked: *liked,
                        disliked: *disliked,
                    },
                )
                .await?;

            println!(
                "Query {} | liked: {} | disliked: {}",
                query.id, query.liked, query.disliked
            );
            Ok(())
        }
        Commands::RmDoc { id, hard } => {
            let db = Database::open(&args.base_dir).await?;
            let removed = if *hard {
                db.documents().hard_delete(*id).await?
            } else {
                db.documents().soft_delete(*id).await?
            };

            if removed {
                println!(
                    "{} document {}",
                    if *hard { "Deleted" } else { "Soft-deleted" },
                    id
                );
            } else {
                println!("Document {id} not found or already deleted");
            }
            Ok(())
        }
        Commands::RmQuery { id, hard } => {
            let db = Database::open(&args.base_dir).await?;
            let removed = if *hard {
                db.queries().hard_delete(*id).await?
            } else {
                db.queries().soft_delete(*id).await?
            };

            if removed {
                println!(
                    "{} query {}",
                    if *hard { "Deleted" } else { "Soft-deleted" },
                    id
                );
            } else {
                println!("Query {id} not found or already deleted");
            }
            Ok(())
        }
        Commands::Truncate { target } => {
            let db = Database::open(&args.base_dir).await?;
            match target {
                TruncateTarget::Documents => {
                    db.documents().truncate().await?;
                    println!("Cleared all documents");
                }
                TruncateTarget::Queries => {
                    db.queries().truncate().await?;
                    println!("Cleared all queries");
                }
                TruncateTarget::All => {
                    db.documents().truncate().await?;
                    db.queries().truncate().await?;
                    println!("Cleared all documents and queries");
                }
            }
            Ok(())
        }
        Commands::Cache { delete } => {
            let cache = EmbeddingCache::open(args.base_dir.join(CACHE_DIR))?;

            if let Some(id) = delete {
                if cache.delete(id).await? {
                    println!("Deleted artifact {id}");
                } else {
                    println!("No artifact with id {id}");
                }
            } else {
                let ids = cache.list().await?;
                println!("Found {} cached artifacts:", ids.len());
                for id in ids {
                    println!("  {id}");
                }
            }
            Ok(())
        }
    }
}

/// Build a retrieval engine from the global CLI flags.
async fn open_engine(args: &Args) -> Result<RetrievalEngine> {
    let (embedder, generator) = provider_config(args)?.build()?;
    let config = RetrievalEngineConfig::new(args.base_dir.clone())
        .with_max_chunk_size(args.max_chunk_size)
        .with_top_k(args.top_k);
    Ok(RetrievalEngine::new(config, embedder, generator).await?)
}

/// Translate provider flags (and the VELLUM_API_KEY environment variable)
/// into a provider configuration.
fn provider_config(args: &Args) -> Result<ProviderConfig> {
    let mut config = match args.provider {
        ProviderBackend::Fixed => ProviderConfig::fixed(),
        ProviderBackend::Http => {
            let api_key = std::env::var("VELLUM_API_KEY").map_err(|_| {
                anyhow::anyhow!("VELLUM_API_KEY must be set when using the http provider")
            })?;
            ProviderConfig::http(&args.api_base, api_key)
        }
    };

    if let Some(model) = &args.embed_model {
        config = config.with_embed_model(model.clone());
    }
    if let Some(model) = &args.generate_model {
        config = config.with_generate_model(model.clone());
    }
    if let Some(dimension) = args.dimension {
        config = config.with_embedding_dimension(dimension);
    }
    if let Some(seconds) = args.timeout_seconds {
        config = config.with_timeout_seconds(seconds);
    }
    Ok(config)
}
