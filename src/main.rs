use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docrag::config::{self, Number, Settings};
use docrag::{chunk_document, EntryMetadata, Fragment, VectorEntry, VectorStore};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docrag")]
#[command(version = "0.1")]
#[command(about = "Chunk documents and rank their fragments by embedding similarity", long_about = None)]
struct Cli {
    /// Log at debug level (same as DOCRAG_VERBOSE=true)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a document from stdin and print one JSON fragment per line
    Chunk(ChunkArgs),
    /// Rank indexed fragments against a JSON query read from stdin
    Search(SearchArgs),
    /// Print statistics about an index file
    Stats(IndexArgs),
    /// Print the resolved configuration
    Config,
}

#[derive(Args)]
struct ChunkArgs {
    #[arg(long)]
    file_name: String,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
    /// Fixed-width windows instead of sentence-preserving chunks
    #[arg(long)]
    fixed: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// JSON-lines file of `{"fragment": ..., "embedding": [...]}` records
    #[arg(long)]
    index: PathBuf,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    index: IndexArgs,
    #[arg(long)]
    file_name: Option<String>,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    threshold: Option<Number>,
}

#[derive(Deserialize)]
struct IndexRecord {
    fragment: Fragment,
    embedding: Vec<Number>,
    #[serde(default)]
    metadata: Option<EntryMetadata>,
}

#[derive(Deserialize)]
struct QueryInput {
    embedding: Vec<Number>,
}

fn chunk_command(args: &ChunkArgs, settings: &Settings) -> Result<()> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read document from stdin")?;

    let mut options = settings.chunking_options();
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = args.chunk_overlap {
        options.chunk_overlap = chunk_overlap;
    }
    if args.fixed {
        options.preserve_sentences = false;
    }

    let fragments = chunk_document(&content, &args.file_name, &options)?;
    for fragment in &fragments {
        println!("{}", serde_json::to_string(fragment)?);
    }
    debug!("Emitted {} fragments for '{}'", fragments.len(), args.file_name);
    Ok(())
}

fn load_index(path: &Path) -> Result<VectorStore> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open index file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let store = VectorStore::new();
    let mut seen_ids = HashSet::new();

    reader
        .lines()
        .enumerate()
        .try_for_each(|(line_number, line_result)| -> Result<()> {
            let line = line_result?;
            if line.trim().is_empty() {
                return Ok(());
            }
            let record: IndexRecord = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse index record on line {}", line_number + 1)
            })?;
            let id = record.fragment.id.clone();
            if !seen_ids.insert(id.clone()) {
                warn!("Duplicate id '{}' found. Replacing earlier entry.", id);
            }
            let metadata = record
                .metadata
                .unwrap_or_else(|| EntryMetadata::new(record.fragment.file_name.clone()));
            store.insert_entry(VectorEntry {
                id,
                embedding: record.embedding,
                fragment: record.fragment,
                metadata,
            });
            Ok(())
        })?;

    debug!("Loaded {} entries from '{}'", store.len(), path.display());
    Ok(store)
}

fn search_command(args: &SearchArgs, settings: &Settings) -> Result<()> {
    let store = load_index(&args.index.index)?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let query: QueryInput = serde_json::from_str(&input).context("Failed to parse JSON query")?;

    let top_k = args.top_k.unwrap_or(settings.top_k);
    let threshold = args.threshold.unwrap_or(settings.similarity_threshold);
    let results = store.similarity_search(&query.embedding, top_k, threshold, args.file_name.as_deref())?;

    let output = serde_json::json!({
        "query": {
            "vector": &query.embedding[..5.min(query.embedding.len())],
            "dimensions": query.embedding.len(),
        },
        "store_record_count": store.len(),
        "file_name_filter": args.file_name,
        "threshold": threshold,
        "results": results.iter().map(|result| {
            serde_json::json!({
                "id": result.entry.id,
                "file_name": result.entry.file_name(),
                "chunk_index": result.entry.chunk_index(),
                "similarity": result.similarity,
                "content": result.entry.fragment.content,
                "metadata": result.entry.metadata,
            })
        }).collect::<Vec<_>>(),
        "actual_results_count": results.len(),
        "requested_results_count": top_k
    });

    println!("{}", serde_json::to_string(&output)?);

    Ok(())
}

fn stats_command(args: &IndexArgs) -> Result<()> {
    let store = load_index(&args.index)?;
    let output = serde_json::json!({
        "stats": store.stats(),
        "indexing_status": store.indexing_status(),
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn config_command(settings: &Settings) -> Result<()> {
    settings.print_config();
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose || config::verbose_requested() {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);
    let settings = Settings::new()?;

    match &args.command {
        Commands::Chunk(chunk_args) => chunk_command(chunk_args, &settings)?,
        Commands::Search(search_args) => search_command(search_args, &settings)?,
        Commands::Stats(index_args) => stats_command(index_args)?,
        Commands::Config => config_command(&settings)?,
    }
    Ok(())
}
