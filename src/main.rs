use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use ragcore::config::{RagConfig, State};
use ragcore::{
    logging, Chunker, ConcatGenerator, Document, HashingEmbedder, KeywordRetriever,
    MetadataFilter, RagPipeline, Retriever, SearchMethod, VectorRetriever,
};

#[derive(Parser)]
#[command(name = "ragcore")]
#[command(version = "0.1")]
#[command(about = "Chunk, embed and search plain-text documents", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that take precedence over `ragcore_config.*` and `RAGCORE_*`.
#[derive(Args)]
struct Overrides {
    #[arg(long, global = true)]
    dimensions: Option<usize>,
    #[arg(long, global = true)]
    chunk_size: Option<usize>,
    #[arg(long, global = true)]
    overlap: Option<usize>,
    #[arg(long, global = true)]
    top_k: Option<usize>,
    #[arg(long, global = true, value_parser = parse_search_method)]
    search_method: Option<SearchMethod>,
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the chunks of a file as JSON lines
    Chunk { file: PathBuf },
    /// Rank chunks of the given files by embedding distance to the query
    Search {
        query: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Metadata constraint, repeatable: --filter file_name=notes.txt
        #[arg(long = "filter", value_parser = parse_filter_pair)]
        filters: Vec<(String, String)>,
    },
    /// Whole files containing any word of the query
    Keyword {
        query: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long = "filter", value_parser = parse_filter_pair)]
        filters: Vec<(String, String)>,
    },
    /// Answer a question from the chunks of the given files
    Ask {
        query: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long = "filter", value_parser = parse_filter_pair)]
        filters: Vec<(String, String)>,
        /// Match whole files by keyword instead of ranking chunks by embedding
        #[arg(long)]
        keyword: bool,
    },
    /// Print the effective configuration
    Config,
}

fn parse_search_method(s: &str) -> std::result::Result<SearchMethod, String> {
    s.parse().map_err(|e: ragcore::RagError| e.to_string())
}

fn parse_filter_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn build_filter(pairs: Vec<(String, String)>) -> MetadataFilter {
    pairs
        .into_iter()
        .fold(MetadataFilter::new(), |filter, (k, v)| filter.require(k, v))
}

impl Overrides {
    fn to_config(&self) -> RagConfig {
        RagConfig {
            dimensions: self.dimensions,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            top_k: self.top_k,
            search_method: self.search_method.map(|method| method.to_string()),
            verbose: self.verbose.then_some(true),
            ..RagConfig::default()
        }
    }
}

fn load_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(text)
        .with_metadata("file_path", path.display().to_string())
        .with_metadata("file_name", file_name))
}

fn chunk_command(state: &State, file: &Path) -> Result<()> {
    let chunker = Chunker::new(state.chunk_size, state.overlap)?;
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    for chunk in chunker.chunks(&text) {
        println!("{}", serde_json::to_string(&chunk)?);
    }
    Ok(())
}

fn search_command(
    state: &State,
    query: &str,
    files: &[PathBuf],
    filter: &MetadataFilter,
) -> Result<()> {
    let retriever = vector_retriever(state, files)?;
    let results = retriever.retrieve_filtered(query, state.top_k, filter)?;

    let output = serde_json::json!({
        "query": query,
        "search_method": state.search_method.to_string(),
        "database_record_count": retriever.index().len(),
        "results": results.iter().map(|r| {
            serde_json::json!({
                "position": r.position,
                "distance": r.distance,
                "text": r.document.text,
                "metadata": r.document.metadata,
            })
        }).collect::<Vec<_>>(),
        "actual_results_count": results.len(),
        "requested_results_count": state.top_k
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn vector_retriever(
    state: &State,
    files: &[PathBuf],
) -> Result<VectorRetriever<HashingEmbedder>> {
    let embedder = HashingEmbedder::new(state.dimensions)?;
    let mut retriever = VectorRetriever::from_state(state, embedder)?;
    for file in files {
        let document = load_document(file)?;
        retriever
            .ingest(&document)
            .with_context(|| format!("Failed to index '{}'", file.display()))?;
    }
    Ok(retriever)
}

fn ask_command(
    state: &State,
    query: &str,
    files: &[PathBuf],
    filter: &MetadataFilter,
    keyword: bool,
) -> Result<()> {
    let generator = ConcatGenerator::new().with_prefix("Based on the retrieved documents: ");
    let answer = if keyword {
        let documents = files
            .iter()
            .map(|file| load_document(file))
            .collect::<Result<Vec<_>>>()?;
        RagPipeline::new(KeywordRetriever::new(&documents), generator, state.top_k)
            .run_filtered(query, filter)?
    } else {
        RagPipeline::new(vector_retriever(state, files)?, generator, state.top_k)
            .run_filtered(query, filter)?
    };

    let output = serde_json::json!({
        "query": query,
        "answer": answer.text,
        "sources": answer.sources.iter().map(|s| {
            serde_json::json!({
                "position": s.position,
                "distance": s.distance,
                "metadata": s.document.metadata,
            })
        }).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn keyword_command(
    state: &State,
    query: &str,
    files: &[PathBuf],
    filter: &MetadataFilter,
) -> Result<()> {
    let documents = files
        .iter()
        .map(|file| load_document(file))
        .collect::<Result<Vec<_>>>()?;
    let results = KeywordRetriever::new(&documents).retrieve_filtered(query, state.top_k, filter)?;

    let output = serde_json::json!({
        "query": query,
        "document_count": documents.len(),
        "results": results.iter().map(|r| {
            serde_json::json!({
                "position": r.position,
                "metadata": r.document.metadata,
            })
        }).collect::<Vec<_>>(),
        "actual_results_count": results.len(),
        "requested_results_count": state.top_k
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let state = State::with_overrides(args.overrides.to_config())?;
    logging::init(state.verbose);
    tracing::debug!(?state, "loaded configuration");

    match args.command {
        Commands::Chunk { file } => chunk_command(&state, &file)?,
        Commands::Search {
            query,
            files,
            filters,
        } => search_command(&state, &query, &files, &build_filter(filters))?,
        Commands::Keyword {
            query,
            files,
            filters,
        } => keyword_command(&state, &query, &files, &build_filter(filters))?,
        Commands::Ask {
            query,
            files,
            filters,
            keyword,
        } => ask_command(&state, &query, &files, &build_filter(filters), keyword)?,
        Commands::Config => state.print_config(),
    }
    Ok(())
}
