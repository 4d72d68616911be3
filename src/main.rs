use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

use quire::{Book, Tagger};

#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(about = "Tag literary plain text with chapter, quote and suspension regions")]
#[command(version)]
struct Args {
    /// Plain-text book files to tag
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory for .regions.tsv output files (default: next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,

    /// Use memory-mapped I/O instead of async buffered
    #[arg(long)]
    use_mmap: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,
}

/// Per-book tagging statistics, serialized into the stats file.
#[derive(Serialize, Debug, Clone)]
struct BookStats {
    path: String,
    chars_processed: u64,
    regions_tagged: u64,
    processing_time_ms: u64,
    status: String,
    error: Option<String>,
}

#[derive(Serialize, Debug)]
struct RunStats {
    total_files: usize,
    succeeded: usize,
    failed: usize,
    books: Vec<BookStats>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging enables observability and debugging in production
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    if let Some(dir) = &args.out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let tagger = Arc::new(Tagger::with_default_rules()?);
    let concurrency = num_cpus::get().max(1);
    info!(concurrency, "Starting tagging run");

    let mut books = Vec::with_capacity(args.files.len());
    let mut tasks = stream::iter(args.files.clone())
        .map(|path| {
            let tagger = Arc::clone(&tagger);
            let out_dir = args.out_dir.clone();
            let use_mmap = args.use_mmap;
            async move { tag_one_file(&path, tagger, out_dir.as_deref(), use_mmap).await }
        })
        .buffer_unordered(concurrency);

    while let Some(stats) = tasks.next().await {
        if let Some(err) = &stats.error {
            if args.fail_fast {
                anyhow::bail!("Tagging failed for {}: {}", stats.path, err);
            }
        }
        books.push(stats);
    }

    let run = RunStats {
        total_files: books.len(),
        succeeded: books.iter().filter(|b| b.error.is_none()).count(),
        failed: books.iter().filter(|b| b.error.is_some()).count(),
        books,
    };
    let stats_json = serde_json::to_string_pretty(&run)?;
    tokio::fs::write(&args.stats_out, stats_json)
        .await
        .with_context(|| format!("Failed to write stats to {}", args.stats_out.display()))?;

    println!(
        "quire v{} - tagged {} files ({} succeeded, {} failed)",
        env!("CARGO_PKG_VERSION"),
        run.total_files,
        run.succeeded,
        run.failed
    );
    println!("Run stats written to {}", args.stats_out.display());

    if run.failed > 0 {
        anyhow::bail!("{} files failed to tag", run.failed);
    }
    Ok(())
}

async fn tag_one_file(
    path: &Path,
    tagger: Arc<Tagger>,
    out_dir: Option<&Path>,
    use_mmap: bool,
) -> BookStats {
    let started = Instant::now();
    match process_file(path, tagger, out_dir, use_mmap).await {
        Ok((chars, regions)) => {
            info!(path = %path.display(), chars, regions, "Book tagged");
            BookStats {
                path: path.display().to_string(),
                chars_processed: chars,
                regions_tagged: regions,
                processing_time_ms: started.elapsed().as_millis() as u64,
                status: "success".to_string(),
                error: None,
            }
        }
        Err(err) => {
            error!(path = %path.display(), error = %format!("{err:#}"), "Book failed");
            BookStats {
                path: path.display().to_string(),
                chars_processed: 0,
                regions_tagged: 0,
                processing_time_ms: started.elapsed().as_millis() as u64,
                status: "failed".to_string(),
                error: Some(format!("{err:#}")),
            }
        }
    }
}

async fn process_file(
    path: &Path,
    tagger: Arc<Tagger>,
    out_dir: Option<&Path>,
    use_mmap: bool,
) -> Result<(u64, u64)> {
    let content = if use_mmap {
        read_mmap(path)?
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("book")
        .to_string();

    // WHY: tagging is pure CPU work, keep it off the async I/O threads
    let (chars, flat) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut book = Book::new(name, content);
        tagger.tag(&mut book)?;
        let chars = book.content().chars().count() as u64;
        Ok((chars, book.flatten()))
    })
    .await??;

    let out_path = output_path(path, out_dir);
    let file = tokio::fs::File::create(&out_path)
        .await
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);
    for region in &flat {
        writer.write_all(region.to_tsv_line().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;

    Ok((chars, flat.len() as u64))
}

fn read_mmap(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    // SAFETY: mapping is read-only and copied to an owned String before the
    // file handle drops.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap {}", path.display()))?;
    let text = std::str::from_utf8(&mmap)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    Ok(text.to_string())
}

/// `pg100.txt` -> `pg100.regions.tsv`, either alongside the input or under
/// the requested output directory.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let out_name = input.with_extension("regions.tsv");
    match (out_dir, out_name.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => out_name,
    }
}
