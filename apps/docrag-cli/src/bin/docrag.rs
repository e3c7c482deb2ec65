use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docrag_core::config::Config;
use docrag_core::types::{Document, DocumentKind};
use docrag_pipeline::{IngestStatus, Rag};

const USAGE: &str = "Usage: docrag <command> [args...]

Commands:
  ingest <path>...            index files or directories (.txt, .md, .pdf)
  ask <question> [--top-k N]  answer a question from indexed documents
  list                        list indexed documents
  show <id>                   print the chunks of one document
  delete <id>                 remove a document";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// A file to ingest and the document id it gets.
#[derive(Debug, PartialEq)]
struct Source {
    id: String,
    path: PathBuf,
    kind: DocumentKind,
}

/// Expand files and directories into supported sources. Files keep their name as id;
/// files found under a directory use their path relative to it.
fn collect_sources(paths: &[PathBuf]) -> Vec<Source> {
    let mut out = Vec::new();
    for root in paths {
        if root.is_file() {
            let name = root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            match DocumentKind::from_filename(&name) {
                Ok(kind) => out.push(Source { id: name, path: root.clone(), kind }),
                Err(e) => eprintln!("⚠️  {}: {e}", root.display()),
            }
            continue;
        }
        let mut found: Vec<Source> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let kind = DocumentKind::from_filename(&e.file_name().to_string_lossy()).ok()?;
                let rel = e.path().strip_prefix(root).unwrap_or(e.path());
                Some(Source { id: id_from_path(rel), path: e.path().to_path_buf(), kind })
            })
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        out.extend(found);
    }
    out
}

fn id_from_path(rel: &Path) -> String {
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

async fn ingest(rag: &Rag, paths: &[PathBuf]) -> anyhow::Result<()> {
    let sources = collect_sources(paths);
    if sources.is_empty() {
        bail!("no supported files found");
    }
    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let (mut indexed, mut skipped, mut failed, mut points) = (0usize, 0usize, 0usize, 0usize);
    for src in sources {
        pb.set_message(src.id.clone());
        let bytes = fs::read(&src.path).with_context(|| format!("read {}", src.path.display()))?;
        let filename = src.path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| src.id.clone());
        match rag.ingest(Document::file(src.id.clone(), filename, src.kind, bytes)).await {
            Ok(status) if status.status == IngestStatus::Indexed => {
                indexed += 1;
                points += status.chunks;
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                failed += 1;
                pb.println(format!("❌ {}: {e}", src.id));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("📊 {indexed} indexed ({points} chunks), {skipped} skipped, {failed} failed");
    if failed > 0 {
        bail!("{failed} document(s) failed to ingest");
    }
    Ok(())
}

fn parse_ask(args: &[String]) -> anyhow::Result<(String, Option<usize>)> {
    let mut top_k = None;
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => {
                let value = args.get(i + 1).context("--top-k requires a number")?;
                top_k = Some(value.parse::<usize>().with_context(|| format!("invalid --top-k value '{value}'"))?);
                i += 1;
            }
            other => words.push(other.to_string()),
        }
        i += 1;
    }
    if words.is_empty() {
        bail!("Usage: docrag ask \"<question>\" [--top-k N]");
    }
    Ok((words.join(" "), top_k))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();
    let runtime = tokio::runtime::Runtime::new()?;
    let rag = runtime.block_on(Rag::from_settings(config.settings()))?;

    runtime.block_on(async {
        match cmd.as_str() {
            "ingest" => {
                if args.is_empty() {
                    bail!("Usage: docrag ingest <path>...");
                }
                let paths: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
                ingest(&rag, &paths).await
            }
            "ask" => {
                let (question, top_k) = parse_ask(&args)?;
                let answer = rag.ask(&question, top_k).await?;
                println!("{}", answer.answer);
                if answer.context_found {
                    println!("\nSources:");
                    for c in &answer.contexts {
                        println!("  [{:.3}] {}#{}", c.score, c.doc_id, c.chunk_index);
                    }
                } else {
                    println!("\n(no indexed context was found)");
                }
                Ok(())
            }
            "list" => {
                let docs = rag.list_documents().await?;
                if docs.is_empty() {
                    println!("No documents indexed");
                }
                for d in docs {
                    let m = d.metadata;
                    println!(
                        "{}\t{}\t{} chunks\t{}\t{}",
                        d.id,
                        m.kind.as_str(),
                        m.chunks,
                        m.filename.unwrap_or_else(|| "-".into()),
                        m.ingested_at.to_rfc3339()
                    );
                }
                Ok(())
            }
            "show" => {
                let id = args.first().context("Usage: docrag show <id>")?;
                let detail = rag.document(id).await?;
                println!("{}", serde_json::to_string_pretty(&detail)?);
                Ok(())
            }
            "delete" => {
                let id = args.first().context("Usage: docrag delete <id>")?;
                rag.delete(id).await?;
                println!("🗑️  deleted {id}");
                Ok(())
            }
            _ => {
                eprintln!("Unknown command: {cmd}\n\n{USAGE}");
                std::process::exit(1);
            }
        }
    })
}
