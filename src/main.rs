use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use tei_extractor::{extract_markdown, ExtractError, SectionPolicy};

const DEFAULT_XML_DIR: &str = "data/xml";
const DEFAULT_MARKDOWN_DIR: &str = "data/markdown";
const PREVIEW_CHARS: usize = 2000;

#[derive(Parser)]
#[command(name = "tei_extractor", about = "TEI XML → Markdown extraction for scholarly full text")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one TEI document and print a preview
    Convert {
        /// Source .tei.xml (default: first one under data/xml/)
        path: Option<PathBuf>,
        /// Output file (default: data/markdown/<stem>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Section-exclusion policy JSON (default: built-in)
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Convert every XML document in a directory
    Batch {
        /// Directory of .tei.xml / .xml files
        input_dir: PathBuf,
        /// Output directory for .md files
        #[arg(short, long, default_value = DEFAULT_MARKDOWN_DIR)]
        output_dir: PathBuf,
        /// Max documents to convert (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Section-exclusion policy JSON (default: built-in)
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Print the active section-exclusion policy as JSON
    Policy {
        /// Policy file to echo instead of the built-in default
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert { path, output, policy } => {
            let policy = load_policy(policy.as_deref())?;
            let source = match path {
                Some(p) => p,
                None => default_source()?,
            };
            let markdown = convert_file(&source, &policy)
                .with_context(|| format!("converting {}", source.display()))?;

            let output = output.unwrap_or_else(|| {
                PathBuf::from(DEFAULT_MARKDOWN_DIR).join(markdown_name(&source))
            });
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output, &markdown)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Extracted markdown -> {}", output.display());

            println!("\nPreview (first {PREVIEW_CHARS} chars):");
            println!("{}", "=".repeat(60));
            let cut = markdown
                .char_indices()
                .nth(PREVIEW_CHARS)
                .map(|(i, _)| i)
                .unwrap_or(markdown.len());
            println!("{}", &markdown[..cut]);
            Ok(())
        }
        Commands::Batch { input_dir, output_dir, limit, policy } => {
            let policy = load_policy(policy.as_deref())?;
            let mut files = xml_files(&input_dir)?;
            if let Some(limit) = limit {
                files.truncate(limit);
            }
            if files.is_empty() {
                println!("No XML documents found in {}", input_dir.display());
                return Ok(());
            }
            fs::create_dir_all(&output_dir)?;
            println!("Converting {} documents...", files.len());
            let counts = convert_batch(&files, &output_dir, &policy)?;
            counts.print();
            Ok(())
        }
        Commands::Policy { policy } => {
            let policy = load_policy(policy.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct BatchCounts {
    converted: usize,
    empty: usize,
    failed: usize,
}

impl BatchCounts {
    fn print(&self) {
        println!(
            "Converted {} documents ({} empty, {} failed).",
            self.converted, self.empty, self.failed
        );
    }
}

fn convert_batch(
    files: &[PathBuf],
    output_dir: &Path,
    policy: &SectionPolicy,
) -> anyhow::Result<BatchCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = BatchCounts {
        converted: 0,
        empty: 0,
        failed: 0,
    };

    for chunk in files.chunks(64) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|path| (path, convert_file(path, policy)))
            .collect();

        for (path, result) in results {
            match result {
                Ok(markdown) => {
                    let out = output_dir.join(markdown_name(path));
                    fs::write(&out, markdown)
                        .with_context(|| format!("writing {}", out.display()))?;
                    counts.converted += 1;
                }
                Err(e) if matches!(e.downcast_ref(), Some(ExtractError::EmptyOutput)) => {
                    warn!("{}: produced no usable content", path.display());
                    counts.empty += 1;
                }
                Err(e) => {
                    warn!("{}: {:#}", path.display(), e);
                    counts.failed += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn convert_file(path: &Path, policy: &SectionPolicy) -> anyhow::Result<String> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(extract_markdown(&xml, policy)?)
}

fn load_policy(path: Option<&Path>) -> anyhow::Result<SectionPolicy> {
    match path {
        Some(p) => {
            let json = fs::read_to_string(p)
                .with_context(|| format!("reading policy {}", p.display()))?;
            SectionPolicy::from_json(&json)
                .with_context(|| format!("parsing policy {}", p.display()))
        }
        None => Ok(SectionPolicy::default()),
    }
}

/// First .tei.xml under the conventional input directory.
fn default_source() -> anyhow::Result<PathBuf> {
    let files = xml_files(Path::new(DEFAULT_XML_DIR))
        .with_context(|| format!("no source given and {DEFAULT_XML_DIR}/ is unreadable"))?;
    files
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no source given and no .tei.xml files in {DEFAULT_XML_DIR}/"))
}

fn xml_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "xml"))
        .collect();
    files.sort();
    Ok(files)
}

/// "paper.tei.xml" → "paper.md" (double extension stripped).
fn markdown_name(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".tei.xml")
        .or_else(|| name.strip_suffix(".xml"))
        .unwrap_or(&name);
    PathBuf::from(format!("{stem}.md"))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
