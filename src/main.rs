use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

mod functions;
mod layout;
mod model;
mod outline;

use layout::Backend;
use model::Outline;

// Unicode whitespace plus the ASCII information separators U+001C..U+001F.
pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\x1C-\x1F]+").unwrap());
pub static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}").unwrap());
pub static TITLECASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Lt}").unwrap());

#[derive(Parser)]
#[command(version, about = "Derive a title and heading outline from PDF text layout")]
struct Args {
    /// PDF directory, or a single .pdf / layout .json file
    #[arg(short, long, env = "PDFOUTLINE_INPUT", default_value = "/app/input")]
    input: PathBuf,

    /// Output directory, or output file when the input is a single file
    #[arg(short, long, env = "PDFOUTLINE_OUTPUT", default_value = "/app/output")]
    output: PathBuf,

    /// Text extraction engine
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,

    /// Write single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.input.is_dir() {
        let failed = process_dir(&args.input, &args.output, args.backend, args.compact)?;
        if failed > 0 {
            bail!("{} document(s) in {} failed", failed, args.input.display());
        }
        return Ok(());
    }

    let output = if args.output.is_dir() {
        args.output.join(output_name(&args.input))
    } else {
        args.output.clone()
    };
    process_file(&args.input, &output, args.backend, args.compact)?;
    println!("Successfully processed {}", args.input.display());
    Ok(())
}

fn extract_outline(path: &Path, backend: Backend) -> Result<Outline> {
    let doc = layout::load_path(path, backend)
        .with_context(|| format!("Failed to read layout of {}", path.display()))?;
    info!("{}: {} pages", path.display(), doc.pages.len());
    Ok(outline::extract_title_and_headings(&doc))
}

fn process_file(input: &Path, output: &Path, backend: Backend, compact: bool) -> Result<()> {
    let outline = extract_outline(input, backend)
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let json = if compact {
        serde_json::to_string(&outline)?
    } else {
        serde_json::to_string_pretty(&outline)?
    };
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

/// Processes every PDF in `input_dir` in parallel. Returns the number of
/// documents that failed; a failure never stops the others.
fn process_dir(input_dir: &Path, output_dir: &Path, backend: Backend, compact: bool) -> Result<usize> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .with_context(|| format!("Failed to list {}", input_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();
    inputs.sort();

    if inputs.is_empty() {
        info!("No PDF files found in {}", input_dir.display());
    }

    let results: Vec<(PathBuf, Result<()>)> = inputs
        .into_par_iter()
        .map(|input| {
            let output = output_dir.join(output_name(&input));
            let result = process_file(&input, &output, backend, compact);
            (input, result)
        })
        .collect();

    let mut failed = 0;
    for (input, result) in results {
        match result {
            Ok(()) => println!("JSON created for {}", input.display()),
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("pdf"))
}

fn output_name(input: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
    name.push(".json");
    PathBuf::from(name)
}
