use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use fw_backend::layout_config::{default_layout, load_layout};
use fw_backend::registry::{self, LIST};

mod cli;

use cli::{Cli, OutputFormat};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.target.eq_ignore_ascii_case(LIST) {
        println!("List of supported final target languages:");
        print!("{}", registry::render_list());
        return Ok(());
    }

    let Some(directory) = cli.directory else {
        bail!("a working directory is required for target {}", cli.target);
    };
    let layout = match &cli.layout {
        Some(path) => load_layout(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => default_layout(),
    };

    let engine = registry::lookup(&cli.target, &directory)?.with_layout(layout);
    prepare_output_root(&engine.layout().output_root(&directory))?;

    let summary = engine
        .run()
        .with_context(|| format!("translation to {} aborted", engine.language()))?;

    match cli.format {
        OutputFormat::Text => println!(
            "{} Written {} final configurations",
            "Complete!".green().bold(),
            summary.written
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Recreate the output directory empty, replacing a file of the same name.
fn prepare_output_root(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    } else if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(())
}
