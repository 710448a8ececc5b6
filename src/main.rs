use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use clap::Parser;
use tokio::fs;
use tracing::{error, info, Level};

use zip_pack::{
    cli::{Cli, Command},
    stats::ArchiveStats,
    utils::Progress,
    Config, Entry, ParallelPacker, Result, ZipDecoder, ZipEncoder, ZipError,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let max_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = cli.validate() {
        error!("{}", message);
        return Err(ZipError::InvalidConfiguration(message));
    }
    let config = cli.into_config();

    match cli.command {
        Command::Pack {
            inputs,
            output,
            no_progress,
            ..
        } => pack(&config, &inputs, &output, !no_progress).await,
        Command::Unpack { archive, directory } => unpack(&archive, &directory).await.map(|_| ()),
        Command::List { archive, json } => {
            let listing = list(&archive, json).await?;
            print!("{}", listing);
            Ok(())
        }
    }
}

async fn pack(config: &Config, inputs: &[PathBuf], output: &Path, show_progress: bool) -> Result<()> {
    let entries = collect_entries(inputs).await?;
    let total: u64 = entries.iter().map(|e| e.size() as u64).sum();
    info!(entries = entries.len(), bytes = total, "packing {:?}", output);

    let progress = Arc::new(if show_progress {
        Progress::new(total)?
    } else {
        Progress::hidden(total)
    });

    let archive = if config.parallel {
        ParallelPacker::new(config)?
            .with_progress(Arc::clone(&progress))
            .pack(entries)
            .await?
    } else {
        let encoder = ZipEncoder::new().compress_when_possible(config.compress_when_possible);
        let mut compressed = Vec::with_capacity(entries.len());
        for entry in &entries {
            compressed.push(encoder.compress_entry(entry)?);
            progress.update(entry.size() as u64);
        }
        ZipEncoder::assemble(&compressed)?
    };
    progress.finish("Packed");

    fs::write(output, &archive).await?;
    info!(bytes = archive.len(), "archive written to {:?}", output);
    Ok(())
}

/// Extracts `archive` under `directory`, returning the paths written
async fn unpack(archive: &Path, directory: &Path) -> Result<Vec<PathBuf>> {
    let data = fs::read(archive).await?;
    let entries = ZipDecoder::new().decode(&data)?;

    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = output_path(directory, &entry.name)?;
        if entry.name.ends_with('/') {
            fs::create_dir_all(&path).await?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &entry.data).await?;
        written.push(path);
    }

    info!(files = written.len(), "unpacked into {:?}", directory);
    Ok(written)
}

async fn list(archive: &Path, json: bool) -> Result<String> {
    let data = fs::read(archive).await?;
    let stats = ArchiveStats::from_archive(&data)?;

    if json {
        let mut out = serde_json::to_string_pretty(&stats).map_err(std::io::Error::from)?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(stats.render())
    }
}

/// Reads files, descending into directories in name order.
///
/// Entry names are relative to each input's parent and use `/` separators.
async fn collect_entries(inputs: &[PathBuf]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for input in inputs {
        let root = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut pending = vec![(input.clone(), root)];

        while let Some((path, name)) = pending.pop() {
            let metadata = fs::metadata(&path).await?;
            if metadata.is_dir() {
                let mut children = Vec::new();
                let mut dir = fs::read_dir(&path).await?;
                while let Some(child) = dir.next_entry().await? {
                    let child_name = child.file_name().to_string_lossy().into_owned();
                    children.push((child.path(), join_name(&name, &child_name)));
                }
                children.sort();
                // popped from the back
                pending.extend(children.into_iter().rev());
                continue;
            }

            let data = fs::read(&path).await?;
            let mut entry = Entry::new(name, data);
            if let Ok(modified) = metadata.modified() {
                entry = entry.with_last_modified(DateTime::<Local>::from(modified).naive_local());
            }
            entries.push(entry);
        }
    }

    Ok(entries)
}

fn join_name(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_owned()
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Resolves an entry name under `directory`, refusing names that would escape it
fn output_path(directory: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    let contained = !name.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !contained {
        return Err(ZipError::UnsafeName {
            name: name.to_owned(),
        });
    }
    Ok(directory.join(relative))
}
