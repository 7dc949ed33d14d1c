use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::Document;

/// Load every matching text file under the corpus root.
///
/// Returns one [`Document`] per file, sorted by relative path so that
/// repeated ingestion runs see the corpus in the same order.
pub fn load_documents(config: &Config) -> Result<Vec<Document>> {
    let root = &config.corpus.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.corpus.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.corpus.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        documents.push(Document {
            relative_path: rel_str,
            body,
        });
    }

    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
