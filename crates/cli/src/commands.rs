use anyhow::{Context, Result};
use extrato_core::AccountId;
use extrato_import::{detect_format, ImportConfig, ImportPipeline, ImportRequest};
use extrato_storage::SqliteStore;
use std::path::Path;
use std::sync::Arc;

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Not a file path: {}", path.display()))
}

pub async fn cmd_import(
    db: &Path,
    user: &str,
    account: Option<String>,
    config: Option<&Path>,
    file: &Path,
) -> Result<()> {
    let config = match config {
        Some(path) => ImportConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ImportConfig::default(),
    };

    let content = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let store = SqliteStore::connect(db)
        .await
        .with_context(|| format!("Failed to open database {}", db.display()))?;
    let store = Arc::new(store);

    let pipeline = ImportPipeline::with_config(store.clone(), store.clone(), store, config);
    let mut request = ImportRequest::new(user, &file_name(file)?, content);
    if let Some(id) = account {
        request = request.with_account(AccountId(id));
    }

    let result = pipeline
        .import(request)
        .await
        .with_context(|| format!("Import of {} failed", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn cmd_detect(file: &Path) -> Result<()> {
    let content = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let format = detect_format(&file_name(file)?, &content)?;
    println!("{format}");
    Ok(())
}
