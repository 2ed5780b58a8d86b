use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use super::context::{AppContext, resolve_document, short_id};
use crate::DocAction;

pub async fn run(ctx: &AppContext, action: DocAction) -> Result<()> {
    if let DocAction::List = action {
        list(ctx).await;
        return Ok(());
    }
    if let DocAction::Show { document } = &action {
        let store = ctx.workspace.store().read().await;
        let id = resolve_document(&store, document)?;
        if let Some(doc) = store.document(&id) {
            println!("{}", doc.content);
        }
        return Ok(());
    }

    // Read before taking the store lock.
    let incoming = match &action {
        DocAction::Write { file: Some(path), .. } => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        DocAction::Write { file: None, .. } => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read content from stdin")?;
            Some(buf)
        }
        _ => None,
    };

    let message = {
        let mut store = ctx.workspace.store().write().await;
        match action {
            DocAction::New { name, activate } => {
                let id = store.create_document(name.as_str());
                if activate {
                    store.set_active_document(Some(&id))?;
                }
                format!("Created {} ({})", name, short_id(&id))
            }
            DocAction::Rm { document } => {
                let id = resolve_document(&store, &document)?;
                store.delete_document(&id);
                format!("Deleted {}", short_id(&id))
            }
            DocAction::Rename { document, name } => {
                let id = resolve_document(&store, &document)?;
                store.rename_document(&id, name.as_str())?;
                format!("Renamed {} to {}", short_id(&id), name)
            }
            DocAction::Dup { document } => {
                let id = resolve_document(&store, &document)?;
                let copy = store.duplicate_document(&id)?;
                let name = store
                    .document(&copy)
                    .map(|doc| doc.name.clone())
                    .unwrap_or_default();
                format!("Duplicated as {} ({})", name, short_id(&copy))
            }
            DocAction::Activate { none: true, .. } | DocAction::Activate { document: None, .. } => {
                store.set_active_document(None)?;
                "Cleared the active document".to_string()
            }
            DocAction::Activate {
                document: Some(document),
                ..
            } => {
                let id = resolve_document(&store, &document)?;
                store.set_active_document(Some(&id))?;
                format!("Active document is now {}", short_id(&id))
            }
            DocAction::Include { document } => {
                let id = resolve_document(&store, &document)?;
                store.toggle_context(&id, true)?;
                format!("Added {} to the context", short_id(&id))
            }
            DocAction::Exclude { document } => {
                let id = resolve_document(&store, &document)?;
                store.toggle_context(&id, false)?;
                format!("Removed {} from the context", short_id(&id))
            }
            DocAction::Write { document, .. } => {
                let id = resolve_document(&store, &document)?;
                let content = incoming.unwrap_or_default();
                let chars = content.chars().count();
                store.set_document_content(&id, content)?;
                format!("Wrote {} characters to {}", chars, short_id(&id))
            }
            DocAction::List | DocAction::Show { .. } => return Ok(()),
        }
    };

    ctx.workspace.save().await?;
    println!("✅ {message}");
    Ok(())
}

async fn list(ctx: &AppContext) {
    let store = ctx.workspace.store().read().await;
    if store.documents().is_empty() {
        println!("No documents. Create one with `loom doc new <name>`.");
        return;
    }

    let active = store.active_document_id();
    for doc in store.documents() {
        let mut flags = String::new();
        if active == Some(doc.id.as_str()) {
            flags.push_str(" [active]");
        }
        if store.is_in_context(&doc.id) {
            flags.push_str(" [context]");
        }
        println!(
            "{}  {:<24} {:>7} chars{}",
            short_id(&doc.id),
            doc.name,
            doc.content.chars().count(),
            flags
        );
    }
}
