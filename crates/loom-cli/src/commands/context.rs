use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use loom_application::WorkspaceService;
use loom_core::document::DocumentStore;
use loom_core::locale::Locale;
use loom_infrastructure::{
    KeyedTomlStorage, LoomPaths, TomlSettingsRepository, TomlWorkspaceRepository,
};

/// Everything a command needs: the resolved storage root, the loaded
/// workspace and the settings repository.
pub struct AppContext {
    pub paths: LoomPaths,
    pub workspace: WorkspaceService,
    pub settings: Arc<TomlSettingsRepository>,
}

impl AppContext {
    pub async fn open(config_dir: Option<PathBuf>, locale: Option<Locale>) -> Result<Self> {
        let paths = LoomPaths::resolve(config_dir).context("Failed to resolve config directory")?;
        tracing::debug!(root = %paths.root().display(), "Using config directory");

        let storage = KeyedTomlStorage::new(paths.clone());
        let repository = Arc::new(TomlWorkspaceRepository::new(storage.clone()));
        let workspace = WorkspaceService::load(repository, locale.unwrap_or_default()).await?;

        if let Some(locale) = locale {
            workspace.store().write().await.set_locale(locale);
        }

        Ok(Self {
            paths,
            workspace,
            settings: Arc::new(TomlSettingsRepository::new(storage)),
        })
    }
}

/// Finds a document by exact id, exact name or unique id prefix.
pub fn resolve_document(store: &DocumentStore, reference: &str) -> Result<String> {
    if store.contains(reference) {
        return Ok(reference.to_string());
    }

    let by_name: Vec<_> = store
        .documents()
        .iter()
        .filter(|doc| doc.name == reference)
        .collect();
    match by_name.as_slice() {
        [doc] => return Ok(doc.id.clone()),
        [] => {}
        _ => bail!("Several documents are named '{reference}'; use an id instead"),
    }

    let by_prefix: Vec<_> = store
        .documents()
        .iter()
        .filter(|doc| doc.id.starts_with(reference) || short_id(&doc.id).starts_with(reference))
        .collect();
    match by_prefix.as_slice() {
        [doc] => Ok(doc.id.clone()),
        [] => bail!("No document matches '{reference}'"),
        _ => bail!("'{reference}' matches several documents"),
    }
}

/// Id without the `file-` prefix, shortened for listings.
pub fn short_id(id: &str) -> &str {
    let bare = id.strip_prefix("file-").unwrap_or(id);
    bare.get(..8).unwrap_or(bare)
}
