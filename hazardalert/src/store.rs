//! Hazard persistence.
use std::path::{Path, PathBuf};

use futures::{future::BoxFuture, FutureExt};
use serde_json::Value;
use tokio::{fs, sync::Mutex};
#[cfg(feature = "tracing")]
use tracing::{debug, instrument, warn};

use crate::{error::StoreError, hazard::Hazard};

/// Where hazards are read from and appended to.
pub trait HazardStore: Send + Sync {
    /// Every stored hazard, in stored order.
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Hazard>, StoreError>>;

    /// Store a new hazard after the existing ones.
    fn append(&self, hazard: Hazard) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Fetch all hazards, treating any failure as "no hazards".
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub async fn load_hazards(store: &dyn HazardStore) -> Vec<Hazard> {
    match store.fetch_all().await {
        Ok(hazards) => hazards,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, "hazard fetch failed, continuing without hazards");

            Vec::new()
        }
    }
}

/// Hazards kept as a JSON array in a single file.
///
/// A document that is valid JSON but not an array reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write: Mutex<()>,
}

impl JsonFileStore {
    /// Use the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Value, StoreError> {
        let bytes = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn read_all(&self) -> Result<Vec<Hazard>, StoreError> {
        match self.read_document().await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(Into::into))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    async fn append_one(&self, hazard: Hazard) -> Result<(), StoreError> {
        let _guard = self.write.lock().await;

        let mut items = match self.read_document().await? {
            Value::Array(items) => items,
            _ => return Err(StoreError::NotAList),
        };
        items.push(serde_json::to_value(&hazard)?);

        let mut out = serde_json::to_string_pretty(&items)?;
        out.push('\n');
        fs::write(&self.path, out).await?;

        #[cfg(feature = "tracing")]
        debug!(id = %hazard.id, path = %self.path.display(), "hazard appended");

        Ok(())
    }
}

impl HazardStore for JsonFileStore {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Hazard>, StoreError>> {
        self.read_all().boxed()
    }

    fn append(&self, hazard: Hazard) -> BoxFuture<'_, Result<(), StoreError>> {
        self.append_one(hazard).boxed()
    }
}
