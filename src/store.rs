use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ApiError;
use crate::models::{self, Product};

/// Owns the catalog: a newest-first in-memory sequence mirrored to a
/// single JSON file that is rewritten wholesale on every append. The
/// mutex serializes writers within the process; across processes the
/// file stays last-writer-wins.
pub struct CatalogStore {
    path: PathBuf,
    products: Mutex<Vec<Product>>,
}

impl CatalogStore {
    /// Load the backing file, creating it empty when absent. Unreadable
    /// or unparseable contents are logged and leave the catalog empty
    /// rather than refusing to start.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let products = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(products) => products,
                Err(err) => {
                    log::error!("failed to parse {}: {err}", path.display());
                    vec![]
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Err(err) = std::fs::write(&path, "[]") {
                    log::error!("failed to create {}: {err}", path.display());
                }
                vec![]
            }
            Err(err) => {
                log::error!("failed to read {}: {err}", path.display());
                vec![]
            }
        };
        Self {
            path,
            products: Mutex::new(products),
        }
    }

    /// Snapshot of the full sequence, newest first.
    pub fn list(&self) -> Vec<Product> {
        self.products.lock().expect("catalog lock poisoned").clone()
    }

    /// Promote a transient product: assign an id and creation stamp,
    /// insert at the front, rewrite the file. On a failed rewrite the
    /// in-memory sequence has already advanced and is not rolled back;
    /// the next successful append persists it.
    pub fn append(&self, mut product: Product) -> Result<Product, ApiError> {
        product.id = Some(format!("p_{}", models::unix_millis()));
        product.created_at = Some(models::now_rfc3339());
        product.price = models::round2(product.price);

        let mut products = self.products.lock().expect("catalog lock poisoned");
        products.insert(0, product.clone());
        let json = serde_json::to_string_pretty(&*products)
            .map_err(|e| ApiError::Persist(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ApiError::Persist(e.to_string()))?;
        Ok(product)
    }
}
