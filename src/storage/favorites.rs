use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::kv::KeyValueStore;
use super::types::{json_kind, ImportError, StoreError};
use crate::model::Article;

/// Store key holding the whole favorites collection as one JSON array.
pub const FAVORITES_KEY: &str = "newswave:favorites";

/// The user's saved articles, newest first, persisted as a single blob.
///
/// Every mutation reads the full collection, modifies it and writes it back.
/// Mutations hold `lock` for the whole read-modify-write, so `toggle` cannot
/// interleave with another caller.
///
/// Failures never escape as errors from the core operations: a corrupt or
/// unreadable blob reads as an empty collection, and a failed write is logged
/// and reported through the boolean result.
pub struct FavoritesRepository<S> {
    store: S,
    lock: Mutex<()>,
    revision: watch::Sender<u64>,
}

impl<S: KeyValueStore> FavoritesRepository<S> {
    pub fn new(store: S) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            store,
            lock: Mutex::new(()),
            revision,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receiver whose value is bumped after every successful write.
    ///
    /// Views use it to know when to re-read the collection.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current collection, newest first. Empty on any read failure.
    pub fn list(&self) -> Vec<Article> {
        let _guard = self.guard();
        self.read()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.list().iter().any(|a| a.id == id)
    }

    /// Prepend `article` unless an entry with the same id exists.
    ///
    /// Returns `true` only if the collection was changed and persisted.
    pub fn add(&self, article: &Article) -> bool {
        let _guard = self.guard();
        self.add_locked(article)
    }

    /// Remove every entry with `id`. No write happens if none exist.
    ///
    /// Returns `true` only if entries were removed and persisted.
    pub fn remove(&self, id: &str) -> bool {
        let _guard = self.guard();
        self.remove_locked(id)
    }

    /// Remove the article if saved, add it otherwise.
    ///
    /// Returns whether the article is a favorite after the call. If the
    /// write fails the state is unchanged and the previous state is returned.
    pub fn toggle(&self, article: &Article) -> bool {
        let _guard = self.guard();
        let was_favorite = self.read().iter().any(|a| a.id == article.id);
        if was_favorite {
            !self.remove_locked(&article.id)
        } else {
            self.add_locked(article)
        }
    }

    /// Pretty-printed JSON array of the current collection.
    pub fn export_all(&self) -> String {
        let favorites = self.list();
        serde_json::to_string_pretty(&favorites).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to serialize favorites for export");
            "[]".to_string()
        })
    }

    /// Replace the collection with the contents of `text`.
    ///
    /// Returns `false` and leaves existing favorites untouched if `text` is
    /// not a JSON array of articles.
    pub fn import_all(&self, text: &str) -> bool {
        match self.try_import(text) {
            Ok(count) => {
                tracing::info!(count = count, "Imported favorites");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected favorites import");
                false
            }
        }
    }

    /// Like [`import_all`](Self::import_all), reporting why an import failed.
    ///
    /// Items are checked to be articles, but duplicate ids are kept as-is.
    pub fn try_import(&self, text: &str) -> Result<usize, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ImportError::Syntax(e.to_string()))?;

        let items = match value {
            serde_json::Value::Array(items) => items,
            other => return Err(ImportError::NotAnArray(json_kind(&other))),
        };

        let articles = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<Article>(item).map_err(|e| ImportError::InvalidItem {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.guard();
        self.write(&articles)?;
        Ok(articles.len())
    }

    /// Delete the stored collection entirely.
    pub fn clear(&self) -> bool {
        let _guard = self.guard();
        match self.store.remove(FAVORITES_KEY) {
            Ok(()) => {
                self.bump_revision();
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear favorites");
                false
            }
        }
    }

    // ========================================================================
    // Internals (caller holds the lock)
    // ========================================================================

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Vec<Article> {
        let stored = match self.store.get(FAVORITES_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read favorites, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&stored) {
            Ok(favorites) => favorites,
            Err(e) => {
                tracing::warn!(error = %e, "Stored favorites are malformed, treating as empty");
                Vec::new()
            }
        }
    }

    fn write(&self, favorites: &[Article]) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(favorites)?;
        self.store.set(FAVORITES_KEY, &serialized)?;
        self.bump_revision();
        Ok(())
    }

    fn add_locked(&self, article: &Article) -> bool {
        let mut favorites = self.read();
        if favorites.iter().any(|a| a.id == article.id) {
            return false;
        }
        favorites.insert(0, article.clone());
        self.write_logged(&favorites, "add")
    }

    fn remove_locked(&self, id: &str) -> bool {
        let mut favorites = self.read();
        let before = favorites.len();
        favorites.retain(|a| a.id != id);
        if favorites.len() == before {
            return false;
        }
        self.write_logged(&favorites, "remove")
    }

    fn write_logged(&self, favorites: &[Article], op: &'static str) -> bool {
        match self.write(favorites) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(op = op, error = %e, "Failed to save favorites");
                false
            }
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}
