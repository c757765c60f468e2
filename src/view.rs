//! UI-facing favorites state.
//!
//! A [`FavoritesView`] keeps a full snapshot of the favorites collection and
//! re-reads it whenever the repository reports a write, whether the write
//! came through this view or another one sharing the same repository.
use std::sync::Arc;

use tokio::sync::watch;

use crate::model::Article;
use crate::storage::{FavoritesRepository, KeyValueStore};

pub struct FavoritesView<S> {
    repo: Arc<FavoritesRepository<S>>,
    revision: watch::Receiver<u64>,
    snapshot: Arc<Vec<Article>>,
}

impl<S: KeyValueStore> FavoritesView<S> {
    pub fn new(repo: Arc<FavoritesRepository<S>>) -> Self {
        let mut revision = repo.subscribe();
        revision.borrow_and_update();
        let snapshot = Arc::new(repo.list());
        Self {
            repo,
            revision,
            snapshot,
        }
    }

    /// Current favorites, newest first. Re-reads the collection first if the
    /// repository changed since the last read.
    pub fn favorites(&mut self) -> Arc<Vec<Article>> {
        if self.revision.has_changed().unwrap_or(false) {
            self.reload();
        }
        Arc::clone(&self.snapshot)
    }

    pub fn is_favorite(&mut self, id: &str) -> bool {
        self.favorites().iter().any(|a| a.id == id)
    }

    pub fn add(&mut self, article: &Article) -> bool {
        let added = self.repo.add(article);
        self.reload();
        added
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.repo.remove(id);
        self.reload();
        removed
    }

    /// Returns whether the article is a favorite afterwards.
    pub fn toggle(&mut self, article: &Article) -> bool {
        let now_favorite = self.repo.toggle(article);
        self.reload();
        now_favorite
    }

    /// Replace all favorites from exported JSON. Reloads on success.
    pub fn import(&mut self, text: &str) -> bool {
        let imported = self.repo.import_all(text);
        if imported {
            self.reload();
        }
        imported
    }

    pub fn export(&self) -> String {
        self.repo.export_all()
    }

    /// Favorites whose title or description contains `query`,
    /// case-insensitively. A blank query returns everything.
    pub fn search(&mut self, query: &str) -> Vec<Article> {
        self.favorites()
            .iter()
            .filter(|a| a.matches_query(query))
            .cloned()
            .collect()
    }

    /// Re-read the full collection unconditionally.
    pub fn reload(&mut self) {
        self.revision.borrow_and_update();
        self.snapshot = Arc::new(self.repo.list());
    }
}
