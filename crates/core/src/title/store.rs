//! Title storage trait.

use thiserror::Error;

use super::types::{Episode, Season, Title};

#[derive(Debug, Error)]
pub enum TitleStoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("failed to (de)serialize title {id}: {message}")]
    Serialization { id: String, message: String },
}

/// Document store for title aggregates.
///
/// A job reads a title, mutates it in memory and writes it back once.
pub trait TitleStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Title>, TitleStoreError>;

    /// Insert or replace the whole aggregate.
    fn put(&self, title: &Title) -> Result<(), TitleStoreError>;

    /// Ids of every stored title, sorted.
    fn list_ids(&self) -> Result<Vec<String>, TitleStoreError>;

    /// Read a single season without loading the whole aggregate.
    fn get_season(&self, id: &str, season: u32) -> Result<Option<Season>, TitleStoreError>;

    /// Read a single episode without loading the whole aggregate.
    fn get_episode(
        &self,
        id: &str,
        season: u32,
        episode: u32,
    ) -> Result<Option<Episode>, TitleStoreError>;
}
