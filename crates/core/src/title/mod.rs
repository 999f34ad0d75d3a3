//! Titles (movies and shows), their slots and the document store.

mod slot;
mod sqlite_store;
mod store;
mod types;

pub use slot::{DiscoveryState, SlotKey, SlotState};
pub use sqlite_store::SqliteTitleStore;
pub use store::{TitleStore, TitleStoreError};
pub use types::{Episode, Movie, Season, Title, TitleKind, TvShow};
