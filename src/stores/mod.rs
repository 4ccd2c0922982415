//! In-memory Lobby / Game / Session stores: secondary-indexed, clone-on-read, TTL-pruned.
//!
//! Each store wraps an `Arc<RwLock<Inner>>` with a primary map plus secondary index maps updated
//! atomically alongside it. There's no transactional `begin`/`commit` machinery here since every
//! operation only ever mutates one record at a time, so a single write-lock per call suffices.

pub mod game_store;
pub mod lobby_store;
pub mod session_store;

pub use game_store::GameStore;
pub use lobby_store::LobbyStore;
pub use session_store::SessionStore;
