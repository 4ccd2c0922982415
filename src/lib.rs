pub mod broker;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod ids;
pub mod manager;
pub mod protocol;
pub mod rules;
pub mod server;
pub mod snapshot;
pub mod stores;
pub mod sweeper;
pub mod token;

#[cfg(test)]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use config::RuntimeConfig;
pub use ids::{GameId, LobbyId, PlayerId, SessionId};
