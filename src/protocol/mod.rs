//! Protocol Adapter: translates validated wire events into internal commands and projects
//! stored state back into outbound wire events. Pure with respect to I/O; the only state it
//! touches is what callers pass in.

pub mod adapter;
pub mod command;
pub mod wire;

pub use adapter::ProtocolAdapter;
pub use command::{Command, GameCommand, LobbyCommand};
pub use wire::{Ordering, OutboundEvent};
