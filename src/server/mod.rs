pub mod bootstrap;
mod dto;
mod error;
mod logging;
pub mod routes;
mod ws;

pub use bootstrap::run_server;
pub use dto::{
    ActionsRequest, CreateLobbyRequest, FailureResponse, JoinLobbyRequest, StartLobbyRequest,
    SuccessResponse, UpdateNameRequest,
};
pub use error::ApiError;
pub use routes::{FunEuchreServer, ServerContext};
