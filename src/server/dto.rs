//! HTTP request/response envelopes for the lobby endpoints and the single `/actions` dispatch
//! endpoint, plus the shared success/failure envelope shape.

use serde::{Deserialize, Serialize};

use crate::ids::{LobbyId, PlayerId};
use crate::protocol::adapter::RawAction;
use crate::protocol::wire::{Identity, OutboundEvent};
use crate::rules::RejectCode;

#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    pub request_id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinLobbyRequest {
    pub request_id: Option<String>,
    pub lobby_id: LobbyId,
    pub display_name: Option<String>,
    pub reconnect_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    pub request_id: Option<String>,
    pub lobby_id: LobbyId,
    pub player_id: PlayerId,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct StartLobbyRequest {
    pub request_id: Option<String>,
    pub lobby_id: LobbyId,
    pub player_id: PlayerId,
}

/// `POST /actions` body: the subcommand tag/payload flattened alongside an optional requestId.
#[derive(Debug, Deserialize)]
pub struct ActionsRequest {
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub action: RawAction,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub request_id: String,
    pub outbound: Vec<OutboundEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub request_id: String,
    pub code: RejectCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
}
