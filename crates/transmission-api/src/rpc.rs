//! JSON RPC over the WebSocket.
//!
//! Clients send `{"id", "method", "params"}` frames and get back either
//! `{"id", "result"}` or `{"id", "error": {"code", "message"}}`. The socket's
//! connection id is the caller identity for every call.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use transmission_core::error::DomainError;
use transmission_core::ids::{ParticipantId, SessionId};
use transmission_match::application::registry::SessionRegistry;
use transmission_match::application::{command_handlers, query_handlers};
use transmission_match::domain::commands;
use transmission_match::domain::roles::Role;
use uuid::Uuid;

use crate::error::classify;

/// Method name for creating a session.
pub const CREATE_MATCH: &str = "createMatch";
/// Method name for joining a session.
pub const JOIN_MATCH: &str = "joinMatch";
/// Method name for listing open sessions.
pub const LIST_MATCH: &str = "listMatch";
/// Method name for relaying a draw command.
pub const SUBMIT_DRAW_COMMAND: &str = "submitDrawCommand";
/// Method name for voting.
pub const SUBMIT_VOTE: &str = "submitVote";

/// Client call frame.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Echoed back in the reply.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub params: Value,
}

/// Failure detail of a reply.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RpcError {
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Reply frame.
#[derive(Debug, Serialize)]
pub struct RpcReply {
    /// Id of the call this answers.
    pub id: Value,
    /// Success value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcReply {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMatchParams {
    game_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinMatchParams {
    game_id: String,
    team: usize,
    #[serde(default)]
    player_info: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitDrawCommandParams {
    game_id: String,
    command: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitVoteParams {
    game_id: String,
    index: usize,
}

enum CallError {
    InvalidParams(String),
    UnknownMethod(String),
    Domain(DomainError),
}

impl From<DomainError> for CallError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

fn params<T: DeserializeOwned>(raw: Value) -> Result<T, CallError> {
    serde_json::from_value(raw).map_err(|e| CallError::InvalidParams(e.to_string()))
}

/// Decodes one text frame, runs it, and encodes the reply.
pub async fn handle_frame(registry: &SessionRegistry, caller: &ParticipantId, text: &str) -> String {
    let reply = match serde_json::from_str::<RpcRequest>(text) {
        Ok(request) => dispatch(registry, caller, request).await,
        Err(e) => {
            debug!(%caller, "unparseable frame: {e}");
            RpcReply::err(Value::Null, "parse_error", e.to_string())
        }
    };
    serde_json::to_string(&reply).unwrap_or_else(|e| {
        warn!("failed to encode reply: {e}");
        json!({ "id": Value::Null, "error": { "code": "internal_error", "message": e.to_string() } })
            .to_string()
    })
}

/// Runs one call on behalf of `caller`.
#[instrument(skip(registry, request), fields(method = %request.method, caller = %caller))]
pub async fn dispatch(
    registry: &SessionRegistry,
    caller: &ParticipantId,
    request: RpcRequest,
) -> RpcReply {
    let RpcRequest { id, method, params } = request;
    match call(registry, caller, &method, params).await {
        Ok(result) => RpcReply::ok(id, result),
        Err(CallError::Domain(err)) => {
            let (_, code) = classify(&err);
            debug!(code, "call rejected: {err}");
            RpcReply::err(id, code, err.to_string())
        }
        Err(CallError::InvalidParams(message)) => RpcReply::err(id, "invalid_params", message),
        Err(CallError::UnknownMethod(method)) => {
            RpcReply::err(id, "method_not_found", format!("unknown method: {method}"))
        }
    }
}

async fn call(
    registry: &SessionRegistry,
    caller: &ParticipantId,
    method: &str,
    raw: Value,
) -> Result<Value, CallError> {
    match method {
        CREATE_MATCH => {
            let p: CreateMatchParams = params(raw)?;
            let command = commands::CreateSession {
                correlation_id: Uuid::new_v4(),
                session_id: SessionId::new(p.game_name),
            };
            info!(correlation_id = %command.correlation_id, "handling create_session command");
            let summary = command_handlers::handle_create_session(&command, registry)?;
            Ok(json!(summary))
        }
        JOIN_MATCH => {
            let p: JoinMatchParams = params(raw)?;
            let command = commands::JoinSession {
                correlation_id: Uuid::new_v4(),
                session_id: SessionId::new(p.game_id),
                team: p.team,
                profile: p.player_info,
                caller: caller.clone(),
            };
            info!(correlation_id = %command.correlation_id, "handling join_session command");
            let receipt = command_handlers::handle_join_session(&command, registry)?;
            let capacity = registry.get(&command.session_id)?.config().team_capacity;
            Ok(json!({
                "team": receipt.seat.team,
                "position": receipt.seat.position,
                "role": Role::for_position(receipt.seat.position, capacity),
            }))
        }
        LIST_MATCH => Ok(json!(query_handlers::list_open_sessions(registry))),
        SUBMIT_DRAW_COMMAND => {
            let p: SubmitDrawCommandParams = params(raw)?;
            let command = commands::SubmitDrawCommand {
                correlation_id: Uuid::new_v4(),
                session_id: SessionId::new(p.game_id),
                payload: p.command,
                caller: caller.clone(),
            };
            debug!(correlation_id = %command.correlation_id, "handling submit_draw_command command");
            command_handlers::handle_submit_draw_command(&command, registry).await?;
            Ok(Value::Null)
        }
        SUBMIT_VOTE => {
            let p: SubmitVoteParams = params(raw)?;
            let command = commands::SubmitVote {
                correlation_id: Uuid::new_v4(),
                session_id: SessionId::new(p.game_id),
                image_index: p.index,
                caller: caller.clone(),
            };
            info!(correlation_id = %command.correlation_id, "handling submit_vote command");
            let receipt = command_handlers::handle_submit_vote(&command, registry)?;
            Ok(json!({
                "imageIndex": receipt.image_index,
                "tally": receipt.tally,
                "decided": receipt.decided,
            }))
        }
        other => Err(CallError::UnknownMethod(other.to_owned())),
    }
}
