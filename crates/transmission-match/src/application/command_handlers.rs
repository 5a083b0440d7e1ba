//! Command handlers for the match context.
//!
//! Each handler resolves the session named by the command, runs the session
//! operation, and publishes the lobby-wide listing when the set of joinable
//! sessions changed.

use tracing::debug;
use transmission_core::command::Command;
use transmission_core::error::DomainError;
use transmission_core::ids::ParticipantId;

use super::registry::SessionRegistry;
use super::session::{JoinReceipt, VoteReceipt};
use crate::domain::commands::{CreateSession, JoinSession, SubmitDrawCommand, SubmitVote};
use crate::domain::events::SessionSummary;

fn trace_command(command: &impl Command) {
    debug!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        session_id = %command.session_id(),
        "handling command"
    );
}

/// Handles the `CreateSession` command: registers the session and announces
/// the new listing to every connection.
///
/// # Errors
///
/// Returns `DomainError::DuplicateId` if the id is taken, or
/// `DomainError::Validation` if it is empty.
pub fn handle_create_session(
    command: &CreateSession,
    registry: &SessionRegistry,
) -> Result<SessionSummary, DomainError> {
    trace_command(command);
    let session = registry.create(command.session_id.clone())?;
    registry.announce_open_sessions();
    Ok(session.summary())
}

/// Handles the `JoinSession` command. When the join fills the last seat the
/// session leaves the listing, so the listing is announced again.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session, plus any error of
/// [`Session::join`](super::session::Session::join).
pub fn handle_join_session(
    command: &JoinSession,
    registry: &SessionRegistry,
) -> Result<JoinReceipt, DomainError> {
    trace_command(command);
    let session = registry.get(&command.session_id)?;
    let receipt = session.join(
        command.team,
        command.profile.clone(),
        command.caller.clone(),
    )?;
    if receipt.pipeline_triggered {
        registry.announce_open_sessions();
    }
    Ok(receipt)
}

/// Handles the `SubmitDrawCommand` command and returns the recipient.
///
/// Completes only after the relay was delivered, which for a participant's
/// first command includes the relay delay.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session, plus any error of
/// [`Session::submit_command`](super::session::Session::submit_command).
pub async fn handle_submit_draw_command(
    command: &SubmitDrawCommand,
    registry: &SessionRegistry,
) -> Result<ParticipantId, DomainError> {
    trace_command(command);
    let session = registry.get(&command.session_id)?;
    session
        .submit_command(&command.caller, command.payload.clone())
        .await
}

/// Handles the `SubmitVote` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session, plus any error of
/// [`Session::submit_vote`](super::session::Session::submit_vote).
pub fn handle_submit_vote(
    command: &SubmitVote,
    registry: &SessionRegistry,
) -> Result<VoteReceipt, DomainError> {
    trace_command(command);
    let session = registry.get(&command.session_id)?;
    session.submit_vote(&command.caller, command.image_index)
}
