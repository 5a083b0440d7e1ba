//! A live match session.
//!
//! [`Session`] wraps the pure [`MatchState`] with the concurrency the match
//! needs: a per-session mutex for roster and record changes, atomic
//! `started`/`ended` flags, and a write-once slot for the round's images.
//! Joins, relays, and votes arrive concurrently from request handlers while
//! the phase pipeline runs in its own task; none of the locks here is ever
//! held across an `.await`.
//!
//! Lifecycle: Open (accepting joins) → Starting (all teams full, pipeline
//! scheduled) → `InProgress` → Ended. `started` and `ended` each flip
//! false→true exactly once; `ended` only through [`Session::finalize`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transmission_core::broadcast::Scope;
use transmission_core::error::DomainError;
use transmission_core::ids::{ParticipantId, SessionId};

use super::config::MatchConfig;
use super::services::MatchServices;
use crate::domain::aggregates::{MatchState, Seat};
use crate::domain::events::{MatchEvent, MatchOutcome, SessionSummary};
use crate::domain::images::RoundImages;
use crate::domain::roles::Role;

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReceipt {
    /// Where the participant sits.
    pub seat: Seat,
    /// Whether this join triggered the phase pipeline.
    pub pipeline_triggered: bool,
}

/// Result of a successful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    /// The image voted for.
    pub image_index: usize,
    /// Its tally after this vote.
    pub tally: u32,
    /// Whether this vote decided the match.
    pub decided: bool,
}

/// One timed round with fixed team rosters.
pub struct Session {
    id: SessionId,
    config: MatchConfig,
    services: MatchServices,
    created_at: DateTime<Utc>,
    state: Mutex<MatchState>,
    round: OnceLock<RoundImages>,
    started: AtomicBool,
    ended: AtomicBool,
    pipeline: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("started", &self.is_started())
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an empty, open session.
    #[must_use]
    pub fn new(id: SessionId, config: MatchConfig, services: MatchServices) -> Self {
        let state = MatchState::new(config.team_count, config.team_capacity);
        let created_at = services.clock.now();
        Self {
            id,
            config,
            services,
            created_at,
            state: Mutex::new(state),
            round: OnceLock::new(),
            started: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            pipeline: Mutex::new(None),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether the pipeline has been triggered.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Whether the match has been finalized.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Whether the session still accepts joins: not started, not ended, and
    /// at least one team below capacity.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.is_started() && !self.is_ended() && !self.lock_state().all_teams_full()
    }

    /// The round's images, once the pipeline has selected them.
    #[must_use]
    pub fn round(&self) -> Option<&RoundImages> {
        self.round.get()
    }

    /// Announced start time, once the pipeline has set it.
    #[must_use]
    pub fn scheduled_start(&self) -> Option<DateTime<Utc>> {
        self.lock_state().scheduled_start
    }

    /// When the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the match was finalized.
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.lock_state().ended_at
    }

    /// Configuration the session was created with.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Listing entry for this session.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            started: self.is_started(),
            ended: self.is_ended(),
            team_sizes: self.lock_state().team_sizes(),
            team_capacity: self.config.team_capacity,
        }
    }

    /// Runs `f` against the locked state.
    pub fn with_state<R>(&self, f: impl FnOnce(&MatchState) -> R) -> R {
        f(&self.lock_state())
    }

    /// Seats `caller` in `team` and, if that fills every team, schedules the
    /// phase pipeline.
    ///
    /// On a fresh seat the caller is registered under its own, the session's,
    /// and the team's scope, and the team is told someone joined. Whoever
    /// takes a team's last seat is additionally told they are its handler.
    /// Rejoining the same team returns the existing seat and emits nothing.
    ///
    /// # Errors
    ///
    /// - `DomainError::AlreadyEnded` if the session has ended.
    /// - `DomainError::OutOfRange`, `DomainError::AlreadySeated`, or
    ///   `DomainError::TeamFull` from seating; state is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime and this join triggers the
    /// pipeline.
    pub fn join(
        self: &Arc<Self>,
        team: usize,
        profile: Value,
        caller: ParticipantId,
    ) -> Result<JoinReceipt, DomainError> {
        if self.is_ended() {
            return Err(DomainError::AlreadyEnded);
        }
        let seat = self.lock_state().seat(team, &caller, profile.clone())?;
        if !seat.newly_joined {
            debug!(session_id = %self.id, participant = %caller, "participant rejoined existing seat");
            return Ok(JoinReceipt {
                seat,
                pipeline_triggered: false,
            });
        }

        info!(
            session_id = %self.id,
            participant = %caller,
            team = seat.team,
            position = seat.position,
            "participant joined"
        );

        let team_scope = self.team_scope(seat.team);
        let broadcaster = &self.services.broadcaster;
        broadcaster.register_connection(&caller, &Scope::Participant(caller.clone()));
        broadcaster.register_connection(&caller, &self.session_scope());
        broadcaster.register_connection(&caller, &team_scope);
        self.publish(&team_scope, &MatchEvent::ParticipantJoined { profile });

        let pipeline_triggered = self.try_start_pipeline();

        if seat.filled_team {
            self.publish(
                &Scope::Participant(caller),
                &MatchEvent::RoleAssigned {
                    role: Role::Handler,
                },
            );
        }

        Ok(JoinReceipt {
            seat,
            pipeline_triggered,
        })
    }

    /// Starts the phase pipeline if every team is full and it has not been
    /// started yet. Returns whether this call started it.
    ///
    /// The `started` flag is re-checked under the session lock, so concurrent
    /// joins that all observe full teams start the pipeline once.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when the pipeline starts.
    pub fn try_start_pipeline(self: &Arc<Self>) -> bool {
        if self.is_started() {
            return false;
        }
        {
            let state = self.lock_state();
            if self.is_started() || !state.all_teams_full() {
                return false;
            }
            self.started.store(true, Ordering::Release);
        }

        info!(session_id = %self.id, "all teams full; scheduling match pipeline");
        let handle = tokio::spawn(Arc::clone(self).run_pipeline());
        *self.pipeline.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Hands out the pipeline task, if one was started and not yet taken, so
    /// the caller can await it or abort it on shutdown.
    pub fn take_pipeline(&self) -> Option<JoinHandle<()>> {
        self.pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Relays `payload` from `caller` to the teammate one seat further along.
    ///
    /// A participant's first command is held back by the configured relay
    /// delay before delivery. Returns the recipient.
    ///
    /// # Errors
    ///
    /// - `DomainError::NotStarted` before the pipeline has been triggered.
    /// - `DomainError::AlreadyEnded` after the match has ended, including
    ///   when it ends while a first command is held back.
    /// - `DomainError::NotParticipant` if `caller` has not joined.
    /// - `DomainError::ForbiddenRole` if `caller` holds the handler seat.
    pub async fn submit_command(
        &self,
        caller: &ParticipantId,
        payload: Value,
    ) -> Result<ParticipantId, DomainError> {
        if !self.is_started() {
            return Err(DomainError::NotStarted);
        }
        if self.is_ended() {
            return Err(DomainError::AlreadyEnded);
        }
        let issued_at = self.services.clock.now();
        let plan = self
            .lock_state()
            .record_command(caller, payload.clone(), issued_at)?;

        if plan.first_command {
            debug!(session_id = %self.id, participant = %caller, "delaying first relay");
            self.services
                .timer
                .sleep(self.config.first_relay_delay)
                .await;
            if self.is_ended() {
                return Err(DomainError::AlreadyEnded);
            }
        }

        debug!(
            session_id = %self.id,
            from = %caller,
            to = %plan.recipient,
            "relaying draw command"
        );
        self.publish(
            &Scope::Participant(plan.recipient.clone()),
            &MatchEvent::CommandRelayed { payload },
        );
        Ok(plan.recipient)
    }

    /// Records a vote for `image_index`. The first accepted vote decides the
    /// match; later votes still count but do not broadcast again.
    ///
    /// # Errors
    ///
    /// - `DomainError::NotStarted` before the round's images exist.
    /// - `DomainError::AlreadyEnded` after the match has ended.
    /// - `DomainError::OutOfRange` if `image_index` is not a candidate.
    pub fn submit_vote(
        &self,
        caller: &ParticipantId,
        image_index: usize,
    ) -> Result<VoteReceipt, DomainError> {
        if !self.is_started() {
            return Err(DomainError::NotStarted);
        }
        if self.is_ended() {
            return Err(DomainError::AlreadyEnded);
        }
        let round = self.round.get().ok_or(DomainError::NotStarted)?;
        let tally = round.cast_vote(image_index)?;

        info!(
            session_id = %self.id,
            participant = %caller,
            image_index,
            tally,
            "vote cast"
        );

        let decided = self.finalize(MatchOutcome::Decided(round.result(Some(image_index))));
        Ok(VoteReceipt {
            image_index,
            tally,
            decided,
        })
    }

    /// Ends the match with `outcome` and broadcasts it to the session.
    ///
    /// Only the first caller wins the compare-and-set on `ended`; every later
    /// call returns `false` without broadcasting.
    pub fn finalize(&self, outcome: MatchOutcome) -> bool {
        if self
            .ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(session_id = %self.id, "match already finalized");
            return false;
        }
        self.lock_state().ended_at = Some(self.services.clock.now());

        match &outcome {
            MatchOutcome::Decided(result) => info!(
                session_id = %self.id,
                matched = ?result.matched,
                timed_out = result.timed_out,
                "match ended"
            ),
            MatchOutcome::Failed { reason } => {
                warn!(session_id = %self.id, %reason, "match abandoned");
            }
        }
        self.publish(&self.session_scope(), &outcome.into_event());
        true
    }

    pub(crate) fn services(&self) -> &MatchServices {
        &self.services
    }

    pub(crate) fn install_round(&self, round: RoundImages) -> &RoundImages {
        self.round.get_or_init(|| round)
    }

    pub(crate) fn publish(&self, scope: &Scope, event: &MatchEvent) {
        self.services
            .broadcaster
            .send_to_scope(scope, event.name(), event.payload());
    }

    pub(crate) fn session_scope(&self) -> Scope {
        Scope::Session(self.id.clone())
    }

    fn team_scope(&self, team: usize) -> Scope {
        Scope::Team {
            session: self.id.clone(),
            team,
        }
    }

    /// Every critical section leaves the state consistent, so a poisoned
    /// lock is recovered rather than propagated.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, MatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
