//! The phase pipeline.
//!
//! Runs once per session, in its own task, from the moment every team is
//! full:
//!
//! 1. fix the announced start at now + `start_delay`;
//! 2. wait out the grace period;
//! 3. announce the start to the session;
//! 4. pick a keyword, fetch candidates, pick the target;
//! 5. wait until `start_delay + start_lag` has passed since the announcement;
//! 6. brief every participant with their role, unless a vote already ended
//!    the match;
//! 7. wait out the match duration;
//! 8. time the match out unless a vote already ended it.
//!
//! A failed image search ends the session with a `matchFailed` broadcast
//! instead of leaving participants waiting. An early vote does not cancel
//! any wait; the pipeline just finds `ended` set at step 8.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tracing::{debug, error, info, instrument};
use transmission_core::broadcast::Scope;
use transmission_core::error::DomainError;
use transmission_core::ids::ParticipantId;

use super::services::MatchServices;
use super::session::Session;
use crate::domain::events::{MatchEvent, MatchOutcome, RoundBriefing};
use crate::domain::images::RoundImages;
use crate::domain::roles::Role;

/// Who the keyword is about.
pub const KEYWORD_SUBJECTS: [&str; 7] = ["teacher", "monkey", "man", "girl", "boy", "family", "lion"];

/// Where they are. The empty setting leaves the subject alone.
pub const KEYWORD_SETTINGS: [&str; 4] = [" in black car", " in forest", " on the beach", ""];

/// Picks a search keyword: one subject followed by one setting.
#[must_use]
pub fn choose_keyword(services: &MatchServices) -> String {
    let subject = pick(services, &KEYWORD_SUBJECTS);
    let setting = pick(services, &KEYWORD_SETTINGS);
    format!("{subject}{setting}")
}

fn pick<'a>(services: &MatchServices, options: &[&'a str]) -> &'a str {
    let last = u32::try_from(options.len().saturating_sub(1)).unwrap_or(u32::MAX);
    let index = usize::try_from(services.random_in(0, last)).unwrap_or(0);
    options.get(index).copied().unwrap_or_default()
}

fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::zero())
}

impl Session {
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub(crate) async fn run_pipeline(self: Arc<Self>) {
        let services = self.services().clone();
        let config = self.config().clone();

        let scheduled_start = services.clock.now() + to_time_delta(config.start_delay);
        self.lock_state().scheduled_start = Some(scheduled_start);

        services.timer.sleep(config.grace_period).await;

        info!(%scheduled_start, "announcing match start");
        self.publish(
            &self.session_scope(),
            &MatchEvent::MatchStarting { scheduled_start },
        );
        // Clients count `start_delay` down from the announcement.
        let briefing_at = services.clock.now()
            + to_time_delta(config.start_delay)
            + to_time_delta(config.start_lag);

        let round = match self.prepare_round().await {
            Ok(round) => round,
            Err(err) => {
                error!(error = %err, "could not prepare round");
                self.finalize(MatchOutcome::Failed {
                    reason: err.to_string(),
                });
                return;
            }
        };

        let remaining = (briefing_at - services.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        services.timer.sleep(remaining).await;

        if self.is_ended() {
            debug!("match decided before briefing");
            return;
        }
        self.brief_teams(round);

        services.timer.sleep(config.match_duration).await;

        if self.is_ended() {
            debug!("match decided before timeout");
            return;
        }
        self.finalize(MatchOutcome::Decided(round.result(None)));
    }

    async fn prepare_round(&self) -> Result<&RoundImages, DomainError> {
        let services = self.services();
        let keyword = choose_keyword(services);
        debug!(%keyword, "searching candidate images");

        let candidates = services
            .images
            .search(&keyword)
            .await
            .map_err(|e| DomainError::PipelineFailed(e.to_string()))?;
        if candidates.is_empty() {
            return Err(DomainError::PipelineFailed(format!(
                "no images found for \"{keyword}\""
            )));
        }

        let last = u32::try_from(candidates.len() - 1).unwrap_or(u32::MAX);
        let target = usize::try_from(services.random_in(0, last)).unwrap_or(0);
        let round = RoundImages::new(keyword, target, candidates)
            .map_err(|e| DomainError::PipelineFailed(e.to_string()))?;

        info!(
            keyword = round.keyword(),
            target,
            candidates = round.len(),
            "round prepared"
        );
        Ok(self.install_round(round))
    }

    fn brief_teams(&self, round: &RoundImages) {
        let match_duration_ms =
            u64::try_from(self.config().match_duration.as_millis()).unwrap_or(u64::MAX);
        let seats: Vec<(ParticipantId, Role)> = self.with_state(|state| {
            state
                .teams()
                .iter()
                .flat_map(|team| {
                    team.members()
                        .iter()
                        .enumerate()
                        .map(|(position, member)| (member.clone(), team.role_at(position)))
                })
                .collect()
        });

        for (member, role) in seats {
            let briefing = RoundBriefing {
                role,
                reference_image: (role == Role::Spy).then(|| round.target_image().view()),
                candidate_images: (role == Role::Handler).then(|| round.views()),
                match_duration_ms,
            };
            debug!(participant = %member, ?role, "briefing participant");
            self.publish(
                &Scope::Participant(member),
                &MatchEvent::RoundStarted(briefing),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeDelta;
    use serde_json::json;
    use tokio::sync::Barrier;
    use transmission_core::broadcast::Scope;
    use transmission_core::clock::Clock;
    use transmission_core::error::DomainError;
    use transmission_core::ids::{ParticipantId, SessionId};
    use transmission_test_support::{
        ClockedTimer, FailingImageProvider, FixedClock, InstantTimer, ManualClock, MockRng,
        SequenceRng, StaticImageProvider, StepTimer,
    };

    use super::choose_keyword;
    use crate::application::config::MatchConfig;
    use crate::application::session::Session;
    use crate::application::testing::Harness;
    use crate::domain::events::{
        MATCH_ENDED_EVENT, MATCH_FAILED_EVENT, MATCH_STARTING_EVENT, ROUND_STARTED_EVENT,
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    fn new_session<T>(harness: &Harness<T>, config: MatchConfig) -> Arc<Session> {
        Arc::new(Session::new(
            SessionId::new("m1"),
            config,
            harness.services.clone(),
        ))
    }

    /// Drives a stepped two-seat session to the point where roles are briefed
    /// and the pipeline is parked on the match-duration wait.
    async fn live_round(harness: &Harness<StepTimer>) -> Arc<Session> {
        let session = new_session(harness, MatchConfig::default());
        session.join(0, json!({ "name": "A" }), pid("a")).unwrap();
        session.join(0, json!({ "name": "B" }), pid("b")).unwrap();
        harness.timer.wait_for_sleeps(1).await;
        harness.timer.release(1);
        harness.timer.wait_for_sleeps(2).await;
        harness.timer.release(1);
        harness.timer.wait_for_sleeps(3).await;
        session
    }

    #[test]
    fn test_choose_keyword_combines_subject_and_setting() {
        let harness = Harness::new(
            InstantTimer::new(),
            SequenceRng::new(vec![6, 1]),
            Arc::new(StaticImageProvider::with_count(1)),
        );

        assert_eq!(choose_keyword(&harness.services), "lion in forest");
    }

    #[test]
    fn test_choose_keyword_allows_bare_subject() {
        let harness = Harness::new(
            InstantTimer::new(),
            SequenceRng::new(vec![1, 3]),
            Arc::new(StaticImageProvider::with_count(1)),
        );

        assert_eq!(choose_keyword(&harness.services), "monkey");
    }

    #[tokio::test]
    async fn test_full_timeline_announces_briefs_and_times_out() {
        // Arrange
        let harness = Harness::new(
            InstantTimer::new(),
            SequenceRng::new(vec![0, 0, 3]),
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let session = new_session(&harness, MatchConfig::default());

        // Act
        session.join(0, json!({ "name": "A" }), pid("a")).unwrap();
        assert!(session.is_open());
        session.join(0, json!({ "name": "B" }), pid("b")).unwrap();
        tokio::time::timeout(WAIT, harness.broadcaster.wait_for(MATCH_ENDED_EVENT, 1))
            .await
            .unwrap();

        // Assert
        let now = FixedClock::default_instant().0;
        let session_scope = Scope::Session(SessionId::new("m1"));

        let starting = harness.broadcaster.named(MATCH_STARTING_EVENT);
        assert_eq!(starting.len(), 1);
        assert_eq!(starting[0].scope, session_scope);
        let expected_start = now + TimeDelta::seconds(5);
        assert_eq!(
            starting[0].payload["scheduledStart"],
            json!(expected_start)
        );
        assert_eq!(session.scheduled_start(), Some(expected_start));

        let spy = harness.broadcaster.sent_to(&Scope::Participant(pid("a")));
        let spy_round: Vec<_> = spy.iter().filter(|e| e.name == ROUND_STARTED_EVENT).collect();
        assert_eq!(spy_round.len(), 1);
        assert_eq!(spy_round[0].payload["role"], "Spy");
        assert_eq!(spy_round[0].payload["referenceImage"]["index"], 3);
        assert_eq!(
            spy_round[0].payload["referenceImage"]["url"],
            "https://img.test/3.jpg"
        );
        assert_eq!(spy_round[0].payload["matchDurationMs"], 30_000);

        let handler = harness.broadcaster.sent_to(&Scope::Participant(pid("b")));
        let handler_round: Vec<_> = handler
            .iter()
            .filter(|e| e.name == ROUND_STARTED_EVENT)
            .collect();
        assert_eq!(handler_round.len(), 1);
        assert_eq!(handler_round[0].payload["role"], "Handler");
        assert_eq!(
            handler_round[0].payload["candidateImages"]
                .as_array()
                .unwrap()
                .len(),
            10
        );

        let ended = harness.broadcaster.named(MATCH_ENDED_EVENT);
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].scope, session_scope);
        assert_eq!(
            ended[0].payload,
            json!({
                "correct": 3,
                "correctUrl": "https://img.test/3.jpg",
                "keyword": "teacher in black car",
                "timedOut": true,
            })
        );
        assert!(session.is_ended());

        assert_eq!(
            harness.timer.requested(),
            vec![
                Duration::from_secs(1),
                Duration::from_millis(5_100),
                Duration::from_secs(30),
            ]
        );
    }

    #[tokio::test]
    async fn test_operators_receive_role_without_images() {
        let harness = Harness::new(
            InstantTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(4)),
        );
        let config = MatchConfig {
            team_capacity: 3,
            ..MatchConfig::default()
        };
        let session = new_session(&harness, config);
        for id in ["a", "b", "c"] {
            session.join(0, json!({}), pid(id)).unwrap();
        }

        tokio::time::timeout(WAIT, harness.broadcaster.wait_for(MATCH_ENDED_EVENT, 1))
            .await
            .unwrap();

        let operator: Vec<_> = harness
            .broadcaster
            .sent_to(&Scope::Participant(pid("b")))
            .into_iter()
            .filter(|e| e.name == ROUND_STARTED_EVENT)
            .collect();
        assert_eq!(operator.len(), 1);
        assert_eq!(
            operator[0].payload,
            json!({ "role": "Operator", "matchDurationMs": 30_000 })
        );
    }

    #[tokio::test]
    async fn test_first_vote_on_target_wins_and_later_votes_are_rejected() {
        // Arrange
        let harness = Harness::new(
            StepTimer::new(),
            SequenceRng::new(vec![0, 0, 3]),
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let session = live_round(&harness).await;

        // Act
        let receipt = session.submit_vote(&pid("b"), 3).unwrap();
        let late = session.submit_vote(&pid("a"), 3);

        // Assert
        assert!(receipt.decided);
        assert_eq!(receipt.tally, 1);
        assert!(matches!(late.unwrap_err(), DomainError::AlreadyEnded));

        let ended = harness.broadcaster.named(MATCH_ENDED_EVENT);
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].payload["matched"], true);
        assert_eq!(ended[0].payload["timedOut"], false);
        assert_eq!(ended[0].payload["correct"], 3);

        // The timeout finds the match already decided.
        harness.timer.release(1);
        session.take_pipeline().unwrap().await.unwrap();
        assert_eq!(harness.broadcaster.named(MATCH_ENDED_EVENT).len(), 1);
    }

    #[tokio::test]
    async fn test_first_vote_on_wrong_image_ends_unmatched() {
        let harness = Harness::new(
            StepTimer::new(),
            SequenceRng::new(vec![0, 0, 3]),
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let session = live_round(&harness).await;

        let receipt = session.submit_vote(&pid("b"), 7).unwrap();

        assert!(receipt.decided);
        let ended = harness.broadcaster.named(MATCH_ENDED_EVENT);
        assert_eq!(ended[0].payload["matched"], false);
        assert_eq!(ended[0].payload["correct"], 3);
    }

    #[tokio::test]
    async fn test_vote_out_of_range_changes_nothing() {
        let harness = Harness::new(
            StepTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(3)),
        );
        let session = live_round(&harness).await;

        let result = session.submit_vote(&pid("b"), 3);

        assert!(matches!(
            result.unwrap_err(),
            DomainError::OutOfRange { index: 3, len: 3, .. }
        ));
        assert!(!session.is_ended());
        let round = session.round().unwrap();
        assert!(round.images().iter().all(|image| image.votes() == 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_vote_racing_timeout_ends_match_exactly_once() {
        let harness = Harness::new(
            StepTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let session = live_round(&harness).await;
        let pipeline = session.take_pipeline().unwrap();

        let vote = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.submit_vote(&pid("b"), 0) })
        };
        harness.timer.release(1);
        let vote_result = vote.await.unwrap();
        pipeline.await.unwrap();

        assert!(session.is_ended());
        assert_eq!(harness.broadcaster.named(MATCH_ENDED_EVENT).len(), 1);
        if let Ok(receipt) = vote_result {
            let timed_out = harness.broadcaster.named(MATCH_ENDED_EVENT)[0].payload["timedOut"]
                .as_bool()
                .unwrap();
            assert_eq!(receipt.decided, !timed_out);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_never_lose_tallies() {
        let harness = Harness::new(
            StepTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let session = live_round(&harness).await;
        let voters = 16;
        let barrier = Arc::new(Barrier::new(voters));

        let handles: Vec<_> = (0..voters)
            .map(|i| {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    session.submit_vote(&pid(&format!("v{i}")), 2)
                })
            })
            .collect();
        let mut accepted = 0u32;
        let mut decided = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => {
                    accepted += 1;
                    if receipt.decided {
                        decided += 1;
                    }
                }
                Err(err) => assert!(matches!(err, DomainError::AlreadyEnded)),
            }
        }

        let round = session.round().unwrap();
        assert_eq!(round.images()[2].votes(), accepted);
        assert!(accepted >= 1);
        assert_eq!(decided, 1);
        assert_eq!(harness.broadcaster.named(MATCH_ENDED_EVENT).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_start_the_pipeline_once() {
        // Arrange
        let harness = Harness::new(
            InstantTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(10)),
        );
        let config = MatchConfig {
            team_count: 4,
            ..MatchConfig::default()
        };
        let session = new_session(&harness, config);
        let joiners = 8;
        let barrier = Arc::new(Barrier::new(joiners));

        // Act
        let handles: Vec<_> = (0..joiners)
            .map(|i| {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    session.join(i / 2, json!({ "n": i }), pid(&format!("p{i}")))
                })
            })
            .collect();
        let mut triggered = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().pipeline_triggered {
                triggered += 1;
            }
        }
        tokio::time::timeout(WAIT, harness.broadcaster.wait_for(MATCH_ENDED_EVENT, 1))
            .await
            .unwrap();

        // Assert
        assert_eq!(triggered, 1);
        assert_eq!(harness.broadcaster.named(MATCH_STARTING_EVENT).len(), 1);
        assert_eq!(harness.broadcaster.named(ROUND_STARTED_EVENT).len(), joiners);
        assert_eq!(harness.broadcaster.named(MATCH_ENDED_EVENT).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_image_search_ends_session_with_failure_notice() {
        // Arrange
        let harness = Harness::new(InstantTimer::new(), MockRng, Arc::new(FailingImageProvider));
        let session = new_session(&harness, MatchConfig::default());

        // Act
        session.join(0, json!({}), pid("a")).unwrap();
        session.join(0, json!({}), pid("b")).unwrap();
        session.take_pipeline().unwrap().await.unwrap();

        // Assert
        assert!(session.is_ended());
        assert!(session.round().is_none());
        let failed = harness.broadcaster.named(MATCH_FAILED_EVENT);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].scope, Scope::Session(SessionId::new("m1")));
        assert!(
            failed[0].payload["reason"]
                .as_str()
                .unwrap()
                .contains("connection refused")
        );
        assert!(harness.broadcaster.named(ROUND_STARTED_EVENT).is_empty());
        assert!(harness.broadcaster.named(MATCH_ENDED_EVENT).is_empty());
        assert_eq!(harness.timer.requested(), vec![Duration::from_secs(1)]);

        assert!(matches!(
            session.join(0, json!({}), pid("c")).unwrap_err(),
            DomainError::AlreadyEnded
        ));
        assert!(matches!(
            session.submit_command(&pid("a"), json!([1])).await.unwrap_err(),
            DomainError::AlreadyEnded
        ));
    }

    #[tokio::test]
    async fn test_empty_image_search_is_a_pipeline_failure() {
        let harness = Harness::new(
            InstantTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::new(Vec::new())),
        );
        let session = new_session(&harness, MatchConfig::default());

        session.join(0, json!({}), pid("a")).unwrap();
        session.join(0, json!({}), pid("b")).unwrap();
        session.take_pipeline().unwrap().await.unwrap();

        let failed = harness.broadcaster.named(MATCH_FAILED_EVENT);
        assert_eq!(failed.len(), 1);
        assert!(
            failed[0].payload["reason"]
                .as_str()
                .unwrap()
                .contains("no images found")
        );
    }

    #[tokio::test]
    async fn test_roles_are_briefed_start_delay_plus_lag_after_announcement() {
        // Arrange
        let clock = Arc::new(ManualClock::default());
        let harness = Harness::with_clock(
            ClockedTimer::new(Arc::clone(&clock)),
            MockRng,
            Arc::new(StaticImageProvider::with_count(4)),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let session = new_session(&harness, MatchConfig::default());
        let filled_at = FixedClock::default_instant().0;

        // Act
        session.join(0, json!({}), pid("a")).unwrap();
        session.join(0, json!({}), pid("b")).unwrap();
        session.take_pipeline().unwrap().await.unwrap();

        // Assert
        let announced = harness.broadcaster.named(MATCH_STARTING_EVENT)[0].at.unwrap();
        let briefed = harness.broadcaster.named(ROUND_STARTED_EVENT);
        assert_eq!(briefed.len(), 2);
        let ended = harness.broadcaster.named(MATCH_ENDED_EVENT)[0].at.unwrap();

        assert_eq!(announced - filled_at, TimeDelta::seconds(1));
        for briefing in &briefed {
            assert_eq!(
                briefing.at.unwrap() - announced,
                TimeDelta::milliseconds(5_100)
            );
        }
        assert_eq!(ended - briefed[0].at.unwrap(), TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn test_vote_before_briefing_ends_match_without_briefing() {
        // Arrange
        let harness = Harness::new(
            StepTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(4)),
        );
        let session = new_session(&harness, MatchConfig::default());
        session.join(0, json!({}), pid("a")).unwrap();
        session.join(0, json!({}), pid("b")).unwrap();
        harness.timer.wait_for_sleeps(1).await;
        harness.timer.release(1);
        harness.timer.wait_for_sleeps(2).await;

        // Act
        let receipt = session.submit_vote(&pid("b"), 0).unwrap();
        harness.timer.release(1);
        session.take_pipeline().unwrap().await.unwrap();

        // Assert
        assert!(receipt.decided);
        assert!(harness.broadcaster.named(ROUND_STARTED_EVENT).is_empty());
        assert_eq!(harness.broadcaster.named(MATCH_ENDED_EVENT).len(), 1);
        assert_eq!(harness.timer.requested().len(), 2);
    }
}
