//! [`QuizFlow`] – question/answer pacing on top of a [`PalaceStore`].
//!
//! The store only knows how to score an answer and move the index.  The flow
//! adds the per-question state machine a front end needs:
//!
//! ```text
//!  Idle ──start──▶ AwaitingSelection ──on_selection──▶ ShowingResult
//!                        ▲                                   │
//!                        └────────── advance (not last) ─────┤
//!                                                            │
//!  Idle ◀──────────────── advance (last) / cancel ───────────┘
//! ```
//!
//! Selections made while a result is showing are ignored.  The result stays
//! up for a fixed delay ([`DEFAULT_RESULT_DELAY`] unless configured); callers
//! pass `now` explicitly so deadlines are deterministic under test.
//!
//! A question whose target object was deleted after the quiz started cannot
//! be answered.  The flow skips such questions without scoring them and
//! completes the quiz when no answerable question remains.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use palace_types::{Mode, QuizSession};
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::PalaceStore;

/// How long a verdict is shown before the next question.
pub const DEFAULT_RESULT_DELAY: Duration = Duration::from_millis(2000);

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// The outcome of one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub expected_id: String,
    /// Title of the object that was asked for.
    pub expected_title: Option<String>,
    pub selected_id: String,
}

/// Where the current question stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuestionPhase {
    /// No quiz is being driven.
    #[default]
    Idle,
    AwaitingSelection,
    /// A verdict is on screen until the flow's deadline.
    ShowingResult(Verdict),
}

/// What [`QuizFlow::advance`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Nothing to advance.
    Idle,
    /// Moved to question `index` (0-based).
    Next { index: usize },
    /// The quiz finished and was recorded.
    Completed(QuizSession),
}

// ─────────────────────────────────────────────────────────────────────────────
// QuizFlow
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a [`PalaceStore`] quiz one question at a time.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use palace_store::{Advance, PalaceStore, QuizFlow};
///
/// let mut store = PalaceStore::in_memory();
/// store.create_palace("Solo", "zen-garden");
/// let id = store.add_object("flower", [0.0, 0.0, 0.0]).unwrap();
///
/// let mut flow = QuizFlow::new(Duration::from_millis(10));
/// assert!(flow.start(&mut store));
///
/// let t0 = Instant::now();
/// let verdict = flow.on_selection(&mut store, &id, t0).unwrap();
/// assert!(verdict.correct);
///
/// let done = flow.advance_due(&mut store, t0 + Duration::from_millis(10));
/// assert!(matches!(done, Advance::Completed(s) if s.score == 1));
/// ```
#[derive(Debug, Clone)]
pub struct QuizFlow {
    delay: Duration,
    phase: QuestionPhase,
    deadline: Option<Instant>,
}

impl Default for QuizFlow {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_DELAY)
    }
}

impl QuizFlow {
    /// A flow that shows each verdict for `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            phase: QuestionPhase::Idle,
            deadline: None,
        }
    }

    pub fn phase(&self) -> &QuestionPhase {
        &self.phase
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// When the current verdict expires, if one is showing.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Start a quiz over the current room.  Returns `false` when the store
    /// refused (no room, or no objects).
    pub fn start(&mut self, store: &mut PalaceStore) -> bool {
        store.start_quiz();
        if store.quiz_session().is_none() {
            self.reset();
            return false;
        }
        self.phase = QuestionPhase::AwaitingSelection;
        self.deadline = None;
        true
    }

    /// Answer the current question by selecting `object_id`.
    ///
    /// Ignored (returns `None`) unless the store is in quiz mode, the flow is
    /// awaiting a selection and `object_id` names an object in the current
    /// room.  Otherwise the object is selected, the answer scored, and the
    /// verdict shown until `now + delay`.
    ///
    /// If the current question's target has disappeared, the flow first
    /// skips to the next answerable question and scores the selection
    /// against that one.  When no answerable question remains the quiz is
    /// completed and `None` is returned.
    pub fn on_selection(
        &mut self,
        store: &mut PalaceStore,
        object_id: &str,
        now: Instant,
    ) -> Option<Verdict> {
        self.sync(store);
        if store.mode() != Mode::Quiz || self.phase != QuestionPhase::AwaitingSelection {
            debug!(object_id, "selection ignored outside an open question");
            return None;
        }
        if store.quiz_target().is_none()
            && !matches!(self.skip_dangling(store), Advance::Next { .. })
        {
            debug!(object_id, "selection ignored: no answerable question left");
            return None;
        }
        if store.current_room()?.object(object_id).is_none() {
            debug!(object_id, "selection ignored: no such object");
            return None;
        }

        let expected_id = store.quiz_session()?.current_object_id()?.to_string();
        let expected_title = store.quiz_target().map(|o| o.title.clone());
        let correct = object_id == expected_id;

        store.select_object(Some(object_id));
        store.update_quiz_score(correct);

        let verdict = Verdict {
            correct,
            expected_id,
            expected_title,
            selected_id: object_id.to_string(),
        };
        self.phase = QuestionPhase::ShowingResult(verdict.clone());
        self.deadline = Some(now + self.delay);
        Some(verdict)
    }

    /// Advance if the verdict deadline has passed at `now`.
    pub fn advance_due(&mut self, store: &mut PalaceStore, now: Instant) -> Advance {
        match self.deadline {
            Some(deadline) if now >= deadline => self.advance(store),
            _ => Advance::Idle,
        }
    }

    /// Leave the verdict and move to the next answerable question, or
    /// complete the quiz after the last one.
    pub fn advance(&mut self, store: &mut PalaceStore) -> Advance {
        self.deadline = None;
        let Some(session) = store.quiz_session() else {
            self.reset();
            return Advance::Idle;
        };
        if session.is_last() {
            return self.finish(store);
        }
        store.next_quiz_object();
        self.phase = QuestionPhase::AwaitingSelection;
        self.skip_dangling(store)
    }

    /// Skip questions whose target no longer exists in the current room.
    ///
    /// Returns where the quiz ended up: the first answerable question, or
    /// the recorded session if none remained.
    pub fn skip_dangling(&mut self, store: &mut PalaceStore) -> Advance {
        loop {
            let Some(session) = store.quiz_session() else {
                self.reset();
                return Advance::Idle;
            };
            if store.quiz_target().is_some() {
                return Advance::Next {
                    index: session.current_index,
                };
            }
            warn!(
                quiz_id = %session.id,
                index = session.current_index,
                "quiz target no longer exists; skipping question"
            );
            if session.is_last() {
                return self.finish(store);
            }
            store.next_quiz_object();
        }
    }

    /// Stop driving the quiz.  Any pending verdict deadline is dropped; the
    /// store's session is left for the caller to close.
    pub fn cancel(&mut self) {
        if self.phase != QuestionPhase::Idle {
            debug!("quiz flow cancelled");
        }
        self.reset();
    }

    /// Cancel the flow and abandon the store's quiz by returning to explore
    /// mode.  The session is not recorded.
    pub fn close(&mut self, store: &mut PalaceStore) {
        self.cancel();
        if store.mode() == Mode::Quiz {
            store.set_mode(Mode::Explore);
        }
    }

    /// Drop flow state the store no longer backs, e.g. after a palace load.
    pub fn sync(&mut self, store: &PalaceStore) {
        if store.quiz_session().is_none() && self.phase != QuestionPhase::Idle {
            self.reset();
        }
    }

    fn finish(&mut self, store: &mut PalaceStore) -> Advance {
        self.reset();
        match store.complete_quiz() {
            Some(session) => Advance::Completed(session),
            None => Advance::Idle,
        }
    }

    fn reset(&mut self) {
        self.phase = QuestionPhase::Idle;
        self.deadline = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// QuizProgress
// ─────────────────────────────────────────────────────────────────────────────

/// A snapshot of the running quiz for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizProgress {
    /// Title of the object to find; `None` for a dangling question.
    pub title: Option<String>,
    /// The target's note, when it has one.
    pub note: Option<String>,
    /// 1-based question number.
    pub number: usize,
    pub total: usize,
    pub score: u32,
    pub mistakes: u32,
    /// `number / total * 100`.
    pub percent: f64,
    pub elapsed_secs: i64,
}

impl QuizProgress {
    /// Progress of the store's running quiz as of `now`.
    pub fn from_store(store: &PalaceStore, now: DateTime<Utc>) -> Option<Self> {
        let session = store.quiz_session()?;
        if session.is_empty() {
            return None;
        }
        let target = store.quiz_target();
        let number = session.current_index + 1;
        let total = session.len();
        Some(Self {
            title: target.map(|o| o.title.clone()),
            note: target
                .filter(|o| !o.note.is_empty())
                .map(|o| o.note.clone()),
            number,
            total,
            score: session.score,
            mistakes: session.mistakes,
            percent: number as f64 / total as f64 * 100.0,
            elapsed_secs: (now - session.start_time).num_seconds().max(0),
        })
    }

    /// Elapsed time as `m:ss`.
    pub fn elapsed(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }
}

/// Format whole seconds as `m:ss`.
pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ─────────────────────────────────────────────────────────────────────────────
// QuizStats
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregates over the completed-quiz log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuizStats {
    pub sessions: usize,
    pub total_correct: u32,
    pub total_mistakes: u32,
    /// Correct answers over all answers, in percent.  `0.0` with no answers.
    pub accuracy: f64,
    /// Best single-session score.
    pub best_score: u32,
}

impl QuizStats {
    pub fn from_results(results: &[QuizSession]) -> Self {
        Self::aggregate(results.iter())
    }

    /// Statistics restricted to quizzes taken in `palace_id`.
    pub fn for_palace(results: &[QuizSession], palace_id: &str) -> Self {
        Self::aggregate(results.iter().filter(|s| s.palace_id == palace_id))
    }

    fn aggregate<'a>(results: impl Iterator<Item = &'a QuizSession>) -> Self {
        let mut stats = Self::default();
        for session in results {
            stats.sessions += 1;
            stats.total_correct += session.score;
            stats.total_mistakes += session.mistakes;
            stats.best_score = stats.best_score.max(session.score);
        }
        let answered = stats.total_correct + stats.total_mistakes;
        if answered > 0 {
            stats.accuracy = f64::from(stats.total_correct) / f64::from(answered) * 100.0;
        }
        stats
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use palace_storage::PalaceRepository;
    use palace_types::ObjectPatch;

    const DELAY: Duration = Duration::from_millis(2000);

    fn quiz_store(titles: &[&str]) -> (PalaceStore, Vec<String>) {
        let mut store = PalaceStore::with_seed(PalaceRepository::in_memory(), 11);
        store.create_palace("Quiz Palace", "medieval-castle");
        let ids = titles
            .iter()
            .map(|title| {
                let id = store.add_object("gem", [0.0, 0.0, 0.0]).unwrap();
                store.update_object(&id, &ObjectPatch::new().title(*title));
                id
            })
            .collect();
        (store, ids)
    }

    fn target(store: &PalaceStore) -> String {
        store.quiz_session().unwrap().current_object_id().unwrap().to_string()
    }

    fn wrong_answer(store: &PalaceStore, ids: &[String]) -> String {
        let expected = target(store);
        ids.iter().find(|id| **id != expected).unwrap().clone()
    }

    #[test]
    fn start_on_empty_room_fails() {
        let (mut store, _) = quiz_store(&[]);
        let mut flow = QuizFlow::new(DELAY);
        assert!(!flow.start(&mut store));
        assert_eq!(flow.phase(), &QuestionPhase::Idle);
    }

    #[test]
    fn correct_answer_scores_and_waits_for_deadline() {
        let (mut store, _) = quiz_store(&["Sword", "Gem"]);
        let mut flow = QuizFlow::new(DELAY);
        assert!(flow.start(&mut store));
        let t0 = Instant::now();

        let expected = target(&store);
        let verdict = flow.on_selection(&mut store, &expected, t0).unwrap();
        assert!(verdict.correct);
        assert_eq!(store.quiz_session().unwrap().score, 1);
        assert_eq!(flow.deadline(), Some(t0 + DELAY));

        assert_eq!(
            flow.advance_due(&mut store, t0 + Duration::from_millis(1999)),
            Advance::Idle
        );
        assert_eq!(store.quiz_session().unwrap().current_index, 0);

        assert_eq!(flow.advance_due(&mut store, t0 + DELAY), Advance::Next { index: 1 });
        assert_eq!(flow.phase(), &QuestionPhase::AwaitingSelection);
        assert!(flow.deadline().is_none());
    }

    #[test]
    fn wrong_answer_reports_expected_title() {
        let (mut store, ids) = quiz_store(&["Sword", "Gem"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let expected = target(&store);
        let expected_title = store.quiz_target().unwrap().title.clone();
        let wrong = wrong_answer(&store, &ids);

        let verdict = flow.on_selection(&mut store, &wrong, Instant::now()).unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.expected_id, expected);
        assert_eq!(verdict.expected_title.as_deref(), Some(expected_title.as_str()));
        assert_eq!(verdict.selected_id, wrong);
        let session = store.quiz_session().unwrap();
        assert_eq!(session.mistakes, 1);
        assert_eq!(session.score, 0);
        assert_eq!(store.selected_object().unwrap().id, wrong);
    }

    #[test]
    fn selections_during_result_are_ignored() {
        let (mut store, ids) = quiz_store(&["A", "B", "C"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let t0 = Instant::now();
        let expected = target(&store);
        flow.on_selection(&mut store, &expected, t0).unwrap();

        assert!(flow.on_selection(&mut store, &ids[0], t0).is_none());
        let session = store.quiz_session().unwrap();
        assert_eq!(session.score + session.mistakes, 1);
    }

    #[test]
    fn unknown_object_is_not_an_answer() {
        let (mut store, _) = quiz_store(&["A"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        assert!(flow.on_selection(&mut store, "obj-nowhere", Instant::now()).is_none());
        assert_eq!(flow.phase(), &QuestionPhase::AwaitingSelection);
        assert_eq!(store.quiz_session().unwrap().mistakes, 0);
    }

    #[test]
    fn full_run_completes_and_records() {
        let (mut store, ids) = quiz_store(&["A", "B"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let mut now = Instant::now();

        let expected = target(&store);
        flow.on_selection(&mut store, &expected, now);
        now += DELAY;
        flow.advance_due(&mut store, now);

        let wrong = wrong_answer(&store, &ids);
        flow.on_selection(&mut store, &wrong, now);
        now += DELAY;
        let Advance::Completed(session) = flow.advance_due(&mut store, now) else {
            panic!("quiz should have completed");
        };
        assert_eq!(session.score, 1);
        assert_eq!(session.mistakes, 1);
        assert!(session.end_time.is_some());
        assert_eq!(store.mode(), Mode::Explore);
        assert_eq!(flow.phase(), &QuestionPhase::Idle);
        assert_eq!(store.quiz_results().len(), 1);
    }

    #[test]
    fn cancel_drops_pending_deadline() {
        let (mut store, _) = quiz_store(&["A", "B"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let t0 = Instant::now();
        let expected = target(&store);
        flow.on_selection(&mut store, &expected, t0);

        flow.close(&mut store);
        assert!(flow.deadline().is_none());
        assert_eq!(flow.advance_due(&mut store, t0 + DELAY), Advance::Idle);
        assert!(store.quiz_session().is_none());
        assert!(store.quiz_results().is_empty());
        assert_eq!(store.mode(), Mode::Explore);
    }

    #[test]
    fn deleted_targets_are_skipped_without_scoring() {
        let (mut store, _) = quiz_store(&["A", "B", "C"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let order = store.quiz_session().unwrap().objects.clone();
        store.delete_object(&order[1]);

        let t0 = Instant::now();
        flow.on_selection(&mut store, &order[0], t0);
        assert_eq!(flow.advance_due(&mut store, t0 + DELAY), Advance::Next { index: 2 });
        let session = store.quiz_session().unwrap();
        assert_eq!(session.score, 1);
        assert_eq!(session.mistakes, 0);
    }

    #[test]
    fn target_deleted_while_awaiting_is_skipped_not_scored() {
        let (mut store, _) = quiz_store(&["A", "B", "C"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let order = store.quiz_session().unwrap().objects.clone();
        store.delete_object(&order[0]);

        let verdict = flow.on_selection(&mut store, &order[1], Instant::now()).unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.expected_id, order[1]);
        let session = store.quiz_session().unwrap();
        assert_eq!(session.current_index, 1);
        assert_eq!(session.score, 1);
        assert_eq!(session.mistakes, 0);
    }

    #[test]
    fn selection_with_only_dangling_questions_left_completes() {
        let (mut store, _) = quiz_store(&["A", "B"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let order = store.quiz_session().unwrap().objects.clone();
        store.delete_object(&order[0]);
        store.delete_object(&order[1]);
        let extra = store.add_object("key", [1.0, 0.0, 0.0]).unwrap();

        assert!(flow.on_selection(&mut store, &extra, Instant::now()).is_none());
        assert_eq!(flow.phase(), &QuestionPhase::Idle);
        assert!(store.quiz_session().is_none());
        let results = store.quiz_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score + results[0].mistakes, 0);
    }

    #[test]
    fn dangling_tail_completes_the_quiz() {
        let (mut store, _) = quiz_store(&["A", "B", "C"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        let order = store.quiz_session().unwrap().objects.clone();
        store.delete_object(&order[1]);
        store.delete_object(&order[2]);

        let t0 = Instant::now();
        flow.on_selection(&mut store, &order[0], t0);
        let Advance::Completed(session) = flow.advance_due(&mut store, t0 + DELAY) else {
            panic!("quiz should have completed");
        };
        assert_eq!(session.score, 1);
        assert_eq!(session.objects.len(), 3);
    }

    #[test]
    fn sync_resets_after_store_leaves_quiz() {
        let (mut store, _) = quiz_store(&["A"]);
        let mut flow = QuizFlow::new(DELAY);
        flow.start(&mut store);
        store.set_mode(Mode::Edit);
        flow.sync(&store);
        assert_eq!(flow.phase(), &QuestionPhase::Idle);
    }

    #[test]
    fn progress_reports_position_and_time() {
        let (mut store, ids) = quiz_store(&["A", "B", "C", "D"]);
        store.update_object(&ids[0], &ObjectPatch::new().note("first note"));
        store.start_quiz();
        let start = store.quiz_session().unwrap().start_time;

        let progress =
            QuizProgress::from_store(&store, start + chrono::Duration::seconds(75)).unwrap();
        assert_eq!(progress.number, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percent, 25.0);
        assert_eq!(progress.elapsed(), "1:15");
        assert_eq!(progress.title.as_deref(), store.quiz_target().map(|o| o.title.as_str()));
        let expects_note = target(&store) == ids[0];
        assert_eq!(progress.note.is_some(), expects_note);
    }

    #[test]
    fn progress_without_quiz_is_none() {
        let (store, _) = quiz_store(&["A"]);
        assert!(QuizProgress::from_store(&store, Utc::now()).is_none());
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(9), "0:09");
        assert_eq!(format_elapsed(600), "10:00");
        assert_eq!(format_elapsed(-5), "0:00");
    }

    #[test]
    fn stats_aggregate_results() {
        let mut a = QuizSession::new("palace-a", vec!["x".into(), "y".into(), "z".into()]);
        a.score = 3;
        let mut b = QuizSession::new("palace-b", vec!["x".into(), "y".into()]);
        b.score = 1;
        b.mistakes = 2;
        let results = vec![a, b];

        let all = QuizStats::from_results(&results);
        assert_eq!(all.sessions, 2);
        assert_eq!(all.total_correct, 4);
        assert_eq!(all.total_mistakes, 2);
        assert_eq!(all.best_score, 3);
        assert!((all.accuracy - 66.666).abs() < 0.01);

        let only_b = QuizStats::for_palace(&results, "palace-b");
        assert_eq!(only_b.sessions, 1);
        assert_eq!(only_b.best_score, 1);
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        assert_eq!(QuizStats::from_results(&[]), QuizStats::default());
    }
}
