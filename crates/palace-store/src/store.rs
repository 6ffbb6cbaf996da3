//! [`PalaceStore`] – the single owner of the application state.
//!
//! The store holds the current palace, the selected object, the interaction
//! mode, the placement state and the running quiz session.  Commands keep
//! these invariants:
//!
//! - the current room is always derived from the current palace's
//!   `current_room` id, which always names one of its rooms;
//! - a selection, when present, names an object in the current room;
//! - a quiz session exists exactly while the mode is [`Mode::Quiz`].
//!
//! Unknown ids and empty preconditions make a command a silent no-op.
//! Durable-storage failures are logged and swallowed; only
//! [`PalaceStore::import_palace`] reports a failure to its caller.
//!
//! # Example
//!
//! ```rust
//! use palace_store::PalaceStore;
//! use palace_types::{Mode, ObjectPatch};
//!
//! let mut store = PalaceStore::in_memory();
//! store.create_palace("Kings of England", "medieval-castle");
//! assert_eq!(store.mode(), Mode::Edit);
//!
//! let id = store.add_object("crown", [0.0, 1.0, 0.0]).unwrap();
//! store.update_object(&id, &ObjectPatch::new().title("William I"));
//! assert_eq!(store.selected_object().unwrap().title, "William I");
//!
//! store.delete_object(&id);
//! assert!(store.selected_object().is_none());
//! ```

use chrono::Utc;
use palace_storage::{PalaceRepository, PalaceSummary};
use palace_types::{
    MemoryObject, MemoryPalace, ModelError, Mode, ObjectPatch, QuizSession, Room, Vec3, catalog,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{StoreEvent, StoreEvents};
use crate::quiz::QuizStats;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Why an import was rejected.  State is untouched in every case.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Malformed palace JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid palace: {0}")]
    Invalid(#[from] ModelError),
}

// ─────────────────────────────────────────────────────────────────────────────
// PalaceStore
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory application state backed by a durable [`PalaceRepository`].
pub struct PalaceStore {
    palace: Option<MemoryPalace>,
    selected: Option<String>,
    mode: Mode,
    is_placing: bool,
    placing_object_type: Option<String>,
    quiz: Option<QuizSession>,
    repo: PalaceRepository,
    events: StoreEvents,
    rng: StdRng,
}

impl PalaceStore {
    /// A store over `repo` with an entropy-seeded shuffle.
    pub fn new(repo: PalaceRepository) -> Self {
        Self::with_rng(repo, StdRng::from_entropy())
    }

    /// A store whose quiz shuffles are reproducible from `seed`.
    pub fn with_seed(repo: PalaceRepository, seed: u64) -> Self {
        Self::with_rng(repo, StdRng::seed_from_u64(seed))
    }

    /// A store whose durable state vanishes on drop.
    pub fn in_memory() -> Self {
        Self::new(PalaceRepository::in_memory())
    }

    fn with_rng(repo: PalaceRepository, rng: StdRng) -> Self {
        Self {
            palace: None,
            selected: None,
            mode: Mode::Explore,
            is_placing: false,
            placing_object_type: None,
            quiz: None,
            repo,
            events: StoreEvents::default(),
            rng,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn current_palace(&self) -> Option<&MemoryPalace> {
        self.palace.as_ref()
    }

    /// The active room, derived from the current palace.
    pub fn current_room(&self) -> Option<&Room> {
        let palace = self.palace.as_ref()?;
        palace.room(&palace.current_room)
    }

    /// The selected object as it currently exists in the active room.
    pub fn selected_object(&self) -> Option<&MemoryObject> {
        let id = self.selected.as_deref()?;
        self.current_room()?.object(id)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_placing(&self) -> bool {
        self.is_placing
    }

    pub fn placing_object_type(&self) -> Option<&str> {
        self.placing_object_type.as_deref()
    }

    pub fn quiz_session(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    /// The object the current quiz question asks for.
    ///
    /// `None` when no quiz is running, or when the target was deleted after
    /// the quiz started (a dangling question).
    pub fn quiz_target(&self) -> Option<&MemoryObject> {
        let id = self.quiz.as_ref()?.current_object_id()?;
        self.current_room()?.object(id)
    }

    /// Summaries of every durably saved palace.
    pub fn saved_palaces(&self) -> Vec<PalaceSummary> {
        self.repo.summaries()
    }

    /// A durably saved palace by identity.
    pub fn find_saved_palace(&self, id: &str) -> Option<MemoryPalace> {
        self.repo.find_palace(id)
    }

    /// Every completed quiz in the results log.
    pub fn quiz_results(&self) -> Vec<QuizSession> {
        self.repo.quiz_results()
    }

    /// Aggregate statistics over the results log.
    pub fn quiz_stats(&self) -> QuizStats {
        QuizStats::from_results(&self.repo.quiz_results())
    }

    pub fn repository(&self) -> &PalaceRepository {
        &self.repo
    }

    /// Receive a [`StoreEvent`] for every subsequent state change.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Palace lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a palace with one room built from `template_id` (the first
    /// template when the id is unknown), make it current, switch to edit
    /// mode and append it to the durable collection.
    ///
    /// Returns the new palace's identity.
    pub fn create_palace(&mut self, name: &str, template_id: &str) -> String {
        let template = catalog::room_template(template_id);
        if template.id.as_str() != template_id {
            debug!(template_id, fallback = %template.id, "unknown room template; using fallback");
        }
        let palace = MemoryPalace::new(name, Room::from_template(template));
        let id = palace.id.clone();

        if let Err(e) = self.repo.append_palace(&palace) {
            warn!(palace_id = %id, error = %e, "failed to persist new palace");
        }
        info!(palace_id = %id, name, template = %template.id, "palace created");

        self.palace = Some(palace);
        self.set_selection(None);
        self.enter_mode(Mode::Edit);
        self.events.publish(StoreEvent::PalaceChanged { palace_id: id.clone() });
        id
    }

    /// Make `palace` current, resolving its declared current room (falling
    /// back to the first room), clearing the selection and switching to
    /// explore mode.
    ///
    /// A palace without rooms cannot satisfy the model and is ignored.
    pub fn load_palace(&mut self, mut palace: MemoryPalace) {
        let Some(room_id) = palace.resolve_current_room().map(|r| r.id.clone()) else {
            warn!(palace_id = %palace.id, "load_palace: palace has no rooms; ignoring");
            return;
        };
        palace.current_room = room_id;
        let id = palace.id.clone();
        info!(palace_id = %id, room_id = %palace.current_room, "palace loaded");

        self.palace = Some(palace);
        self.set_selection(None);
        self.enter_mode(Mode::Explore);
        self.events.publish(StoreEvent::PalaceChanged { palace_id: id });
    }

    /// Stamp the current palace's last-modified time and upsert it into the
    /// durable collection.  No-op without a current palace.
    pub fn save_palace(&mut self) {
        let Some(palace) = self.palace.as_mut() else {
            debug!("save_palace: no current palace");
            return;
        };
        palace.last_modified = Utc::now();
        match self.repo.upsert_palace(palace) {
            Ok(inserted) => info!(palace_id = %palace.id, inserted, "palace saved"),
            Err(e) => warn!(palace_id = %palace.id, error = %e, "failed to save palace"),
        }
        let id = palace.id.clone();
        self.events.publish(StoreEvent::PalaceChanged { palace_id: id });
    }

    /// Remove a palace from the durable collection only.  The in-memory
    /// current palace is left alone even if it is the one deleted.
    ///
    /// Returns `true` if a saved palace was removed.
    pub fn delete_palace(&mut self, id: &str) -> bool {
        match self.repo.delete_palace(id) {
            Ok(removed) => {
                if removed {
                    info!(palace_id = id, "palace deleted");
                }
                removed
            }
            Err(e) => {
                warn!(palace_id = id, error = %e, "failed to delete palace");
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rooms
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `room_id` the active room and clear the selection.  No-op when
    /// there is no current palace or it has no such room.
    pub fn switch_room(&mut self, room_id: &str) {
        let Some(palace) = self.palace.as_mut() else {
            debug!(room_id, "switch_room: no current palace");
            return;
        };
        if palace.room(room_id).is_none() {
            debug!(room_id, "switch_room: no such room");
            return;
        }
        palace.current_room = room_id.to_string();
        self.set_selection(None);
        self.events.publish(StoreEvent::RoomChanged {
            room_id: room_id.to_string(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Objects
    // ─────────────────────────────────────────────────────────────────────────

    /// Place a new object of `object_type` at `position` in the active room,
    /// select it and leave placing mode.
    ///
    /// Returns the new object's identity, or `None` without a current room.
    pub fn add_object(&mut self, object_type: &str, position: Vec3) -> Option<String> {
        let Some(room) = self.current_room_mut() else {
            debug!(object_type, "add_object: no current room");
            return None;
        };
        let mut object = MemoryObject::new(object_type, position);
        while room.object(&object.id).is_some() {
            object.id = palace_types::new_id("obj");
        }
        let id = object.id.clone();
        let room_id = room.id.clone();
        room.objects.push(object);
        debug!(object_id = %id, object_type, room_id = %room_id, "object placed");

        self.events.publish(StoreEvent::ObjectsChanged { room_id });
        self.set_selection(Some(id.clone()));
        self.set_placing_state(false, None);
        Some(id)
    }

    /// Merge `patch` into the object `id` of the active room and select the
    /// merged object.
    ///
    /// Returns `false` (and changes nothing) if the object is not found.
    pub fn update_object(&mut self, id: &str, patch: &ObjectPatch) -> bool {
        let Some(room) = self.current_room_mut() else {
            debug!(object_id = id, "update_object: no current room");
            return false;
        };
        let Some(object) = room.object_mut(id) else {
            debug!(object_id = id, "update_object: no such object");
            return false;
        };
        patch.apply_to(object);
        let room_id = room.id.clone();

        self.events.publish(StoreEvent::ObjectsChanged { room_id });
        self.set_selection(Some(id.to_string()));
        true
    }

    /// Remove the object `id` from the active room.  The selection is
    /// cleared whether or not the removed object was the selected one.
    pub fn delete_object(&mut self, id: &str) {
        let Some(room) = self.current_room_mut() else {
            debug!(object_id = id, "delete_object: no current room");
            return;
        };
        let before = room.objects.len();
        room.objects.retain(|o| o.id != id);
        let removed = room.objects.len() != before;
        let room_id = room.id.clone();
        if removed {
            debug!(object_id = id, room_id = %room_id, "object deleted");
            self.events.publish(StoreEvent::ObjectsChanged { room_id });
        }
        self.set_selection(None);
    }

    /// Select the object `id` of the active room, or clear the selection when
    /// `id` is `None` or not found.  No-op without a current room.
    pub fn select_object(&mut self, id: Option<&str>) {
        let Some(room) = self.current_room() else {
            debug!("select_object: no current room");
            return;
        };
        let selection = id
            .and_then(|id| room.object(id))
            .map(|o| o.id.clone());
        self.set_selection(selection);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mode & placement
    // ─────────────────────────────────────────────────────────────────────────

    /// Switch mode, always clearing the selection and cancelling placement.
    ///
    /// Quiz mode can only be entered through [`start_quiz`](Self::start_quiz);
    /// requesting it here without a running session leaves the mode as is.
    /// Leaving quiz mode abandons the running session without logging it.
    pub fn set_mode(&mut self, mode: Mode) {
        self.set_selection(None);
        self.set_placing_state(false, None);
        if mode == Mode::Quiz && self.quiz.is_none() {
            debug!("set_mode: quiz mode requires a running quiz; ignoring");
            return;
        }
        self.enter_mode(mode);
    }

    /// Enter or leave placing state.  The recorded object type is `None`
    /// when `placing` is false or no type is given.
    pub fn set_placing(&mut self, placing: bool, object_type: Option<&str>) {
        let object_type = if placing {
            object_type.map(str::to_string)
        } else {
            None
        };
        self.set_placing_state(placing, object_type);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Quiz
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a quiz over a uniformly shuffled snapshot of the active room's
    /// objects.  No-op without a current room or when the room is empty.
    pub fn start_quiz(&mut self) {
        let Some(palace) = self.palace.as_ref() else {
            debug!("start_quiz: no current palace");
            return;
        };
        let Some(room) = palace.room(&palace.current_room) else {
            debug!("start_quiz: no current room");
            return;
        };
        if room.objects.is_empty() {
            debug!(room_id = %room.id, "start_quiz: room has no objects");
            return;
        }
        let mut ids: Vec<String> = room.objects.iter().map(|o| o.id.clone()).collect();
        ids.shuffle(&mut self.rng);
        let session = QuizSession::new(&palace.id, ids);
        info!(quiz_id = %session.id, questions = session.len(), "quiz started");

        self.quiz = Some(session);
        self.mode = Mode::Quiz;
        self.events.publish(StoreEvent::ModeChanged(Mode::Quiz));
        self.publish_quiz_changed();
        self.set_selection(None);
    }

    /// Move to the next question, or complete the quiz when already on the
    /// last one.  No-op without a running quiz.
    pub fn next_quiz_object(&mut self) {
        let Some(session) = self.quiz.as_mut() else {
            debug!("next_quiz_object: no running quiz");
            return;
        };
        if session.is_last() {
            self.complete_quiz();
            return;
        }
        session.current_index += 1;
        self.publish_quiz_changed();
    }

    /// Stamp the end time, append the session to the results log, return to
    /// explore mode and clear the session.
    ///
    /// Returns the recorded session, or `None` without a running quiz.
    pub fn complete_quiz(&mut self) -> Option<QuizSession> {
        let Some(mut session) = self.quiz.take() else {
            debug!("complete_quiz: no running quiz");
            return None;
        };
        session.end_time = Some(Utc::now());
        if let Err(e) = self.repo.append_quiz_result(&session) {
            warn!(quiz_id = %session.id, error = %e, "failed to record quiz result");
        }
        info!(
            quiz_id = %session.id,
            score = session.score,
            mistakes = session.mistakes,
            "quiz completed"
        );
        self.events.publish(StoreEvent::QuizCompleted {
            session_id: session.id.clone(),
            score: session.score,
            mistakes: session.mistakes,
        });
        self.mode = Mode::Explore;
        self.events.publish(StoreEvent::ModeChanged(Mode::Explore));
        Some(session)
    }

    /// Count one answer.  The question index is not advanced.
    pub fn update_quiz_score(&mut self, correct: bool) {
        let Some(session) = self.quiz.as_mut() else {
            debug!("update_quiz_score: no running quiz");
            return;
        };
        if correct {
            session.score += 1;
        } else {
            session.mistakes += 1;
        }
        self.publish_quiz_changed();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Import / export
    // ─────────────────────────────────────────────────────────────────────────

    /// Pretty-printed JSON of the current palace, or `None` without one.
    pub fn export_palace(&self) -> Option<String> {
        let palace = self.palace.as_ref()?;
        match serde_json::to_string_pretty(palace) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(palace_id = %palace.id, error = %e, "failed to serialize palace");
                None
            }
        }
    }

    /// Suggested download name for [`export_palace`](Self::export_palace).
    pub fn export_file_name(&self) -> Option<String> {
        self.palace.as_ref().map(|p| format!("{}.json", p.name))
    }

    /// Parse an exported palace, give it a fresh identity and modification
    /// time, load it as current and save it durably.
    ///
    /// Malformed or invalid input is logged and returned as an error; the
    /// store is left untouched.  On success returns the new identity.
    pub fn import_palace(&mut self, data: &str) -> Result<String, ImportError> {
        let mut palace = match parse_palace(data) {
            Ok(palace) => palace,
            Err(e) => {
                warn!(error = %e, "failed to import palace");
                return Err(e);
            }
        };
        palace.id = palace_types::new_id("palace");
        palace.last_modified = Utc::now();
        let id = palace.id.clone();
        info!(palace_id = %id, name = %palace.name, "palace imported");

        self.load_palace(palace);
        self.save_palace();
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn current_room_mut(&mut self) -> Option<&mut Room> {
        let palace = self.palace.as_mut()?;
        let room_id = palace.current_room.clone();
        palace.room_mut(&room_id)
    }

    fn set_selection(&mut self, selection: Option<String>) {
        if self.selected != selection {
            self.selected = selection;
            self.events.publish(StoreEvent::SelectionChanged {
                object_id: self.selected.clone(),
            });
        }
    }

    fn set_placing_state(&mut self, placing: bool, object_type: Option<String>) {
        if self.is_placing != placing || self.placing_object_type != object_type {
            self.is_placing = placing;
            self.placing_object_type = object_type;
            self.events.publish(StoreEvent::PlacingChanged {
                placing,
                object_type: self.placing_object_type.clone(),
            });
        }
    }

    /// Switch mode, dropping any running quiz when the new mode is not quiz.
    fn enter_mode(&mut self, mode: Mode) {
        if mode != Mode::Quiz
            && let Some(session) = self.quiz.take()
        {
            info!(quiz_id = %session.id, "quiz abandoned");
        }
        if self.mode != mode {
            self.mode = mode;
            self.events.publish(StoreEvent::ModeChanged(mode));
        }
    }

    fn publish_quiz_changed(&self) {
        if let Some(session) = &self.quiz {
            self.events.publish(StoreEvent::QuizChanged {
                current_index: session.current_index,
                score: session.score,
                mistakes: session.mistakes,
            });
        }
    }
}

fn parse_palace(data: &str) -> Result<MemoryPalace, ImportError> {
    let palace: MemoryPalace = serde_json::from_str(data)?;
    palace.validate()?;
    Ok(palace)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
