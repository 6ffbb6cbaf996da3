//! `palace-store` – the memory palace application state.
//!
//! # Modules
//!
//! - [`store`] – [`PalaceStore`][store::PalaceStore]: owns the current
//!   palace, selection, mode, placement state and quiz session, and exposes
//!   the commands that mutate them without breaking the model invariants.
//! - [`quiz`] – [`QuizFlow`][quiz::QuizFlow]: the per-question
//!   answer-matching state machine (awaiting selection → showing result →
//!   next question or completion) with a cancellable result delay, plus the
//!   [`QuizProgress`][quiz::QuizProgress] and [`QuizStats`][quiz::QuizStats]
//!   views.
//! - [`events`] – [`StoreEvent`][events::StoreEvent] change notifications
//!   broadcast to whatever renders the state.

pub mod events;
pub mod quiz;
pub mod store;

pub use events::{StoreEvent, StoreEvents};
pub use quiz::{
    Advance, DEFAULT_RESULT_DELAY, QuestionPhase, QuizFlow, QuizProgress, QuizStats, Verdict,
    format_elapsed,
};
pub use store::{ImportError, PalaceStore};
