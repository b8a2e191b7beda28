//! Condition evaluation and quest progression for analytics SDKs.
//!
//! # Overview
//!
//! The crate has two parts that build on each other:
//!
//! - A [`Condition`] engine: MongoDB-style predicates (`$or`, `$in`, `$regex`, `$vgte`, ...) over
//!   semi-structured [`AttributeValue`] trees. Evaluation is total: clauses that cannot be applied
//!   evaluate to `false` instead of failing.
//! - A [`QuestController`] that activates, progresses and finishes gamified [`Quest`]s as tracked
//!   events arrive, decides when quest UI may be revealed and resolves the prize of won quests.
//!
//! Deterministic 50/50 bucketing ([`is_in_control_group`]) is provided for control-group assignment
//! and matches the backend's hashing bit-for-bit.
//!
//! `$regex` patterns use the [`regex`](https://docs.rs/regex/latest/regex/) crate's syntax, which
//! has no lookaround or backreferences. Patterns it cannot compile evaluate to `false` and are
//! logged as warnings.
//!
//! The crate performs no I/O. Quest documents are fetched by the caller and state transitions are
//! reported through a [`TransitionLogger`].
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum and only occur while loading documents. Evaluation
//! and event processing never fail.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `questline` target. Malformed conditions and quest definitions are reported as warnings.
//!
//! # Examples
//!
//! A runnable example lives in `demos/simple`.

#![warn(rustdoc::missing_crate_level_docs)]

mod attributes;
mod bucketing;
mod condition;
mod config;
mod controller;
mod error;
mod progression;
mod quest;
mod rules;
mod transition_logger;
mod version;

pub use attributes::{AttributeValue, Attributes};
pub use bucketing::{bucket, fnv32a, is_in_control_group, HashVersion};
pub use condition::{
    ClauseValue, Comparison, Condition, ElemMatch, FieldClause, OperatorClause, RegexOperand,
};
pub use config::{ControllerConfig, ProgressFilterPolicy};
pub use controller::{QuestController, QuestDecision};
pub use error::{Error, Result};
pub use progression::QuestTransition;
pub use quest::{
    Milestone, ProgressKey, Quest, QuestGraphic, QuestGraphics, QuestList, QuestProgress,
    QuestStatus, QuestTriggers, Timestamp, TriggerEvent, TriggerEvents, TryParse, ValidityWindow,
};
pub use rules::evaluate;
pub use transition_logger::{TransitionEvent, TransitionLogger};
pub use version::{compare_versions, padded_version_string};
