use serde::{Deserialize, Serialize};

use crate::{Attributes, QuestProgress, QuestTransition};

/// A quest state change caused by a tracked event, ready to be reported to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub quest_id: String,
    pub event_name: String,
    pub event_properties: Attributes,
    pub transition: QuestTransition,
    /// Progress after the transition.
    pub progress: QuestProgress,
    /// RFC 3339 time of the transition.
    pub timestamp: String,
}

/// A trait for reporting quest transitions, e.g., forwarding them to the backend's start, trigger
/// and finish endpoints.
pub trait TransitionLogger {
    /// Logs the transition event.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use questline::{TransitionLogger, TransitionEvent};
    /// struct MyTransitionLogger;
    ///
    /// impl TransitionLogger for MyTransitionLogger {
    ///     fn log_transition(&self, event: TransitionEvent) {
    ///         // Queue the event for delivery here
    ///     }
    /// }
    /// ```
    ///
    /// # Notes
    ///
    /// This method is called while an event is being processed, so it should not block. It should
    /// not panic either; delivery errors are to be handled within the implementation.
    fn log_transition(&self, event: TransitionEvent);
}

pub(crate) struct NoopTransitionLogger;
impl TransitionLogger for NoopTransitionLogger {
    fn log_transition(&self, _event: TransitionEvent) {}
}

impl<T: Fn(TransitionEvent)> TransitionLogger for T {
    fn log_transition(&self, event: TransitionEvent) {
        self(event);
    }
}
