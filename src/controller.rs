use chrono::Utc;
use serde::Serialize;

use crate::{
    config::ProgressFilterPolicy,
    quest::{ProgressKey, Timestamp},
    AttributeValue, Attributes, ControllerConfig, Quest, QuestList, QuestProgress,
    QuestTransition, Result, TransitionEvent, TransitionLogger,
};

/// Outcome of processing a single event.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestDecision {
    /// Id of the active quest after processing the event, if any.
    pub quest_id: Option<String>,
    /// State change caused by the event.
    pub transition: Option<QuestTransition>,
    /// Whether the UI for the current quest state may be shown.
    pub reveal: bool,
    pub progress: Option<QuestProgress>,
    /// Prize sku, set once the active quest is won.
    pub prize: Option<String>,
    pub prize_value: Option<AttributeValue>,
}

/// Drives quests for a single user session.
///
/// At most one quest is active at a time. While no quest is active, the first eligible quest
/// (in the given order) that an event can start becomes active. The active quest stays active,
/// including after it is won or lost, until it is [finalized](QuestController::finalize).
///
/// The controller holds no locks. Events for one user must be processed sequentially.
pub struct QuestController<'a> {
    eligible: Vec<Quest>,
    active: Option<Quest>,
    user_attributes: AttributeValue,
    last_revealed: Option<ProgressKey>,
    progress_filter_policy: ProgressFilterPolicy,
    transition_logger: Box<dyn TransitionLogger + Send + Sync + 'a>,
}

impl<'a> QuestController<'a> {
    /// Create a controller over `quests`, excluding ids listed in `finalized`.
    ///
    /// `user_attributes` is the snapshot of user properties target filters are evaluated against.
    pub fn new(
        config: ControllerConfig<'a>,
        quests: Vec<Quest>,
        finalized: &[String],
        user_attributes: AttributeValue,
    ) -> Self {
        let total = quests.len();
        let eligible: Vec<Quest> = quests
            .into_iter()
            .filter(|quest| !finalized.contains(&quest.id))
            .collect();
        log::debug!(target: "questline",
                    total,
                    eligible = eligible.len(),
                    quest_ids:serde = eligible.iter().map(|q| q.id.as_str()).collect::<Vec<_>>();
                    "quests initialized");

        QuestController {
            eligible,
            active: None,
            user_attributes,
            last_revealed: None,
            progress_filter_policy: config.progress_filter_policy,
            transition_logger: config.transition_logger,
        }
    }

    /// Create a controller from backend `{"list": [...]}` documents of quests and finalized quest
    /// ids.
    pub fn from_documents(
        config: ControllerConfig<'a>,
        quests_json: &str,
        finalized_json: &str,
        user_attributes: AttributeValue,
    ) -> Result<Self> {
        let quests = QuestList::parse(quests_json)?.quests;
        let finalized = QuestList::parse_ids(finalized_json)?;
        Ok(QuestController::new(config, quests, &finalized, user_attributes))
    }

    /// Seed the quest the backend reports as already active for this user.
    ///
    /// The quest replaces any eligible quest with the same id. A quest without progress cannot be
    /// active and is ignored.
    pub fn with_active_quest(mut self, quest: Quest) -> Self {
        quest.validate();
        if quest.progress.is_none() {
            log::warn!(target: "questline",
                       quest_id = quest.id.as_str();
                       "ignoring active quest without progress");
            return self;
        }
        log::debug!(target: "questline",
                    quest_id = quest.id.as_str(),
                    progress:serde = quest.progress;
                    "active quest restored");
        self.eligible.retain(|eligible| eligible.id != quest.id);
        self.active = Some(quest);
        self
    }

    /// Process a tracked event at the current time.
    pub fn process_event(&mut self, event_name: &str, event_properties: &Attributes) -> QuestDecision {
        self.process_event_at(event_name, event_properties, Utc::now())
    }

    /// Process a tracked event at `now`.
    ///
    /// With no active quest, tries to start one. Otherwise, tries to progress the active quest and
    /// then to finish it. Finally, checks whether the event authorizes a UI reveal for the state
    /// of the active quest.
    pub fn process_event_at(
        &mut self,
        event_name: &str,
        event_properties: &Attributes,
        now: Timestamp,
    ) -> QuestDecision {
        let transition = match &mut self.active {
            None => self.try_activate(event_name, now),
            Some(quest) => {
                let filter_attributes = match self.progress_filter_policy {
                    ProgressFilterPolicy::ActivationOnly => None,
                    ProgressFilterPolicy::EveryProgressEvent => {
                        Some(self.user_attributes.with_overrides(event_properties))
                    }
                };
                quest
                    .try_advance(event_name, now, filter_attributes.as_ref())
                    .or_else(|| quest.try_finish(event_name))
            }
        };

        let Some(quest) = &self.active else {
            return QuestDecision::default();
        };

        if let (Some(transition), Some(progress)) = (transition, quest.progress) {
            self.transition_logger.log_transition(TransitionEvent {
                quest_id: quest.id.clone(),
                event_name: event_name.to_owned(),
                event_properties: event_properties.clone(),
                transition,
                progress,
                timestamp: now.to_rfc3339(),
            });
        }

        let reveal = quest.try_reveal(event_name, &mut self.last_revealed);
        let decision = QuestDecision {
            quest_id: Some(quest.id.clone()),
            transition,
            reveal,
            progress: quest.progress,
            prize: quest.prize().map(str::to_owned),
            prize_value: quest.prize_value().cloned(),
        };
        log::debug!(target: "questline",
                    event_name,
                    decision:serde = decision;
                    "event processed");
        decision
    }

    fn try_activate(&mut self, event_name: &str, now: Timestamp) -> Option<QuestTransition> {
        let index = self
            .eligible
            .iter()
            .position(|quest| quest.can_start(event_name, &self.user_attributes, now))?;
        let mut quest = self.eligible[index].clone();
        let transition = quest.start();
        self.active = Some(quest);
        self.last_revealed = None;
        Some(transition)
    }

    /// Consume the quest with `quest_id`: it stops being active and is no longer eligible.
    ///
    /// Returns the quest (with its final progress, if it was active) so the caller can claim the
    /// prize.
    pub fn finalize(&mut self, quest_id: &str) -> Option<Quest> {
        let position = self.eligible.iter().position(|quest| quest.id == quest_id);
        let removed = position.map(|index| self.eligible.remove(index));

        let finalized = match self.active.take() {
            Some(active) if active.id == quest_id => {
                self.last_revealed = None;
                Some(active)
            }
            other => {
                self.active = other;
                removed
            }
        };
        log::debug!(target: "questline",
                    quest_id,
                    found = finalized.is_some();
                    "quest finalized");
        finalized
    }

    /// The active quest, if any.
    pub fn active_quest(&self) -> Option<&Quest> {
        self.active.as_ref()
    }

    /// Quests that can still be started.
    pub fn eligible_quests(&self) -> &[Quest] {
        &self.eligible
    }

    pub fn user_attributes(&self) -> &AttributeValue {
        &self.user_attributes
    }

    /// Progress key of the last authorized reveal.
    pub fn last_revealed(&self) -> Option<ProgressKey> {
        self.last_revealed
    }
}
