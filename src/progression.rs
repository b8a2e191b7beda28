//! Quest lifecycle: `(never started) -> Welcome -> Progress -> Won | Lost`.
//!
//! All transitions take the current time explicitly so that callers control the clock.
use serde::{Deserialize, Serialize};

use crate::{
    quest::{contains_event, ProgressKey, Quest, QuestProgress, QuestStatus, Timestamp},
    AttributeValue,
};

/// State change applied to a quest by a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestTransition {
    /// Progress was created in [`QuestStatus::Welcome`].
    Started,
    /// The step counter was incremented without reaching the final goal.
    Progressed { step: u32 },
    /// The quest reached a terminal status.
    Finished { status: QuestStatus },
}

impl Quest {
    /// Return `true` if `event_name` may start this quest for a user with `user_attributes`.
    ///
    /// The quest must not have been started yet, must be enabled and within its validity window,
    /// must list `event_name` as a welcome state trigger and its target filter must match.
    pub fn can_start(
        &self,
        event_name: &str,
        user_attributes: &AttributeValue,
        now: Timestamp,
    ) -> bool {
        self.progress.is_none()
            && self.enabled
            && self.window.contains(now)
            && self
                .triggers
                .as_ref()
                .is_some_and(|triggers| contains_event(&triggers.state.welcome, event_name))
            && self.passes_target_filter(user_attributes)
    }

    /// Unconditionally (re)start the quest at step 0.
    pub fn start(&mut self) -> QuestTransition {
        self.progress = Some(QuestProgress {
            status: QuestStatus::Welcome,
            current_step: 0,
        });
        log::debug!(target: "questline", quest_id = self.id.as_str(); "quest started");
        QuestTransition::Started
    }

    /// Start the quest if [`Quest::can_start`] allows it.
    pub fn try_start(
        &mut self,
        event_name: &str,
        user_attributes: &AttributeValue,
        now: Timestamp,
    ) -> Option<QuestTransition> {
        self.can_start(event_name, user_attributes, now)
            .then(|| self.start())
    }

    /// Progress that can still change.
    fn open_progress(&self) -> Option<QuestProgress> {
        self.progress
            .filter(|progress| !progress.status.is_terminal())
    }

    /// Handle a progress-class event.
    ///
    /// An expired quest finishes instead of progressing. Otherwise the step counter is incremented
    /// and the quest is won once it reaches the highest milestone goal. When `filter_attributes` is
    /// set, the target filter must also match them for the step to count.
    pub fn try_advance(
        &mut self,
        event_name: &str,
        now: Timestamp,
        filter_attributes: Option<&AttributeValue>,
    ) -> Option<QuestTransition> {
        let progress = self.open_progress()?;
        let triggers = self.triggers.as_ref()?;
        if !contains_event(&triggers.state.progress, event_name) {
            return None;
        }

        if self.window.is_expired(now) {
            log::debug!(target: "questline",
                        quest_id = self.id.as_str(),
                        event_name;
                        "quest expired, finishing instead of progressing");
            return self.finish();
        }

        if let Some(attributes) = filter_attributes {
            if !self.passes_target_filter(attributes) {
                log::debug!(target: "questline",
                            quest_id = self.id.as_str(),
                            event_name;
                            "target filter no longer matches, step not counted");
                return None;
            }
        }

        let step = progress.current_step.saturating_add(1);
        let won = self.total_steps().is_some_and(|total| step >= total);
        let status = if won {
            QuestStatus::Won
        } else {
            QuestStatus::Progress
        };
        self.progress = Some(QuestProgress {
            status,
            current_step: step,
        });
        log::debug!(target: "questline",
                    quest_id = self.id.as_str(),
                    event_name,
                    status:display = status,
                    step;
                    "quest progressed");

        Some(if won {
            QuestTransition::Finished { status }
        } else {
            QuestTransition::Progressed { step }
        })
    }

    /// Finish the quest if `event_name` is one of its finish state triggers.
    pub fn try_finish(&mut self, event_name: &str) -> Option<QuestTransition> {
        self.open_progress()?;
        let triggers = self.triggers.as_ref()?;
        if !contains_event(&triggers.state.finish, event_name) {
            return None;
        }
        self.finish()
    }

    /// Resolve the terminal status: won if the first milestone was reached, lost otherwise (also
    /// for an empty ladder). Returns `None` if the quest is not in progress.
    pub fn finish(&mut self) -> Option<QuestTransition> {
        let progress = self.open_progress()?;
        let status = match self.milestones.first() {
            Some(first) if progress.current_step >= first.goal => QuestStatus::Won,
            _ => QuestStatus::Lost,
        };
        self.progress = Some(QuestProgress { status, ..progress });
        log::debug!(target: "questline",
                    quest_id = self.id.as_str(),
                    status:display = status,
                    step = progress.current_step;
                    "quest finished");
        Some(QuestTransition::Finished { status })
    }

    /// Return `true` if `event_name` authorizes showing the UI for the current status.
    ///
    /// A reveal of a state identical to `last_revealed` is suppressed. On success, `last_revealed`
    /// is updated to the current [`ProgressKey`].
    pub fn try_reveal(&self, event_name: &str, last_revealed: &mut Option<ProgressKey>) -> bool {
        let (Some(progress), Some(triggers)) = (self.progress, self.triggers.as_ref()) else {
            return false;
        };
        if !contains_event(triggers.ui.for_status(progress.status), event_name) {
            return false;
        }

        let key = progress.progress_key();
        if *last_revealed == Some(key) {
            log::trace!(target: "questline",
                        quest_id = self.id.as_str(),
                        progress_key:display = key;
                        "reveal already shown for this state");
            return false;
        }
        *last_revealed = Some(key);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::QuestTransition;
    use crate::{
        quest::{ProgressKey, Quest, QuestProgress, QuestStatus, Timestamp},
        AttributeValue,
    };

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn after_window() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn quest() -> Quest {
        serde_json::from_value(json!({
            "_id": "gems",
            "milestones": [{"goal": 5, "prizeSku": "bronze"}, {"goal": 10, "prizeSku": "silver"}],
            "triggers": {
                "state": {"welcome": ["app_open"], "progress": ["gem_collected"], "finish": ["season_end"]},
                "ui": {"welcome": ["home"], "progress": ["home", "gem_collected"], "finish": ["home"]},
            },
            "targetFilter": {"country": "DE"},
            "from": "2024-01-01T00:00:00Z",
            "to": "2024-02-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn user(country: &str) -> AttributeValue {
        json!({"country": country}).into()
    }

    fn started_at(step: u32) -> Quest {
        let mut quest = quest();
        quest.progress = Some(QuestProgress {
            status: if step == 0 {
                QuestStatus::Welcome
            } else {
                QuestStatus::Progress
            },
            current_step: step,
        });
        quest
    }

    #[test]
    fn start_requires_trigger_and_filter() {
        let mut quest = quest();
        assert_eq!(quest.try_start("gem_collected", &user("DE"), now()), None);
        assert_eq!(quest.try_start("app_open", &user("US"), now()), None);
        assert_eq!(quest.progress, None);

        assert_eq!(
            quest.try_start("app_open", &user("DE"), now()),
            Some(QuestTransition::Started)
        );
        assert_eq!(
            quest.progress,
            Some(QuestProgress {
                status: QuestStatus::Welcome,
                current_step: 0
            })
        );

        // Already started.
        assert_eq!(quest.try_start("app_open", &user("DE"), now()), None);
    }

    #[test]
    fn start_requires_enabled_quest_inside_window() {
        let mut disabled = quest();
        disabled.enabled = false;
        assert!(!disabled.can_start("app_open", &user("DE"), now()));

        let quest = quest();
        assert!(!quest.can_start("app_open", &user("DE"), after_window()));
        assert!(!quest.can_start(
            "app_open",
            &user("DE"),
            Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()
        ));
    }

    #[test]
    fn progress_increments_until_final_goal() {
        let mut quest = started_at(0);
        for step in 1..10 {
            assert_eq!(
                quest.try_advance("gem_collected", now(), None),
                Some(QuestTransition::Progressed { step })
            );
            assert_eq!(quest.status(), Some(QuestStatus::Progress));
        }
        assert_eq!(
            quest.try_advance("gem_collected", now(), None),
            Some(QuestTransition::Finished {
                status: QuestStatus::Won
            })
        );
        assert_eq!(quest.progress.unwrap().current_step, 10);
        assert_eq!(quest.prize(), Some("silver"));

        // Terminal.
        assert_eq!(quest.try_advance("gem_collected", now(), None), None);
        assert_eq!(quest.progress.unwrap().current_step, 10);
    }

    #[test]
    fn progress_ignores_other_events_and_unstarted_quests() {
        let mut quest = started_at(2);
        assert_eq!(quest.try_advance("app_open", now(), None), None);
        assert_eq!(quest.progress.unwrap().current_step, 2);

        let mut unstarted = self::quest();
        assert_eq!(unstarted.try_advance("gem_collected", now(), None), None);
        assert_eq!(unstarted.try_finish("season_end"), None);
        assert_eq!(unstarted.finish(), None);
        assert_eq!(unstarted.progress, None);
    }

    #[test]
    fn expired_quest_finishes_instead_of_progressing() {
        let mut quest = started_at(7);
        assert_eq!(
            quest.try_advance("gem_collected", after_window(), None),
            Some(QuestTransition::Finished {
                status: QuestStatus::Won
            })
        );
        assert_eq!(quest.progress.unwrap().current_step, 7);
        assert_eq!(quest.prize(), Some("bronze"));

        let mut quest = started_at(4);
        assert_eq!(
            quest.try_advance("gem_collected", after_window(), None),
            Some(QuestTransition::Finished {
                status: QuestStatus::Lost
            })
        );
        assert_eq!(quest.progress.unwrap().current_step, 4);
        assert_eq!(quest.prize(), None);
    }

    #[test]
    fn finish_trigger_resolves_by_first_goal() {
        let mut quest = started_at(5);
        assert_eq!(
            quest.try_finish("season_end"),
            Some(QuestTransition::Finished {
                status: QuestStatus::Won
            })
        );

        let mut quest = started_at(0);
        assert_eq!(quest.try_finish("gem_collected"), None);
        assert_eq!(
            quest.try_finish("season_end"),
            Some(QuestTransition::Finished {
                status: QuestStatus::Lost
            })
        );
        assert_eq!(quest.try_finish("season_end"), None);
    }

    #[test]
    fn finish_with_empty_ladder_is_lost() {
        let mut quest = started_at(3);
        quest.milestones.clear();
        assert_eq!(
            quest.finish(),
            Some(QuestTransition::Finished {
                status: QuestStatus::Lost
            })
        );
    }

    #[test]
    fn progress_filter_recheck() {
        let mut quest = started_at(1);
        assert_eq!(
            quest.try_advance("gem_collected", now(), Some(&user("US"))),
            None
        );
        assert_eq!(quest.progress.unwrap().current_step, 1);
        assert_eq!(
            quest.try_advance("gem_collected", now(), Some(&user("DE"))),
            Some(QuestTransition::Progressed { step: 2 })
        );
        // Expiry still finishes.
        assert_eq!(
            quest.try_advance("gem_collected", after_window(), Some(&user("US"))),
            Some(QuestTransition::Finished {
                status: QuestStatus::Lost
            })
        );
    }

    #[test]
    fn reveal_uses_trigger_set_of_current_phase() {
        let mut last = None;
        let quest = started_at(0);
        assert!(!quest.try_reveal("gem_collected", &mut last));
        assert!(quest.try_reveal("home", &mut last));
        assert_eq!(
            last,
            Some(ProgressKey {
                status: QuestStatus::Welcome,
                step: 0
            })
        );

        let mut last = None;
        let quest = started_at(3);
        assert!(quest.try_reveal("gem_collected", &mut last));

        let mut last = None;
        let mut quest = started_at(3);
        quest.finish();
        assert!(!quest.try_reveal("gem_collected", &mut last));
        assert!(quest.try_reveal("home", &mut last));

        let mut last = None;
        assert!(!self::quest().try_reveal("home", &mut last));
        assert_eq!(last, None);
    }

    #[test]
    fn reveal_is_suppressed_for_unchanged_state() {
        let mut last = None;
        let mut quest = started_at(2);
        assert!(quest.try_reveal("home", &mut last));
        assert!(!quest.try_reveal("home", &mut last));
        assert!(!quest.try_reveal("gem_collected", &mut last));

        quest.try_advance("gem_collected", now(), None);
        assert!(quest.try_reveal("home", &mut last));
        assert!(!quest.try_reveal("home", &mut last));
    }

    #[test]
    fn transitions_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(QuestTransition::Finished {
                status: QuestStatus::Won
            })
            .unwrap(),
            json!({"type": "finished", "status": "won"})
        );
        assert_eq!(
            serde_json::to_value(QuestTransition::Progressed { step: 3 }).unwrap(),
            json!({"type": "progressed", "step": 3})
        );
    }
}
