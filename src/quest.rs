//! Quest definitions as delivered by the backend, plus the per-user progress record.
//!
//! Definitions are immutable once parsed. The only mutable part of a [`Quest`] is its
//! [`QuestProgress`], which is driven by the state machine in [`crate::progression`].
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{AttributeValue, Condition, Result};

/// Wall-clock instant used for validity windows.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A gamified quest: a target filter, a reward ladder and the events that drive it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "name", default)]
    pub title: String,
    /// Accepts `true`/`false` as well as `"true"`/`"false"`. Defaults to enabled.
    #[serde(default = "enabled_by_default", deserialize_with = "deserialize_enabled")]
    pub enabled: bool,
    /// Absent until the quest has been started for this user.
    #[serde(default)]
    pub progress: Option<QuestProgress>,
    /// Sorted ascending by goal.
    #[serde(default, deserialize_with = "deserialize_milestones")]
    pub milestones: Vec<Milestone>,
    #[serde(rename = "countryCodesArray", default)]
    pub country_codes: Vec<String>,
    #[serde(default)]
    pub graphics: Option<QuestGraphics>,
    #[serde(default)]
    pub triggers: Option<QuestTriggers>,
    #[serde(default)]
    pub collectible_icon_image: Option<String>,
    /// Condition on user attributes required to start the quest. `None` matches everyone.
    #[serde(default)]
    pub target_filter: Option<Condition>,
    #[serde(flatten)]
    pub window: ValidityWindow,
}

fn enabled_by_default() -> bool {
    true
}

fn deserialize_enabled<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        String(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => true,
        Some(Flag::Bool(b)) => b,
        Some(Flag::String(s)) => s.trim().eq_ignore_ascii_case("true"),
    })
}

fn deserialize_milestones<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Milestone>, D::Error> {
    let mut milestones = Option::<Vec<Milestone>>::deserialize(deserializer)?.unwrap_or_default();
    milestones.sort_by_key(|milestone| milestone.goal);
    Ok(milestones)
}

/// Lifecycle phase of a started quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum QuestStatus {
    #[default]
    #[serde(rename = "welcome")]
    Welcome,
    #[serde(rename = "started")]
    Progress,
    #[serde(rename = "won")]
    Won,
    #[serde(rename = "lost")]
    Lost,
}

impl QuestStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            QuestStatus::Welcome => "welcome",
            QuestStatus::Progress => "started",
            QuestStatus::Won => "won",
            QuestStatus::Lost => "lost",
        }
    }

    /// `true` for [`QuestStatus::Won`] and [`QuestStatus::Lost`].
    pub fn is_terminal(self) -> bool {
        matches!(self, QuestStatus::Won | QuestStatus::Lost)
    }
}

/// Unknown statuses read as [`QuestStatus::Welcome`].
impl From<String> for QuestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "started" => QuestStatus::Progress,
            "won" => QuestStatus::Won,
            "lost" => QuestStatus::Lost,
            _ => QuestStatus::Welcome,
        }
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a started quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestProgress {
    #[serde(default)]
    pub status: QuestStatus,
    #[serde(rename = "questProgress", default)]
    pub current_step: u32,
}

impl QuestProgress {
    pub fn progress_key(&self) -> ProgressKey {
        ProgressKey {
            status: self.status,
            step: self.current_step,
        }
    }
}

/// Fingerprint of `(status, step)`, used to avoid revealing the same state twice.
///
/// ```
/// # use questline::{QuestProgress, QuestStatus};
/// let progress = QuestProgress { status: QuestStatus::Progress, current_step: 3 };
/// assert_eq!(progress.progress_key().to_string(), "started_3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProgressKey {
    pub status: QuestStatus,
    pub step: u32,
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.status, self.step)
    }
}

/// A step threshold and the reward for reaching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(default)]
    pub order: u32,
    pub goal: u32,
    #[serde(default)]
    pub prize_sku: Option<String>,
    #[serde(default)]
    pub prize_value: Option<AttributeValue>,
    #[serde(default)]
    pub prize_title: Option<String>,
    #[serde(default)]
    pub prize_image: Option<String>,
    #[serde(default)]
    pub goal_image: Option<String>,
}

/// Event names driving state transitions (`state`) and authorizing UI reveals (`ui`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestTriggers {
    #[serde(default)]
    pub state: TriggerEvents,
    #[serde(default)]
    pub ui: TriggerEvents,
}

/// Trigger events per lifecycle phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvents {
    #[serde(default)]
    pub welcome: Vec<TriggerEvent>,
    #[serde(default)]
    pub progress: Vec<TriggerEvent>,
    #[serde(default)]
    pub finish: Vec<TriggerEvent>,
}

impl TriggerEvents {
    /// Events of the phase `status` belongs to. `Won` and `Lost` share the finish set.
    pub fn for_status(&self, status: QuestStatus) -> &[TriggerEvent] {
        match status {
            QuestStatus::Welcome => &self.welcome,
            QuestStatus::Progress => &self.progress,
            QuestStatus::Won | QuestStatus::Lost => &self.finish,
        }
    }
}

pub(crate) fn contains_event(events: &[TriggerEvent], event_name: &str) -> bool {
    events.iter().any(|event| event.event_name == event_name)
}

/// A trigger entry. The backend sends either a bare event name or `{eventName, eventValue}`;
/// only the name takes part in matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TriggerEventRepr")]
pub struct TriggerEvent {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_value: Option<AttributeValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerEventRepr {
    Name(String),
    #[serde(rename_all = "camelCase")]
    Event {
        event_name: String,
        #[serde(default)]
        event_value: Option<AttributeValue>,
    },
}

impl From<TriggerEventRepr> for TriggerEvent {
    fn from(value: TriggerEventRepr) -> Self {
        match value {
            TriggerEventRepr::Name(event_name) => TriggerEvent {
                event_name,
                event_value: None,
            },
            TriggerEventRepr::Event {
                event_name,
                event_value,
            } => TriggerEvent {
                event_name,
                event_value,
            },
        }
    }
}

impl From<&str> for TriggerEvent {
    fn from(value: &str) -> Self {
        TriggerEvent {
            event_name: value.to_owned(),
            event_value: None,
        }
    }
}

/// Display assets per lifecycle phase. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestGraphics {
    #[serde(default)]
    pub welcome: Option<QuestGraphic>,
    #[serde(default)]
    pub progress: Option<QuestGraphic>,
    #[serde(default)]
    pub won: Option<QuestGraphic>,
    #[serde(default)]
    pub lost: Option<QuestGraphic>,
}

impl QuestGraphics {
    pub fn for_status(&self, status: QuestStatus) -> Option<&QuestGraphic> {
        match status {
            QuestStatus::Welcome => self.welcome.as_ref(),
            QuestStatus::Progress => self.progress.as_ref(),
            QuestStatus::Won => self.won.as_ref(),
            QuestStatus::Lost => self.lost.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestGraphic {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub title_image: Option<String>,
}

/// Half-open `[from, to)` window. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    #[serde(default)]
    pub from: Option<Timestamp>,
    #[serde(default)]
    pub to: Option<Timestamp>,
}

impl ValidityWindow {
    pub fn contains(&self, now: Timestamp) -> bool {
        self.from.map_or(true, |from| from <= now) && !self.is_expired(now)
    }

    /// `true` once `now` has reached the end of the window.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.to.is_some_and(|to| now >= to)
    }
}

impl Quest {
    /// Number of milestones.
    pub fn total_checkmarks(&self) -> usize {
        self.milestones.len()
    }

    /// Highest milestone goal, i.e., the step at which the quest is won. `None` for an empty
    /// ladder.
    pub fn total_steps(&self) -> Option<u32> {
        self.milestones.last().map(|milestone| milestone.goal)
    }

    /// Current status, `None` if the quest was never started.
    pub fn status(&self) -> Option<QuestStatus> {
        self.progress.map(|progress| progress.status)
    }

    /// `true` if the target filter (if any) matches `attributes`.
    pub fn passes_target_filter(&self, attributes: &AttributeValue) -> bool {
        self.target_filter
            .as_ref()
            .map_or(true, |filter| filter.eval(attributes))
    }

    /// Highest milestone reached by a won quest.
    pub fn prize_milestone(&self) -> Option<&Milestone> {
        let progress = self.progress?;
        if progress.status != QuestStatus::Won {
            return None;
        }
        self.milestones
            .iter()
            .rev()
            .find(|milestone| milestone.goal <= progress.current_step)
    }

    /// Prize sku of [`Quest::prize_milestone`].
    pub fn prize(&self) -> Option<&str> {
        self.prize_milestone()?.prize_sku.as_deref()
    }

    /// Prize value of [`Quest::prize_milestone`].
    pub fn prize_value(&self) -> Option<&AttributeValue> {
        self.prize_milestone()?.prize_value.as_ref()
    }

    /// Report missing sections, logging a warning for each. Never prevents the quest from being
    /// used.
    pub fn validate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.progress.is_none() {
            missing.push("progress");
        }
        if self.milestones.is_empty() {
            missing.push("milestones");
        }
        if self.graphics.is_none() {
            missing.push("graphics");
        }
        if self.triggers.is_none() {
            missing.push("triggers");
        }
        if self.target_filter.is_none() {
            missing.push("targetFilter");
        }
        for &section in &missing {
            log::warn!(target: "questline",
                       quest_id = self.id.as_str(),
                       section;
                       "quest definition section is missing or empty");
        }
        missing
    }
}

/// `TryParse` allows a list entry to fail parsing without failing the parsing of the whole list.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// `{"list": [...]}` envelope the backend wraps lists in.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResult<T> {
    #[serde(default)]
    list: Vec<T>,
}

/// Quests parsed from a backend list. Entries that fail to parse are logged and skipped.
#[derive(Debug, Clone, Default)]
pub struct QuestList {
    pub quests: Vec<Quest>,
}

impl QuestList {
    /// Parse a `{"list": [...]}` document of quests.
    ///
    /// ```
    /// # use questline::QuestList;
    /// let list = QuestList::parse(r#"{"list": [{"_id": "q1", "name": "First"}, {"name": "no id"}]}"#)?;
    /// assert_eq!(list.quests.len(), 1);
    /// # Ok::<(), questline::Error>(())
    /// ```
    pub fn parse(json: &str) -> Result<QuestList> {
        let result: ListResult<TryParse<Quest>> = serde_json::from_str(json)?;
        let quests = result
            .list
            .into_iter()
            .filter_map(|entry| match entry {
                TryParse::Parsed(quest) => Some(quest),
                TryParse::ParseFailed(value) => {
                    log::warn!(target: "questline",
                               quest_id:serde = value.get("_id");
                               "skipping quest that failed to parse");
                    None
                }
            })
            .collect();
        Ok(QuestList { quests })
    }

    /// Parse a `{"list": [...]}` document of quest ids. Non-string entries are skipped.
    pub fn parse_ids(json: &str) -> Result<Vec<String>> {
        let result: ListResult<TryParse<String>> = serde_json::from_str(json)?;
        Ok(result.list.into_iter().filter_map(Option::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{
        Milestone, ProgressKey, Quest, QuestList, QuestProgress, QuestStatus, TriggerEvent,
        ValidityWindow,
    };
    use crate::AttributeValue;

    fn quest(value: serde_json::Value) -> Quest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_full_document() {
        let quest = quest(json!({
            "_id": "q1",
            "name": "Collect gems",
            "enabled": "true",
            "milestones": [
                {"order": 2, "goal": 10, "prizeSku": "silver", "prizeValue": 250},
                {"order": 1, "goal": 5, "prizeSku": "bronze", "prizeValue": "100"},
            ],
            "countryCodesArray": ["DE", "AT"],
            "graphics": {"welcome": {"background": "bg.png", "titleImage": "title.png"}},
            "triggers": {
                "state": {"welcome": ["app_open"], "progress": [{"eventName": "gem_collected", "eventValue": 1}], "finish": []},
                "ui": {"welcome": ["home_screen"]},
            },
            "collectibleIconImage": "gem.png",
            "targetFilter": {"country": {"$in": ["DE", "AT"]}},
            "from": "2024-01-01T00:00:00Z",
            "to": "2024-02-01T00:00:00Z",
        }));

        assert_eq!(quest.id, "q1");
        assert_eq!(quest.title, "Collect gems");
        assert!(quest.enabled);
        assert_eq!(quest.progress, None);
        assert_eq!(quest.milestones[0].goal, 5);
        assert_eq!(quest.milestones[1].goal, 10);
        assert_eq!(quest.total_checkmarks(), 2);
        assert_eq!(quest.total_steps(), Some(10));
        assert_eq!(quest.country_codes, ["DE", "AT"]);
        assert_eq!(quest.collectible_icon_image.as_deref(), Some("gem.png"));

        let triggers = quest.triggers.as_ref().unwrap();
        assert_eq!(triggers.state.welcome, [TriggerEvent::from("app_open")]);
        assert_eq!(triggers.state.progress[0].event_name, "gem_collected");
        assert_eq!(
            triggers.state.progress[0].event_value,
            Some(AttributeValue::Number(1.0))
        );
        assert!(triggers.ui.progress.is_empty());

        let graphics = quest.graphics.as_ref().unwrap();
        assert_eq!(
            graphics
                .for_status(QuestStatus::Welcome)
                .and_then(|g| g.title_image.as_deref()),
            Some("title.png")
        );
        assert!(graphics.for_status(QuestStatus::Won).is_none());

        assert_eq!(
            quest.window.from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(quest.target_filter.is_some());
    }

    #[test]
    fn minimal_document_uses_defaults() {
        let quest = quest(json!({"_id": "q1"}));
        assert!(quest.enabled);
        assert!(quest.milestones.is_empty());
        assert_eq!(quest.total_steps(), None);
        assert_eq!(quest.window, ValidityWindow::default());
        assert!(quest.passes_target_filter(&AttributeValue::Null));
    }

    #[test]
    fn enabled_flag_forms() {
        assert!(!quest(json!({"_id": "q", "enabled": false})).enabled);
        assert!(!quest(json!({"_id": "q", "enabled": "false"})).enabled);
        assert!(quest(json!({"_id": "q", "enabled": "TRUE"})).enabled);
        assert!(quest(json!({"_id": "q", "enabled": null})).enabled);
    }

    #[test]
    fn progress_wire_format() {
        let progress: QuestProgress =
            serde_json::from_value(json!({"status": "started", "questProgress": 4})).unwrap();
        assert_eq!(progress.status, QuestStatus::Progress);
        assert_eq!(progress.current_step, 4);
        assert_eq!(
            serde_json::to_value(progress).unwrap(),
            json!({"status": "started", "questProgress": 4})
        );

        let unknown: QuestProgress = serde_json::from_value(json!({"status": "finished"})).unwrap();
        assert_eq!(unknown.status, QuestStatus::Welcome);
        assert_eq!(unknown.current_step, 0);
    }

    #[test]
    fn progress_key_changes_with_status_and_step() {
        let key = |status, step| ProgressKey { status, step };
        assert_eq!(key(QuestStatus::Welcome, 0).to_string(), "welcome_0");
        assert_eq!(key(QuestStatus::Won, 10).to_string(), "won_10");
        assert_ne!(key(QuestStatus::Progress, 1), key(QuestStatus::Progress, 2));
        assert_ne!(key(QuestStatus::Progress, 2), key(QuestStatus::Won, 2));
    }

    #[test]
    fn validity_window_is_half_open() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let window = ValidityWindow {
            from: Some(from),
            to: Some(to),
        };
        assert!(window.contains(from));
        assert!(!window.contains(from - chrono::Duration::seconds(1)));
        assert!(window.contains(to - chrono::Duration::seconds(1)));
        assert!(!window.contains(to));
        assert!(window.is_expired(to));
        assert!(!window.is_expired(from));
        assert!(ValidityWindow::default().contains(to));
    }

    fn ladder_quest(status: QuestStatus, step: u32) -> Quest {
        let mut quest = quest(json!({
            "_id": "q1",
            "milestones": [
                {"goal": 5, "prizeSku": "bronze", "prizeValue": 100},
                {"goal": 10, "prizeSku": "silver", "prizeValue": 250},
            ],
        }));
        quest.progress = Some(QuestProgress {
            status,
            current_step: step,
        });
        quest
    }

    #[test]
    fn prize_is_highest_reached_milestone() {
        assert_eq!(ladder_quest(QuestStatus::Won, 7).prize(), Some("bronze"));
        assert_eq!(ladder_quest(QuestStatus::Won, 10).prize(), Some("silver"));
        assert_eq!(ladder_quest(QuestStatus::Won, 12).prize(), Some("silver"));
        assert_eq!(
            ladder_quest(QuestStatus::Won, 7).prize_value(),
            Some(&AttributeValue::Number(100.0))
        );
        assert_eq!(
            ladder_quest(QuestStatus::Won, 7).prize_milestone(),
            Some(&Milestone {
                order: 0,
                goal: 5,
                prize_sku: Some("bronze".to_owned()),
                prize_value: Some(AttributeValue::Number(100.0)),
                prize_title: None,
                prize_image: None,
                goal_image: None,
            })
        );
    }

    #[test]
    fn no_prize_unless_won() {
        assert_eq!(ladder_quest(QuestStatus::Won, 3).prize(), None);
        assert_eq!(ladder_quest(QuestStatus::Lost, 7).prize(), None);
        assert_eq!(ladder_quest(QuestStatus::Progress, 7).prize(), None);
        let mut quest = ladder_quest(QuestStatus::Won, 7);
        quest.progress = None;
        assert_eq!(quest.prize(), None);
    }

    #[test]
    fn validate_reports_missing_sections() {
        let quest = quest(json!({"_id": "q1", "milestones": []}));
        assert_eq!(
            quest.validate(),
            ["progress", "milestones", "graphics", "triggers", "targetFilter"]
        );

        let complete = quest_from_fixture("daily-gems");
        assert_eq!(complete.validate(), ["progress"]);
    }

    fn quest_from_fixture(id: &str) -> Quest {
        let json = std::fs::read_to_string("tests/data/quests.json").unwrap();
        QuestList::parse(&json)
            .unwrap()
            .quests
            .into_iter()
            .find(|quest| quest.id == id)
            .unwrap()
    }

    #[test]
    fn quest_list_skips_malformed_entries() {
        let list: serde_json::Value =
            serde_json::from_reader(File::open("tests/data/quests.json").unwrap()).unwrap();
        let total = list["list"].as_array().unwrap().len();

        let json = std::fs::read_to_string("tests/data/quests.json").unwrap();
        let parsed = QuestList::parse(&json).unwrap();
        assert_eq!(parsed.quests.len(), total - 1);
        assert!(parsed.quests.iter().all(|quest| quest.id != "broken"));
    }

    #[test]
    fn quest_list_without_list_key_is_empty() {
        assert!(QuestList::parse("{}").unwrap().quests.is_empty());
        assert!(QuestList::parse(r#"{"list": []}"#).unwrap().quests.is_empty());
    }

    #[test]
    fn quest_id_list() {
        let ids = QuestList::parse_ids(r#"{"list": ["q1", 2, "q3"]}"#).unwrap();
        assert_eq!(ids, ["q1", "q3"]);
        assert!(QuestList::parse_ids(r#"{}"#).unwrap().is_empty());
        assert!(QuestList::parse_ids("[").is_err());
    }
}
