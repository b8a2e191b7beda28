use crate::{
    transition_logger::NoopTransitionLogger, AttributeValue, Quest, QuestController,
    TransitionLogger,
};

/// Whether a started quest keeps checking its target filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressFilterPolicy {
    /// The target filter is only checked when the quest starts.
    #[default]
    ActivationOnly,
    /// Every progress event must also match the target filter, evaluated against the user
    /// attributes overlaid with the event properties.
    EveryProgressEvent,
}

/// Configuration for [`QuestController`].
///
/// # Examples
/// ```
/// # use questline::{AttributeValue, ControllerConfig, ProgressFilterPolicy, TransitionEvent};
/// let controller = ControllerConfig::new()
///     .progress_filter_policy(ProgressFilterPolicy::EveryProgressEvent)
///     .transition_logger(|event: TransitionEvent| {
///         println!("{:?}", event);
///     })
///     .to_controller(Vec::new(), &[], AttributeValue::Null);
/// ```
pub struct ControllerConfig<'a> {
    pub(crate) progress_filter_policy: ProgressFilterPolicy,
    pub(crate) transition_logger: Box<dyn TransitionLogger + Send + Sync + 'a>,
}

impl<'a> Default for ControllerConfig<'a> {
    fn default() -> Self {
        ControllerConfig::new()
    }
}

impl<'a> ControllerConfig<'a> {
    /// Create a default configuration: filter checked on activation only, transitions not reported.
    pub fn new() -> Self {
        ControllerConfig {
            progress_filter_policy: ProgressFilterPolicy::default(),
            transition_logger: Box::new(NoopTransitionLogger),
        }
    }

    pub fn progress_filter_policy(mut self, policy: ProgressFilterPolicy) -> Self {
        self.progress_filter_policy = policy;
        self
    }

    /// Set transition logger to report quest starts, progress and finishes to your backend.
    ///
    /// ```
    /// # use questline::{ControllerConfig, TransitionEvent};
    /// let config = ControllerConfig::new().transition_logger(|event: TransitionEvent| {
    ///   println!("{:?}", event);
    /// });
    /// ```
    pub fn transition_logger(
        mut self,
        transition_logger: impl TransitionLogger + Send + Sync + 'a,
    ) -> Self {
        self.transition_logger = Box::new(transition_logger);
        self
    }

    /// Create a new [`QuestController`] over `quests`, excluding the `finalized` quest ids.
    pub fn to_controller(
        self,
        quests: Vec<Quest>,
        finalized: &[String],
        user_attributes: AttributeValue,
    ) -> QuestController<'a> {
        QuestController::new(self, quests, finalized, user_attributes)
    }
}
