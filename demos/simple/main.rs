use questline::{
    is_in_control_group, AttributeValue, Attributes, ControllerConfig, QuestController,
    TransitionEvent,
};

const QUESTS: &str = r#"{
  "list": [
    {
      "_id": "daily-gems",
      "name": "Collect gems",
      "milestones": [
        {"order": 1, "goal": 3, "prizeSku": "gems_10", "prizeValue": 10},
        {"order": 2, "goal": 5, "prizeSku": "gems_50", "prizeValue": 50}
      ],
      "triggers": {
        "state": {"welcome": ["app_open"], "progress": ["gem_collected"], "finish": ["day_end"]},
        "ui": {"welcome": ["home_screen"], "progress": ["home_screen"], "finish": ["home_screen"]}
      },
      "targetFilter": {"country": {"$in": ["DE", "AT"]}, "app_version": {"$vgte": "2.0.0"}}
    }
  ]
}"#;

pub fn main() -> questline::Result<()> {
    // Configure env_logger to see questline logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("questline")).init();

    let user: AttributeValue = serde_json::json!({
        "distinct_id": "user-42",
        "country": "DE",
        "app_version": "2.3.1",
    })
    .into();

    if is_in_control_group("quests-rollout", "user-42") {
        println!("user-42 is in the control group, quests stay hidden");
        return Ok(());
    }

    let mut controller = QuestController::from_documents(
        ControllerConfig::new().transition_logger(|event: TransitionEvent| {
            println!("Reporting transition: {:?}", event);
        }),
        QUESTS,
        r#"{"list": []}"#,
        user,
    )?;

    let no_properties = Attributes::new();
    let gem: Attributes = [("amount".to_owned(), AttributeValue::from(1.0))].into();
    let events = [
        ("app_open", &no_properties),
        ("home_screen", &no_properties),
        ("gem_collected", &gem),
        ("gem_collected", &gem),
        ("home_screen", &no_properties),
        ("gem_collected", &gem),
        ("gem_collected", &gem),
        ("gem_collected", &gem),
        ("home_screen", &no_properties),
    ];
    for (event_name, properties) in events {
        let decision = controller.process_event(event_name, properties);
        println!(
            "{event_name}: {}",
            serde_json::to_string(&decision).unwrap()
        );
    }

    if let Some(quest) = controller.finalize("daily-gems") {
        println!("claimed prize: {:?}", quest.prize());
    }

    Ok(())
}
