use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use quest_engine::{
    Bounds, Composition, EngineConfig, Quest, QuestError, QuestEvent, QuestId, QuestItem,
    QuestManager, QuestSession,
};

// ============================================================================
// Demo quests
// ============================================================================

/// A supply run (gather herbs, then reach the village before time runs out)
/// alongside a scouting quest that visits two towers in any order.
fn build_quests(manager: &mut QuestManager) -> Result<Vec<QuestId>, QuestError> {
    let mut supply = Quest::multi(
        "Supply Run",
        "Bring herbs to the village",
        Composition::Sequential,
    );
    supply.add_reward(QuestItem::new("gold", 40))?;
    supply.add_child(Quest::fetch(
        "Gather Herbs",
        "Pick two herbs",
        [QuestItem::single("herb"), QuestItem::single("herb")],
    ))?;
    let mut deliver = Quest::destination(
        "Deliver",
        "Reach the village",
        Bounds::from_center_size([12.0, 0.0, 0.0], [2.0, 2.0, 2.0]),
    );
    deliver.set_time_limit(10.0)?;
    supply.add_child(deliver)?;

    let mut scout = Quest::multi("Scout", "Visit both towers", Composition::Parallel);
    scout.add_reward(QuestItem::new("map_fragment", 1))?;
    scout.add_child(Quest::destination(
        "East Tower",
        "",
        Bounds::from_center_size([6.0, 0.0, 0.0], [1.0, 4.0, 1.0]),
    ))?;
    scout.add_child(Quest::destination(
        "West Tower",
        "",
        Bounds::from_center_size([16.0, 0.0, 0.0], [1.0, 4.0, 1.0]),
    ))?;

    Ok(vec![manager.add_quest(supply), manager.add_quest(scout)])
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quest_engine=info".parse().expect("static log directive")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let mut manager = QuestManager::with_config(&config);
    let roots = match build_quests(&mut manager) {
        Ok(roots) => roots,
        Err(e) => {
            error!("Failed to build quests: {}", e);
            std::process::exit(1);
        }
    };

    // The walker moves two units along x per second
    let position = Arc::new(Mutex::new(0.0_f32));
    let walker = Arc::clone(&position);
    let source = move || {
        let x = walker.lock().map(|x| *x).unwrap_or_default();
        vec![Bounds::from_center_size([x, 0.0, 0.0], [1.0, 2.0, 1.0])]
    };

    let mut session = QuestSession::new(manager, source, config.clone());
    let mut events = session.subscribe();
    let handle = session.handle();
    for id in &roots {
        handle.start_quest(*id);
    }
    session.start_tracking_location();
    let session_task = tokio::spawn(session.run());

    // Game loop stand-in: walk east and pick up herbs on the way
    let game_handle = handle.clone();
    let step = config.location_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(step);
        let mut ticks = 0u32;
        loop {
            interval.tick().await;
            ticks += 1;
            if let Ok(mut x) = position.lock() {
                *x += 2.0 * step.as_secs_f32();
            }
            if ticks <= 2 && !game_handle.item_fetched(QuestItem::single("herb")) {
                break;
            }
        }
    });

    let mut finished = 0;
    while finished < roots.len() {
        match events.recv().await {
            Ok(event) => {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to encode event: {}", e),
                }
                if matches!(event, QuestEvent::Completed { .. } | QuestEvent::Failed { .. }) {
                    finished += 1;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Missed {} quest events", skipped),
            Err(RecvError::Closed) => break,
        }
    }

    handle.shutdown();
    match tokio::time::timeout(Duration::from_secs(5), session_task).await {
        Ok(Ok(manager)) => {
            for quest in manager.quests(None) {
                info!(
                    "{} finished as {} after {}s",
                    quest.name(),
                    quest.status(),
                    quest.elapsed_secs().unwrap_or_default()
                );
            }
        }
        Ok(Err(e)) => error!("Session task failed: {}", e),
        Err(_) => error!("Session did not stop in time"),
    }
}
