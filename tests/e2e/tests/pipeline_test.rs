//! Full-pipeline behavior over the raw part contract.

use cascade_e2e_tests::Increase;
use config::{SettingDefinitions, SettingsMap};
use pipeline_actors::{
    HeartbeatMonitor, Part, PartEvent, PartEventKind, PartEventListener,
};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn collector(part: &Arc<Part<i64>>, kind: PartEventKind) -> Arc<Mutex<Vec<i64>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        let listener: Arc<dyn PartEventListener<i64>> =
            Arc::new(move |event: &PartEvent<i64>| seen.lock().push(event.payload));
        part.subscribe(kind, listener);
    }
    seen
}

#[tokio::test]
async fn three_stage_pipeline_drains_end_to_end() {
    // +1 -> +10 -> +100, wired through connectors.
    let first = Part::new("first", Increase::new(1), SettingDefinitions::new());
    let second = Part::new("second", Increase::new(10), SettingDefinitions::new());
    let third = Part::new("third", Increase::new(100), SettingDefinitions::new());
    first.connector().add_target(second.clone());
    second.connector().add_target(third.clone());

    let final_values = collector(&third, PartEventKind::Processed);

    let settings = SettingsMap::new();
    third.start(&settings).await.unwrap();
    second.start(&settings).await.unwrap();
    first.start(&settings).await.unwrap();

    for i in 0..10 {
        first.receive(i).await.unwrap();
    }

    // Stopping upstream-first drains each stage into the next.
    first.stop().await.unwrap();
    second.stop().await.unwrap();
    third.stop().await.unwrap();

    let mut seen = final_values.lock().clone();
    seen.sort_unstable();
    let expected: Vec<i64> = (0..10).map(|i| i + 111).collect();
    assert_eq!(seen, expected);

    assert_eq!(first.in_flight(), 0);
    assert_eq!(second.in_flight(), 0);
    assert_eq!(third.in_flight(), 0);
}

#[tokio::test]
async fn fan_out_duplicates_items_to_both_branches() {
    let splitter = Part::new("splitter", Increase::new(0), SettingDefinitions::new());
    let left = Part::new("left", Increase::new(1), SettingDefinitions::new());
    let right = Part::new("right", Increase::new(2), SettingDefinitions::new());
    splitter.connector().add_target(left.clone());
    splitter.connector().add_target(right.clone());

    let left_seen = collector(&left, PartEventKind::Processed);
    let right_seen = collector(&right, PartEventKind::Processed);

    let settings = SettingsMap::new();
    left.start(&settings).await.unwrap();
    right.start(&settings).await.unwrap();
    splitter.start(&settings).await.unwrap();

    splitter.receive(5).await.unwrap();
    splitter.stop().await.unwrap();
    left.stop().await.unwrap();
    right.stop().await.unwrap();

    assert_eq!(*left_seen.lock(), vec![6]);
    assert_eq!(*right_seen.lock(), vec![7]);
}

#[tokio::test]
async fn monitor_flags_a_stopped_part_but_not_a_running_one() {
    let running = Part::new("running", Increase::new(1), SettingDefinitions::new());
    let dead = Part::new("dead", Increase::new(1), SettingDefinitions::new());
    running.start(&SettingsMap::new()).await.unwrap();

    let (monitor, mut reports) = HeartbeatMonitor::new(Duration::from_millis(25));
    monitor.watch(running.clone());
    monitor.watch(dead.clone());
    monitor.start();

    let miss = reports.recv().await.unwrap();
    assert_eq!(miss.part, *dead.id());

    monitor.stop().await;
    running.stop().await.unwrap();

    while let Ok(miss) = reports.try_recv() {
        assert_eq!(miss.part, *dead.id());
    }
}
