//! End-to-end runs of the logger against replayed tick logs and CSV outputs

use std::fs;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use pitlog::{
    DriverKey, LoggerConfig, LoggerEvent, PersistenceSink, Pitlog, PitlogError, ReplaySource,
    SessionEpoch, SqliteSink,
};
use tempfile::TempDir;

const RACE: &str = "\
session_num: 7
session_time: 0.0
on_pit_road: [false, true, false]
lap: [1, 0, 1]
best_lap_time: [-1.0, -1.0, -1.0]
drivers:
  - CarIdx: 0
    UserName: Ana Costa
    TeamName: Tortoise Racing
    CarClassShortName: GT3
  - CarIdx: 1
    UserName: Pace Car
    CarIsPaceCar: 1
  - CarIdx: 2
    UserName: Bo Lind
    TeamName: Hare GP
    CarClassShortName: LMP2
---
session_num: 7
session_time: 300.0
on_pit_road: [false, true, false]
lap: [4, 0, 5]
best_lap_time: [91.2, -1.0, 88.4]
---
connected: false
---
session_num: 7
session_time: 380.0
on_pit_road: [true, true, false]
lap: [5, 0, 6]
best_lap_time: [90.8, -1.0, 88.1]
---
session_num: 7
session_time: 400.0
on_pit_road: [false, true, false]
lap: [5, 0, 6]
best_lap_time: [90.8, -1.0, 88.1]
";

fn config(dir: &Path) -> LoggerConfig {
    LoggerConfig {
        stint_log_path: dir.join("pitstop_log.csv"),
        totals_path: dir.join("driver_times.csv"),
        archive_dir: dir.join("RaceLogs"),
        ..Default::default()
    }
}

fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().skip(1).map(str::to_owned).collect()
}

#[tokio::test]
async fn replay_writes_stint_log_and_totals() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let source = ReplaySource::from_yaml_str(RACE, Duration::ZERO).unwrap();

    let handle = Pitlog::start(source, config.clone()).unwrap();
    let events = handle.events();
    let summary = handle.join().await.unwrap();
    let events: Vec<_> = events.collect().await;

    // One pit entry for car 0; car 2 never pits; the pace car is ignored
    let stints = data_lines(&config.stint_log_path);
    assert_eq!(stints.len(), 1);
    assert!(stints[0].starts_with("0,GT3,Tortoise Racing,Ana Costa,"), "{}", stints[0]);
    assert!(stints[0].contains(",0.000,380.000,1,5,"), "{}", stints[0]);
    assert!(stints[0].ends_with(",4"), "{}", stints[0]);

    let tortoise = DriverKey::new("Tortoise Racing", "Ana Costa");
    let hare = DriverKey::new("Hare GP", "Bo Lind");
    assert_eq!(summary.totals[&tortoise].total_laps, 4);
    assert_eq!(summary.totals[&tortoise].best_lap_seconds, Some(90.8f32 as f64));
    // Car 2 and car 0's second stint are flushed on shutdown
    assert_eq!(summary.totals[&hare].total_laps, 5);
    assert_eq!(summary.partial_stints.len(), 2);
    assert_eq!(summary.totals.len(), 2);

    let totals = fs::read_to_string(&config.totals_path).unwrap();
    assert!(totals.starts_with("TeamName,DriverName,Total Time (sec)"));
    assert!(totals.contains("Hare GP,Bo Lind,"));

    assert!(matches!(events.first(), Some(LoggerEvent::StintClosed(r)) if r.car_index == 0));
    assert_eq!(events.last(), Some(&LoggerEvent::ShutdownFlush { partial_stints: 2 }));
}

#[tokio::test]
async fn restart_in_same_session_resumes_totals() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let key = DriverKey::new("Tortoise Racing", "Ana Costa");

    let first = ReplaySource::from_yaml_str(RACE, Duration::ZERO).unwrap();
    let before = Pitlog::start(first, config.clone()).unwrap().join().await.unwrap();

    let second = ReplaySource::from_yaml_str(RACE, Duration::ZERO).unwrap();
    let after = Pitlog::start(second, config.clone()).unwrap().join().await.unwrap();

    assert_eq!(after.stats.rollovers, 0);
    assert_eq!(after.totals[&key].total_laps, before.totals[&key].total_laps + 4);
    assert_eq!(data_lines(&config.stint_log_path).len(), 2);
}

#[tokio::test]
async fn session_change_archives_and_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let next_session = "\
---
session_num: 8
session_time: 0.0
on_pit_road: [true, true, true]
lap: [0, 0, 0]
best_lap_time: [-1.0, -1.0, -1.0]
";
    let log = format!("{RACE}{next_session}");
    let source = ReplaySource::from_yaml_str(&log, Duration::ZERO).unwrap();

    let handle = Pitlog::start(source, config.clone()).unwrap();
    let mut events = handle.events();
    let summary = handle.join().await.unwrap();

    let mut change = None;
    while let Some(event) = events.next().await {
        if let LoggerEvent::SessionChanged(c) = event {
            change = Some(c);
        }
    }
    let change = change.expect("session change event");
    assert_eq!((change.old, change.new), (SessionEpoch(7), SessionEpoch(8)));

    // Everyone starts the new session in the pits: nothing to flush
    assert!(summary.totals.is_empty());
    assert!(summary.partial_stints.is_empty());
    assert!(data_lines(&config.stint_log_path).is_empty());

    let archived: Vec<_> = fs::read_dir(&config.archive_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(archived.len(), 2);
    assert!(archived.iter().any(|n| n.starts_with("pitstop_log_") && n.ends_with(".csv")));
    assert!(archived.iter().any(|n| n.starts_with("driver_times_")));
}

#[tokio::test]
async fn database_mirrors_stints_and_totals() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("race.db");
    let config = LoggerConfig { db_path: Some(db_path.clone()), ..config(dir.path()) };
    let source = ReplaySource::from_yaml_str(RACE, Duration::ZERO).unwrap();

    let summary = Pitlog::start(source, config.clone()).unwrap().join().await.unwrap();
    assert_eq!(summary.stats.persistence_errors, 0);

    let db = SqliteSink::open(&db_path).unwrap();
    assert_eq!(db.stint_count().unwrap(), data_lines(&config.stint_log_path).len());
    let mirrored: Vec<_> = db.load_totals().unwrap();
    assert_eq!(mirrored.len(), summary.totals.len());
    for (key, totals) in mirrored {
        assert_eq!(summary.totals[&key].total_laps, totals.total_laps);
    }
}

#[tokio::test]
async fn corrupt_tick_log_is_rejected_before_start() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "lap: [1]\n---\nlap: {oops\n").unwrap();

    let err = Pitlog::replay(&path, config(dir.path()), 1.0).err().expect("parse failure");
    assert!(matches!(err, PitlogError::Parse { .. }), "{err}");
    assert!(!dir.path().join("pitstop_log.csv").exists());
}
