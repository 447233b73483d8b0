use anyhow::Result;
use ml::{Controller, ControllerConfig, ControllerError, Weights};
use rl::{
    read_checkpoint, Checkpoint, CheckpointStore, JsonCheckpointStore, PersistenceError,
    FORMAT_VERSION,
};

#[test]
fn round_trip_restores_weights_and_learning_rate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = JsonCheckpointStore::new(dir.path(), "member_00");

    let mut original = Controller::with_weights(
        ControllerConfig::default(),
        Weights::new(0.25, -1.5, 0.125),
    );
    original.set_learning_rate(0.0125);
    let path = store.save(&Checkpoint::from_controller(&original))?;
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    assert!(path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("member_00_")));

    let loaded = store.load(&path)?;
    assert_eq!(loaded.version, FORMAT_VERSION);
    assert_eq!(loaded.typed_weights(), Some(Weights::new(0.25, -1.5, 0.125)));

    let mut restored = Controller::new(ControllerConfig::default());
    loaded.apply_to(&mut restored)?;
    assert!(restored.weights().bit_eq(&original.weights()));
    assert_eq!(restored.learning_rate(), 0.0125);
    Ok(())
}

#[test]
fn files_are_pretty_json_with_an_iso_timestamp() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = JsonCheckpointStore::new(dir.path(), "ckpt");
    let controller = Controller::new(ControllerConfig::default());
    let path = store.save(&Checkpoint::from_controller(&controller))?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let saved_at = value["saved_at"].as_str().unwrap_or_default();
    assert!(chrono::DateTime::parse_from_rfc3339(saved_at).is_ok());
    assert_eq!(value["weights"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn consecutive_saves_do_not_overwrite() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = JsonCheckpointStore::new(dir.path(), "ckpt");
    let controller = Controller::new(ControllerConfig::default());
    let checkpoint = Checkpoint::from_controller(&controller);
    let a = store.save(&checkpoint)?;
    let b = store.save(&checkpoint)?;
    assert_ne!(a, b);
    Ok(())
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(
        read_checkpoint(&path),
        Err(PersistenceError::NotFound(p)) if p == path
    ));
}

#[test]
fn garbage_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"weights\": [1.0, 2.0").unwrap();
    assert!(matches!(
        read_checkpoint(&path),
        Err(PersistenceError::Malformed { .. })
    ));
}

#[test]
fn bad_version_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.json");
    std::fs::write(
        &path,
        r#"{ "weights": [1.0, 2.0, 3.0], "learning_rate": 0.01,
             "saved_at": "2024-05-01T12:00:00Z", "version": "v1" }"#,
    )
    .unwrap();
    assert!(matches!(
        read_checkpoint(&path),
        Err(PersistenceError::Malformed { .. })
    ));
}

#[test]
fn wrong_arity_is_rejected_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.json");
    std::fs::write(
        &path,
        r#"{ "weights": [1.0, 2.0], "learning_rate": 0.02,
             "saved_at": "2024-05-01T12:00:00.250Z", "version": "1.0.0" }"#,
    )
    .unwrap();

    let checkpoint = read_checkpoint(&path).unwrap();
    assert_eq!(checkpoint.typed_weights(), None);

    let mut controller = Controller::new(ControllerConfig::default());
    let before = controller.weights();
    let err = checkpoint.apply_to(&mut controller).unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::InvalidWeights(ControllerError::InvalidWeightVector {
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(controller.weights(), before);
    assert_eq!(controller.learning_rate(), 0.01);
}
