use jacq_bridge::{BridgeConfig, BridgeError, SessionState, WeavingCoordinator};
use jacq_remote::{MemoryStore, RemoteValue};
use jacq_serial::MockTransport;

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");

    let mut config = BridgeConfig::default();
    config.loom_id = "12".to_string();
    config.loom.width = 21;
    config.loom.frame_size = 7;
    config.loom.mask = Some("000000011111110000000".to_string());
    config.serial.port = Some("/dev/ttyACM0".to_string());
    config.save(&path).unwrap();

    let loaded = BridgeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.root_path(), "looms/12/");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = BridgeConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[test]
fn test_loaded_config_drives_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(
        &path,
        r#"
        loom_id = "5"
        root = "studio/{id}"

        [loom]
        width = 21
        frame_size = 7
        "#,
    )
    .unwrap();

    let config = BridgeConfig::load(&path).unwrap();
    let (store, events) = MemoryStore::new();
    let (transport, _serial) = MockTransport::new();
    let mut coordinator =
        WeavingCoordinator::with_transport(&config, store.clone(), transport).unwrap();
    coordinator.attach();
    while let Ok(event) = events.try_recv() {
        coordinator.handle_store_event(&event).unwrap();
    }

    assert_eq!(coordinator.status().root(), "studio/5/");
    assert_eq!(store.get("studio/5/loom-online"), RemoteValue::Bool(true));
    assert_eq!(coordinator.state(), SessionState::Idle);
    assert_eq!(coordinator.driver().loom().geometry().width(), 21);
}

#[test]
fn test_tabby_when_empty_from_config() {
    let config = BridgeConfig::from_toml_str(
        r#"
        loom_id = "3"

        [loom]
        width = 21
        frame_size = 7
        tabby_when_empty = true
        "#,
    )
    .unwrap();
    let (store, _events) = MemoryStore::new();
    let (transport, serial) = MockTransport::new();
    let mut coordinator = WeavingCoordinator::with_transport(&config, store, transport).unwrap();
    assert!(coordinator.tabby_fallback());

    coordinator.attach();
    coordinator.start().unwrap();
    coordinator.handle_device_bytes(&[0xC3]).unwrap();
    coordinator.handle_device_bytes(&[0x61]).unwrap();
    assert_eq!(serial.take_sent().len(), 2);
    assert_eq!(coordinator.pick_number(), 2);
    assert!(!coordinator.device_ready());
}
