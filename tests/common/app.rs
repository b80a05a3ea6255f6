use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use progress_engine::config::{Config, PersistenceConfig, WorkerConfig};
use progress_engine::progress::ProgressService;
use progress_engine::routes::build_router;
use progress_engine::state::AppState;
use progress_engine::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    _temp_dir: TempDir,
}

pub const TEST_LESSONS: &str = r#"[
    {"id": "basics-1", "category": "basics", "title": "Hello"},
    {"id": "basics-2", "category": "basics", "title": "Numbers"},
    {"id": "grammar-1", "category": "grammar", "title": "Articles"}
]"#;

/// 直接构造 Config，避免使用 set_var 造成多线程测试环境变量竞态
pub fn test_config(temp_dir: &TempDir) -> Config {
    let catalog_path = temp_dir.path().join("lessons.json");
    std::fs::write(&catalog_path, TEST_LESSONS).expect("write lesson catalog");

    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 4850,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: temp_dir
            .path()
            .join("progress-test.sled")
            .to_string_lossy()
            .to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        profile_id: "default".to_string(),
        lesson_catalog_path: Some(catalog_path.to_string_lossy().to_string()),
        persistence: PersistenceConfig {
            debounce_ms: 0,
            skip: false,
        },
        worker: WorkerConfig { enabled: false },
        goal_seed: Some(7),
    }
}

pub fn build_app(config: Config, temp_dir: TempDir) -> TestApp {
    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let progress = Arc::new(ProgressService::open(&config, store.clone()));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, progress, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(&temp_dir);
    build_app(config, temp_dir)
}
