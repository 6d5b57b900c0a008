//! Engine ordering and dirty-state tests

use crate::fixtures::*;
use crate::mock_database::*;
use dbmigrate_core::{
    Backend, Closer, DirectorySource, DriverConfig, EmbeddedSource, Migrate, MigrateError,
    Migration, MigrationLogger, MigrationSource, VersionState,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;

async fn engine(backend: &MockBackend, source: Box<dyn MigrationSource>) -> Migrate {
    let conn = backend
        .open(&SecretString::new("postgres://mock".to_string()))
        .await
        .unwrap();
    let driver = backend
        .with_instance(conn, DriverConfig::new("app"))
        .await
        .map_err(|(_, e)| e)
        .unwrap();
    Migrate::with_instance(source, driver, MigrationLogger::new(false))
        .await
        .map_err(|failure| failure.error)
        .unwrap()
}

async fn sample_engine(backend: &MockBackend) -> Migrate {
    engine(backend, Box::new(EmbeddedSource::new(sample_migrations()))).await
}

#[tokio::test]
async fn test_up_applies_in_version_order() {
    let backend = MockBackend::new();
    let mut shuffled = sample_migrations();
    shuffled.reverse();
    let mut migrate = engine(&backend, Box::new(EmbeddedSource::new(shuffled))).await;

    migrate.up().await.unwrap();

    assert_eq!(
        backend.executed(),
        vec![
            "CREATE TABLE a (id INT);",
            "CREATE TABLE b (id INT);",
            "CREATE TABLE c (id INT);",
        ]
    );
    assert_eq!(
        backend.state().version_writes,
        vec![
            (Some(1), true),
            (Some(1), false),
            (Some(2), true),
            (Some(2), false),
            (Some(3), true),
            (Some(3), false),
        ]
    );
}

#[tokio::test]
async fn test_up_with_nothing_pending_is_no_change() {
    let backend = MockBackend::new();
    let mut migrate = sample_engine(&backend).await;

    migrate.up().await.unwrap();
    assert!(matches!(migrate.up().await, Err(MigrateError::NoChange)));
}

#[tokio::test]
async fn test_down_marks_own_version_dirty() {
    let backend = MockBackend::new();
    let mut migrate = sample_engine(&backend).await;
    migrate.migrate(2).await.unwrap();
    backend.state().version_writes.clear();

    migrate.down().await.unwrap();

    assert_eq!(
        backend.state().version_writes,
        vec![(Some(2), true), (Some(1), false), (Some(1), true), (None, false)]
    );
    assert_eq!(backend.version(), None);
}

#[tokio::test]
async fn test_migrate_forward_and_back() {
    let backend = MockBackend::new();
    let mut migrate = sample_engine(&backend).await;

    migrate.migrate(3).await.unwrap();
    migrate.migrate(1).await.unwrap();

    assert_eq!(
        backend.version(),
        Some(VersionState {
            version: 1,
            dirty: false
        })
    );
    let executed = backend.executed();
    assert_eq!(&executed[3..], &["DROP TABLE c;", "DROP TABLE b;"]);
}

#[tokio::test]
async fn test_migrate_to_unknown_version() {
    let backend = MockBackend::new();
    let mut migrate = sample_engine(&backend).await;

    let err = migrate.migrate(42).await.unwrap_err();
    assert!(matches!(err, MigrateError::UnknownVersion(42)));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_down_without_down_body() {
    let backend = MockBackend::new();
    let migrations = vec![
        Migration::new(1, "one", "CREATE TABLE one (id INT);").with_down("DROP TABLE one;"),
        Migration::new(2, "two", "CREATE TABLE two (id INT);"),
    ];
    let mut migrate = engine(&backend, Box::new(EmbeddedSource::new(migrations))).await;
    migrate.up().await.unwrap();

    let err = migrate.down().await.unwrap_err();
    assert!(matches!(err, MigrateError::MissingDown { version: 2 }));
    assert_eq!(backend.version().map(|v| v.version), Some(2));
}

#[tokio::test]
async fn test_dirty_state_blocks_until_forced() {
    let backend = MockBackend::new().configure(|s| {
        s.version = Some(VersionState {
            version: 2,
            dirty: true,
        });
    });
    let mut migrate = sample_engine(&backend).await;

    assert!(matches!(migrate.up().await, Err(MigrateError::Dirty(2))));
    assert!(matches!(migrate.down().await, Err(MigrateError::Dirty(2))));
    assert!(matches!(migrate.migrate(1).await, Err(MigrateError::Dirty(2))));

    migrate.force(2).await.unwrap();
    migrate.up().await.unwrap();
    assert_eq!(backend.executed(), vec!["CREATE TABLE c (id INT);"]);
}

#[tokio::test]
async fn test_drop_all_resets_version() {
    let backend = MockBackend::new();
    let mut migrate = sample_engine(&backend).await;

    migrate.up().await.unwrap();
    migrate.drop_all().await.unwrap();

    assert_eq!(migrate.version().await.unwrap(), None);
    migrate.up().await.unwrap();
    assert_eq!(backend.version().map(|v| v.version), Some(3));
}

#[tokio::test]
async fn test_broken_source_hands_back_resources() {
    let backend = MockBackend::new().configure(|s| s.fail_source_list = Some("gone".into()));
    let conn = backend
        .open(&SecretString::new("postgres://mock".to_string()))
        .await
        .unwrap();
    let driver = backend
        .with_instance(conn, DriverConfig::new("app"))
        .await
        .map_err(|(_, e)| e)
        .unwrap();

    let Err(failure) = Migrate::with_instance(
        Box::new(backend.source(sample_migrations())),
        driver,
        MigrationLogger::new(false),
    )
    .await
    else {
        panic!("a failing source should reject construction");
    };

    assert!(matches!(failure.error, MigrateError::Source(_)));
    assert_eq!(failure.source.kind(), "mock source");
    assert_eq!(failure.driver.kind(), "mock driver");
    assert_eq!(backend.events(), vec!["open", "driver"]);
}

#[tokio::test]
async fn test_directory_fixtures_apply_in_order() {
    let backend = MockBackend::new();
    let source = DirectorySource::open(migrations_dir()).await.unwrap();
    let mut migrate = engine(&backend, Box::new(source)).await;

    migrate.migrate(FIRST_VERSION).await.unwrap();
    assert_eq!(backend.executed().len(), 1);
    assert!(backend.executed()[0].contains("update_updated_at_column"));

    migrate.up().await.unwrap();
    assert_eq!(backend.version().map(|v| v.version), Some(SECOND_VERSION));
    assert!(backend.executed()[1].contains("CREATE TABLE IF NOT EXISTS test_table"));

    migrate.down().await.unwrap();
    assert_eq!(backend.version(), None);

    let (source, database) = migrate.close().await;
    assert!(source.is_ok());
    assert!(database.is_ok());
}

/// The fixture files compiled in, as a binary would ship them
fn embedded_fixtures() -> EmbeddedSource {
    EmbeddedSource::from_files([
        (
            "20250319124829_create_updated_at_function.up.sql",
            include_str!("../testdata/migrations/20250319124829_create_updated_at_function.up.sql"),
        ),
        (
            "20250319124829_create_updated_at_function.down.sql",
            include_str!("../testdata/migrations/20250319124829_create_updated_at_function.down.sql"),
        ),
        (
            "20250319130512_create_test_table.up.sql",
            include_str!("../testdata/migrations/20250319130512_create_test_table.up.sql"),
        ),
        (
            "20250319130512_create_test_table.down.sql",
            include_str!("../testdata/migrations/20250319130512_create_test_table.down.sql"),
        ),
    ])
    .expect("fixture names should parse")
}

#[tokio::test]
async fn test_embedded_fixtures_match_directory() {
    let mut embedded = embedded_fixtures();
    let mut directory = DirectorySource::open(migrations_dir()).await.unwrap();
    assert_eq!(
        embedded.migrations().await.unwrap(),
        directory.migrations().await.unwrap()
    );

    let backend = MockBackend::new();
    let mut migrate = engine(&backend, Box::new(embedded)).await;
    migrate.up().await.unwrap();
    assert_eq!(backend.version().map(|v| v.version), Some(SECOND_VERSION));

    let (source, database) = migrate.close().await;
    assert!(source.is_ok());
    assert!(database.is_ok());
}

#[tokio::test]
async fn test_closed_source_is_rejected() {
    let backend = MockBackend::new();
    let mut source = EmbeddedSource::new(sample_migrations());
    source.close().await.unwrap();

    let conn = backend
        .open(&SecretString::new("postgres://mock".to_string()))
        .await
        .unwrap();
    let driver = backend
        .with_instance(conn, DriverConfig::new("app"))
        .await
        .map_err(|(_, e)| e)
        .unwrap();

    let Err(failure) =
        Migrate::with_instance(Box::new(source), driver, MigrationLogger::new(false)).await
    else {
        panic!("a closed source should reject construction");
    };
    assert!(matches!(failure.error, MigrateError::Closed("embedded source")));
}
