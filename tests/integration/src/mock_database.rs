//! In-memory database collaborators for integration testing
//!
//! A [`MockBackend`] hands out connections and drivers that share one
//! [`MockState`], so a test can inspect every statement and lifecycle event
//! after the session is gone, and inject failures at each step.

use async_trait::async_trait;
use dbmigrate_core::{
    Backend, Closer, DatabaseDriver, DriverConfig, MigrateError, Migration, MigrationSource,
    Result, SqlConnection, TokenProvider, TokenRequest, VersionState,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Shared state behind every mock resource created from one backend
#[derive(Debug, Default)]
pub struct MockState {
    /// Lifecycle events in order, e.g. `"open"`, `"close connection"`
    pub events: Vec<String>,
    /// Every statement executed on a connection or run by a driver
    pub executed: Vec<String>,
    /// DSNs passed to `open`
    pub dsns: Vec<String>,
    /// Stored version pointer
    pub version: Option<VersionState>,
    /// Every version pointer write, in order
    pub version_writes: Vec<(Option<i64>, bool)>,
    /// Driver config passed to `with_instance`
    pub driver_config: Option<DriverConfig>,

    /// Fail `open` with this message
    pub fail_open: Option<String>,
    /// Fail raw connection statements with this message
    pub fail_execute: Option<String>,
    /// Fail `with_instance` with this message
    pub fail_with_instance: Option<String>,
    /// Fail closing the raw connection with this message
    pub fail_close_connection: Option<String>,
    /// Fail closing the driver with this message
    pub fail_close_driver: Option<String>,
    /// Fail driver `run` for bodies containing this text
    pub fail_run_containing: Option<String>,
    /// Fail `drop_all` with this message
    pub fail_drop: Option<String>,
    /// Fail listing the source with this message
    pub fail_source_list: Option<String>,
    /// Fail closing the source with this message
    pub fail_close_source: Option<String>,
}

/// Backend producing [`MockConnection`]s and [`MockDriver`]s
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a backend with no injected failures
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the shared state, typically to inject failures
    pub fn configure(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state());
        self
    }

    /// Lock the shared state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Lifecycle events so far
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    /// Statements executed so far
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Current version pointer
    pub fn version(&self) -> Option<VersionState> {
        self.state().version
    }

    /// A source sharing this backend's state
    pub fn source(&self, migrations: Vec<Migration>) -> MockSource {
        MockSource {
            migrations,
            state: Arc::clone(&self.state),
        }
    }
}

fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl Backend for MockBackend {
    type Connection = MockConnection;

    async fn open(&self, dsn: &SecretString) -> Result<MockConnection> {
        let mut state = self.state();
        state.dsns.push(dsn.expose_secret().clone());
        if let Some(msg) = &state.fail_open {
            return Err(MigrateError::connection(msg.clone()));
        }
        state.events.push("open".to_string());
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }

    async fn with_instance(
        &self,
        conn: MockConnection,
        config: DriverConfig,
    ) -> std::result::Result<Box<dyn DatabaseDriver>, (MockConnection, MigrateError)> {
        let mut state = self.state();
        state.driver_config = Some(config);
        if let Some(msg) = state.fail_with_instance.clone() {
            drop(state);
            return Err((conn, MigrateError::execution(msg)));
        }
        state.events.push("driver".to_string());
        Ok(Box::new(MockDriver {
            state: Arc::clone(&conn.state),
        }))
    }
}

/// Raw connection handed out by [`MockBackend::open`]
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Closer for MockConnection {
    fn kind(&self) -> &'static str {
        "mock connection"
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push("close connection".to_string());
        match &state.fail_close_connection {
            Some(msg) => Err(MigrateError::close(self.kind(), msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut state = lock(&self.state);
        state.executed.push(sql.to_string());
        match &state.fail_execute {
            Some(msg) => Err(MigrateError::execution(msg.clone())),
            None => Ok(0),
        }
    }
}

/// Driver keeping its version pointer in [`MockState`]
#[derive(Debug)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Closer for MockDriver {
    fn kind(&self) -> &'static str {
        "mock driver"
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push("close driver".to_string());
        match &state.fail_close_driver {
            Some(msg) => Err(MigrateError::close(self.kind(), msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    async fn version(&mut self) -> Result<Option<VersionState>> {
        Ok(lock(&self.state).version)
    }

    async fn set_version(&mut self, version: Option<i64>, dirty: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.version_writes.push((version, dirty));
        state.version = version.map(|version| VersionState { version, dirty });
        Ok(())
    }

    async fn run(&mut self, sql: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(needle) = &state.fail_run_containing {
            if sql.contains(needle.as_str()) {
                return Err(MigrateError::execution(format!("failed running {sql:?}")));
            }
        }
        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn drop_all(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(msg) = &state.fail_drop {
            return Err(MigrateError::execution(msg.clone()));
        }
        state.executed.push("DROP ALL".to_string());
        state.version = None;
        Ok(())
    }
}

/// Source serving a fixed list of migrations
#[derive(Debug)]
pub struct MockSource {
    migrations: Vec<Migration>,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Closer for MockSource {
    fn kind(&self) -> &'static str {
        "mock source"
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push("close source".to_string());
        match &state.fail_close_source {
            Some(msg) => Err(MigrateError::close(self.kind(), msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MigrationSource for MockSource {
    async fn migrations(&mut self) -> Result<Vec<Migration>> {
        let state = lock(&self.state);
        if let Some(msg) = &state.fail_source_list {
            return Err(MigrateError::source_error(msg.clone()));
        }
        let mut migrations = self.migrations.clone();
        migrations.sort_by_key(|m| m.version);
        Ok(migrations)
    }
}

/// Token provider returning a canned result
#[derive(Debug, Clone)]
pub struct MockTokenProvider {
    result: std::result::Result<String, String>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<TokenRequest>>>,
}

impl MockTokenProvider {
    /// Provider that always issues `token`
    pub fn issuing(token: &str) -> Self {
        Self {
            result: Ok(token.to_string()),
            delay: None,
            requests: Arc::default(),
        }
    }

    /// Provider that always fails with `msg`
    pub fn failing(msg: &str) -> Self {
        Self {
            result: Err(msg.to_string()),
            delay: None,
            requests: Arc::default(),
        }
    }

    /// Wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn build_auth_token(&self, request: &TokenRequest) -> Result<SecretString> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.result {
            Ok(token) => Ok(SecretString::new(token.clone())),
            Err(msg) => Err(MigrateError::credential(msg.clone())),
        }
    }
}
