use std::path::PathBuf;

use slog::Logger;

use crate::config::{self, Config};
use crate::core::common::{DatabaseOpener, GatewayStarter};
use crate::core::database::{self, DefaultDatabaseOpener};
use crate::core::gateway::DefaultGatewayStarter;
use crate::error::{BootResult, StartupError};
use crate::prelude::*;

/// Config file expected next to the executable
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Phases of the startup sequence, in the order they are entered.
///
/// The sequence is strictly linear: a phase is entered only after the
/// previous one finished, and the first failure parks the application
/// in `Failed` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    NotStarted,
    ConfigLoading,
    Validating,
    ConnectingDatabase,
    StartingClient,
    Running,
    Failed,
}

pub struct Application<D, G>
where
    D: DatabaseOpener,
    G: GatewayStarter,
{
    logger: Logger,
    config_path: PathBuf,
    database_opener: D,
    gateway_starter: G,
    phase: BootPhase,
    config: Option<Config>,
    database: Option<D::Handle>,
    gateway: Option<G::Session>,
}

/// Builder type for the construction of the application
pub struct ApplicationBuilder<D, G>
where
    D: DatabaseOpener,
    G: GatewayStarter,
{
    logger: Option<Logger>,
    config_path: Option<PathBuf>,
    database_opener: Option<D>,
    gateway_starter: Option<G>,
}

impl<D, G> Default for ApplicationBuilder<D, G>
where
    D: DatabaseOpener,
    G: GatewayStarter,
{
    fn default() -> Self {
        ApplicationBuilder {
            logger: None,
            config_path: None,
            database_opener: None,
            gateway_starter: None,
        }
    }
}

impl<D, G> ApplicationBuilder<D, G>
where
    D: DatabaseOpener,
    G: GatewayStarter,
{
    /// Set the logger for the application and all of its components
    pub fn logger(self, logger: Logger) -> Self {
        Self {
            logger: Some(logger),
            ..self
        }
    }

    /// Set the path of the config file ('config.toml' by default)
    pub fn config_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            config_path: Some(path.into()),
            ..self
        }
    }

    /// Swap the database collaborator
    pub fn database_opener<D2: DatabaseOpener>(self, opener: D2) -> ApplicationBuilder<D2, G> {
        ApplicationBuilder {
            logger: self.logger,
            config_path: self.config_path,
            database_opener: Some(opener),
            gateway_starter: self.gateway_starter,
        }
    }

    /// Swap the gateway collaborator
    pub fn gateway_starter<G2: GatewayStarter>(self, starter: G2) -> ApplicationBuilder<D, G2> {
        ApplicationBuilder {
            logger: self.logger,
            config_path: self.config_path,
            database_opener: self.database_opener,
            gateway_starter: Some(starter),
        }
    }

    pub fn build(self) -> Application<D, G> {
        Application {
            logger: self
                .logger
                .expect("Did not provide a logger for ApplicationBuilder"),
            config_path: self
                .config_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            database_opener: self
                .database_opener
                .expect("Did not provide a database opener for ApplicationBuilder"),
            gateway_starter: self
                .gateway_starter
                .expect("Did not provide a gateway starter for ApplicationBuilder"),
            phase: BootPhase::NotStarted,
            config: None,
            database: None,
            gateway: None,
        }
    }
}

impl Application<DefaultDatabaseOpener, DefaultGatewayStarter> {
    pub fn new() -> ApplicationBuilder<DefaultDatabaseOpener, DefaultGatewayStarter> {
        ApplicationBuilder::default()
    }

    /// Drive the gateway session until it ends on its own or the
    /// process receives an interrupt. Either way the database
    /// connection is closed before returning.
    pub async fn run(&mut self) -> BootResult {
        let mut session = match self.gateway.take() {
            Some(session) => session,
            None => {
                warn!(self.logger, "Nothing to run, the gateway client is not started");
                return Ok(());
            }
        };
        let shard_manager = session.shard_manager.clone();

        tokio::select! {
            outcome = session.start() => {
                if let Err(why) = outcome {
                    crit!(self.logger, "Gateway session aborted"; "reason" => why.to_string());
                    self.shutdown().await;
                    self.phase = BootPhase::Failed;
                    return Err(StartupError::GatewayStartFailed(why));
                }
                info!(self.logger, "Gateway session ended");
            }
            _ = tokio::signal::ctrl_c() => {
                info!(self.logger, "Interrupt received, shutting down");
                shard_manager.shutdown_all().await;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(pool) = self.database.take() {
            pool.close().await;
            info!(self.logger, "Database connection closed");
        }
    }
}

impl<D, G> Application<D, G>
where
    D: DatabaseOpener,
    G: GatewayStarter,
{
    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn database(&self) -> Option<&D::Handle> {
        self.database.as_ref()
    }

    pub fn gateway(&self) -> Option<&G::Session> {
        self.gateway.as_ref()
    }

    fn introduce_self(&self) {
        info!(self.logger, "Starting QueenCorsar discord bot";
            "upstream" => "https://github.com/AlterEigo/QueensCorsarDcBot",
            "email" => "iaroslav.sorokin@gmail.com",
            "author" => "Iaroslav Sorokin",
            "version" => config::PACKAGE_VERSION,
        );
    }

    /// Run the whole startup sequence: materialize the config if it is
    /// absent, load and validate it, connect to the database, then
    /// start the gateway client.
    ///
    /// The first failing step aborts the sequence; later steps are not
    /// attempted and whatever was already acquired is released.
    pub async fn bootstrap(&mut self) -> BootResult {
        self.introduce_self();
        match self.try_bootstrap().await {
            Ok(()) => {
                self.phase = BootPhase::Running;
                info!(self.logger, "Startup sequence complete");
                Ok(())
            }
            Err(why) => {
                crit!(self.logger, "Startup aborted";
                    "phase" => format!("{:?}", self.phase),
                    "reason" => why.to_string(),
                );
                self.release_partial();
                self.phase = BootPhase::Failed;
                Err(why)
            }
        }
    }

    async fn try_bootstrap(&mut self) -> BootResult {
        self.phase = BootPhase::ConfigLoading;
        config::ensure_exists(&self.logger, &self.config_path)?;

        self.phase = BootPhase::Validating;
        let config = config::load(&self.logger, &self.config_path)?;
        debug!(self.logger, "API credential fetched");
        info!(self.logger, "Config validated";
            "path" => self.config_path.display().to_string(),
            "database" => config.database_name().to_owned(),
        );

        self.phase = BootPhase::ConnectingDatabase;
        let locator = database::locator(config.database_name());
        match self.database_opener.open(&locator).await {
            Ok(handle) => {
                info!(self.logger, "Database connection established"; "locator" => locator.as_str());
                self.database = Some(handle);
            }
            Err(why) => {
                crit!(self.logger, "Database connection failed to be established!";
                    "locator" => locator.as_str(),
                );
                return Err(why);
            }
        }

        self.phase = BootPhase::StartingClient;
        match self.gateway_starter.start(config.api_key()).await {
            Ok(session) => {
                info!(self.logger, "Gateway client instantiated");
                self.gateway = Some(session);
            }
            Err(why) => {
                crit!(self.logger, "Could not instantiate the gateway client with the provided token");
                return Err(why);
            }
        }

        self.config = Some(config);
        Ok(())
    }

    fn release_partial(&mut self) {
        // dropping a sqlx pool finishes closing in the background;
        // a never-started serenity client just goes away with its drop
        self.gateway = None;
        self.database = None;
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[derive(Default)]
    struct CountingOpener {
        calls: Arc<AtomicUsize>,
        locators: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl DatabaseOpener for CountingOpener {
        type Handle = ();

        async fn open(&self, locator: &str) -> BootResult<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.locators.lock().unwrap().push(locator.to_owned());
            if self.fail {
                Err(StartupError::DatabaseConnectionFailed(
                    sqlx::Error::PoolClosed,
                ))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct CountingStarter {
        calls: Arc<AtomicUsize>,
        keys: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl GatewayStarter for CountingStarter {
        type Session = ();

        async fn start(&self, api_key: &str) -> BootResult<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.keys.lock().unwrap().push(api_key.to_owned());
            if self.fail {
                Err(StartupError::GatewayStartFailed(serenity::Error::Other(
                    "gateway refused",
                )))
            } else {
                Ok(())
            }
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).expect("test config should be writable");
        path
    }

    fn test_app(
        path: PathBuf,
        opener: CountingOpener,
        starter: CountingStarter,
    ) -> Application<CountingOpener, CountingStarter> {
        Application::new()
            .logger(test_logger())
            .config_path(path)
            .database_opener(opener)
            .gateway_starter(starter)
            .build()
    }

    #[tokio::test]
    async fn full_sequence_reaches_running_and_hands_values_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "api_key = \"s3cret key\"\ndatabase_name = \"mydb\"\n");
        let locators = Arc::new(Mutex::new(Vec::new()));
        let keys = Arc::new(Mutex::new(Vec::new()));
        let opener = CountingOpener {
            locators: locators.clone(),
            ..Default::default()
        };
        let starter = CountingStarter {
            keys: keys.clone(),
            ..Default::default()
        };
        let mut app = test_app(path, opener, starter);

        app.bootstrap().await.expect("bootstrap should succeed");

        assert_eq!(app.phase(), BootPhase::Running);
        assert_eq!(*locators.lock().unwrap(), vec!["sqlite:mydb".to_owned()]);
        assert_eq!(*keys.lock().unwrap(), vec!["s3cret key".to_owned()]);
        let config = app.config().expect("config should be retained");
        assert_eq!(config.api_key(), "s3cret key");
        assert_eq!(config.database_name(), "mydb");
        assert!(app.database().is_some());
        assert!(app.gateway().is_some());
    }

    #[tokio::test]
    async fn absent_config_is_materialized_and_then_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let locators = Arc::new(Mutex::new(Vec::new()));
        let opener = CountingOpener {
            locators: locators.clone(),
            ..Default::default()
        };
        let mut app = test_app(path.clone(), opener, CountingStarter::default());

        app.bootstrap()
            .await
            .expect("bootstrap should run off the default config");

        assert_eq!(app.phase(), BootPhase::Running);
        let written = std::fs::read_to_string(&path).expect("config should exist now");
        assert_eq!(written, crate::config::DEFAULT_CONFIG);
        assert_eq!(
            *locators.lock().unwrap(),
            vec!["sqlite:corsair.db".to_owned()]
        );
    }

    #[tokio::test]
    async fn missing_api_key_aborts_before_any_collaborator_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "database_name = \"mydb\"\n");
        let open_calls = Arc::new(AtomicUsize::new(0));
        let start_calls = Arc::new(AtomicUsize::new(0));
        let opener = CountingOpener {
            calls: open_calls.clone(),
            ..Default::default()
        };
        let starter = CountingStarter {
            calls: start_calls.clone(),
            ..Default::default()
        };
        let mut app = test_app(path, opener, starter);

        let outcome = app.bootstrap().await;

        match outcome {
            Err(StartupError::MissingRequiredField(field)) => assert_eq!(field, "api_key"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(app.phase(), BootPhase::Failed);
        assert_eq!(open_calls.load(Ordering::Relaxed), 0);
        assert_eq!(start_calls.load(Ordering::Relaxed), 0);
        assert!(app.config().is_none());
        assert!(app.database().is_none());
        assert!(app.gateway().is_none());
    }

    #[tokio::test]
    async fn mistyped_api_key_reports_field_and_expected_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "api_key = 42\ndatabase_name = \"mydb\"\n");
        let open_calls = Arc::new(AtomicUsize::new(0));
        let opener = CountingOpener {
            calls: open_calls.clone(),
            ..Default::default()
        };
        let mut app = test_app(path, opener, CountingStarter::default());

        let outcome = app.bootstrap().await;

        match outcome {
            Err(StartupError::InvalidFieldType { field, expected }) => {
                assert_eq!(field, "api_key");
                assert_eq!(expected, "string");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(app.phase(), BootPhase::Failed);
        assert_eq!(open_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn database_failure_aborts_without_touching_the_gateway() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "api_key = \"token\"\ndatabase_name = \"mydb\"\n");
        let start_calls = Arc::new(AtomicUsize::new(0));
        let opener = CountingOpener {
            fail: true,
            ..Default::default()
        };
        let starter = CountingStarter {
            calls: start_calls.clone(),
            ..Default::default()
        };
        let mut app = test_app(path, opener, starter);

        let outcome = app.bootstrap().await;

        match outcome {
            Err(StartupError::DatabaseConnectionFailed(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(app.phase(), BootPhase::Failed);
        assert_eq!(start_calls.load(Ordering::Relaxed), 0);
        assert!(app.database().is_none());
        assert!(app.gateway().is_none());
    }

    #[tokio::test]
    async fn gateway_failure_releases_the_acquired_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(&dir, "api_key = \"token\"\ndatabase_name = \"mydb\"\n");
        let open_calls = Arc::new(AtomicUsize::new(0));
        let start_calls = Arc::new(AtomicUsize::new(0));
        let opener = CountingOpener {
            calls: open_calls.clone(),
            ..Default::default()
        };
        let starter = CountingStarter {
            calls: start_calls.clone(),
            fail: true,
            ..Default::default()
        };
        let mut app = test_app(path, opener, starter);

        let outcome = app.bootstrap().await;

        match outcome {
            Err(StartupError::GatewayStartFailed(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(app.phase(), BootPhase::Failed);
        assert_eq!(open_calls.load(Ordering::Relaxed), 1);
        assert_eq!(start_calls.load(Ordering::Relaxed), 1);
        assert!(app.database().is_none());
        assert!(app.gateway().is_none());
        assert!(app.config().is_none());
    }

    #[test]
    #[should_panic(expected = "Did not provide a logger")]
    fn builder_requires_a_logger() {
        let _ = ApplicationBuilder::<CountingOpener, CountingStarter>::default()
            .database_opener(CountingOpener::default())
            .gateway_starter(CountingStarter::default())
            .build();
    }
}
