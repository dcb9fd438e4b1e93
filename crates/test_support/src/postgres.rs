use anyhow::{Context, Result};
use sqlx::{Connection, Executor, PgConnection};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::time::{sleep, Duration};

use crate::unique_name;

const POSTGRES_PORT: u16 = 5432;
const READY_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    image: String,
    tag: String,
    user: String,
    password: String,
    db_name: String,
}

impl PostgresConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            image: "postgres".to_string(),
            tag: "16-alpine".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            db_name: "postgres".to_string(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway Postgres server. The container stops when this is dropped.
#[derive(Debug)]
pub struct PostgresContainer {
    _container: ContainerAsync<GenericImage>,
    host_port: u16,
    config: PostgresConfig,
}

impl PostgresContainer {
    /// Start a Postgres container and wait until it accepts connections.
    ///
    /// # Errors
    /// Returns an error if no container runtime is available, the container
    /// fails to start, or Postgres never becomes ready.
    pub async fn start() -> Result<Self> {
        Self::start_with_config(PostgresConfig::new()).await
    }

    /// # Errors
    /// Same as [`PostgresContainer::start`].
    pub async fn start_with_config(config: PostgresConfig) -> Result<Self> {
        crate::runtime::ensure_container_runtime()?;
        let container = GenericImage::new(&config.image, &config.tag)
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", &config.user)
            .with_env_var("POSTGRES_PASSWORD", &config.password)
            .with_env_var("POSTGRES_DB", &config.db_name)
            .with_container_name(unique_name("membership-postgres"))
            .start()
            .await
            .context("Failed to start Postgres container")?;
        let host_port = container
            .get_host_port_ipv4(POSTGRES_PORT.tcp())
            .await
            .context("Failed to resolve Postgres host port")?;

        let postgres = Self {
            _container: container,
            host_port,
            config,
        };
        postgres.wait_until_ready().await?;
        Ok(postgres)
    }

    #[must_use]
    pub fn admin_dsn(&self) -> String {
        self.dsn_for_db(&self.config.db_name)
    }

    #[must_use]
    pub fn dsn_for_db(&self, db_name: &str) -> String {
        format!(
            "postgres://{}:{}@127.0.0.1:{}/{}?sslmode=disable",
            self.config.user, self.config.password, self.host_port, db_name
        )
    }

    /// Create an empty database with a unique name and return its DSN.
    ///
    /// # Errors
    /// Returns an error if the admin connection or `CREATE DATABASE` fails.
    pub async fn fresh_database(&self) -> Result<String> {
        let db_name = unique_name("membership").replace('-', "_");
        let mut conn = PgConnection::connect(&self.admin_dsn())
            .await
            .context("Failed to connect as admin")?;
        conn.execute(format!(r#"CREATE DATABASE "{db_name}""#).as_str())
            .await
            .with_context(|| format!("Failed to create database {db_name}"))?;
        conn.close().await.ok();
        Ok(self.dsn_for_db(&db_name))
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let dsn = self.admin_dsn();
        let mut attempts = 0;

        loop {
            match PgConnection::connect(&dsn).await {
                Ok(connection) => {
                    connection.close().await.ok();
                    return Ok(());
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= READY_ATTEMPTS {
                        return Err(err).context("Postgres did not become ready");
                    }
                    sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }
}
