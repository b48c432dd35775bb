use std::time::{Duration, Instant};

use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};

use crate::{config::Config, errors::AppResult};

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the database shared with the rest of the platform. Users live in
/// a collection owned by another service; this crate only reads and inserts.
#[derive(Clone)]
pub struct Database {
    client: Client,
    db_name: String,
}

impl Database {
    /// Connects and pings once so that a bad URI fails startup instead of
    /// the first login.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let mut options = ClientOptions::parse(&config.mongo_conn_string).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);

        let database = Self {
            client: Client::with_options(options)?,
            db_name: config.mongo_db_name.clone(),
        };

        let latency = database.ping().await?;
        log::info!(
            "Connected to MongoDB database '{}' ({} ms)",
            database.db_name,
            latency.as_millis()
        );

        Ok(database)
    }

    pub fn get_collection<T>(&self, collection_name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client
            .database(&self.db_name)
            .collection(collection_name)
    }

    /// Readiness probe.
    pub async fn health_check(&self) -> AppResult<()> {
        let latency = self.ping().await?;
        log::debug!("MongoDB ping took {} ms", latency.as_millis());
        Ok(())
    }

    async fn ping(&self) -> AppResult<Duration> {
        let started = Instant::now();
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(started.elapsed())
    }
}
