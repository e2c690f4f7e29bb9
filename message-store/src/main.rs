use lambda_runtime::{run, service_fn, tracing, Error};
use std::sync::Arc;
use tokio::sync::Mutex;

mod config;
mod event_handler;

use config::DbConfig;
use event_handler::{connect, function_handler};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = DbConfig::from_env()?;

    // Connect outside of the handler so the session is re-used by every
    // invocation routed to this execution environment. A failure here is
    // fatal: the environment never serves an invocation.
    let connection = match connect(&config).await {
        Ok(conn) => Arc::new(Mutex::new(conn)),
        Err(err) => {
            tracing::error!(error = %err, "could not connect to MySQL instance");
            return Err(err.into());
        }
    };

    run(service_fn(move |event| {
        let connection = Arc::clone(&connection);
        async move { function_handler(connection, event).await }
    }))
    .await
}
