use aws_config::{BehaviorVersion, Region};
use aws_sdk_sagemaker::Client;
use lambda_runtime::{run, service_fn, tracing, Error};

mod config;
mod event_handler;

use config::DeployConfig;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = DeployConfig::from_env()?;

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;
    let client = Client::new(&sdk_config);

    run(service_fn(move |event| {
        let client = client.clone();
        let config = config.clone();
        async move { function_handler(&client, &config, event).await }
    }))
    .await
}
