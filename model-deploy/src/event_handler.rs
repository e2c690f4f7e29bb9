use aws_sdk_sagemaker::types::{
    ContainerDefinition, ModelPackageSummary, ProductionVariant, ProductionVariantServerlessConfig,
};
use aws_sdk_sagemaker::Client;
use chrono::{DateTime, Utc};
use lambda_runtime::{tracing, Error, LambdaEvent};
use serde::{Deserialize, Serialize};

use crate::config::DeployConfig;

const VARIANT_NAME: &str = "AllTraffic";
const MEMORY_SIZE_MB: i32 = 2048;
const MAX_CONCURRENCY: i32 = 20;
const PROVISIONED_CONCURRENCY: i32 = 10;

#[derive(Deserialize)]
pub struct Request {
    model_version: Option<i32>,
}

#[derive(Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    status_code: i32,
    body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("no model version in the event and MODEL_VERSION is not set")]
    MissingVersion,
    #[error("model version {0} does not exist")]
    VersionNotFound(i32),
}

fn find_package_arn(summaries: &[ModelPackageSummary], version: i32) -> Option<&str> {
    summaries
        .iter()
        .find(|package| package.model_package_version() == Some(version))
        .and_then(|package| package.model_package_arn())
}

fn model_name(version: i32) -> String {
    format!("backtest-model-{version}")
}

fn endpoint_name(version: i32) -> String {
    format!("backtest-endpoint-{version}")
}

fn endpoint_config_name(now: DateTime<Utc>) -> String {
    format!("EndpointConfig-Backtest-{}", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Promotes one registered model package version to a live serverless
/// endpoint. Each creation call is a discrete side effect on the SageMaker
/// control plane: a failure partway through leaves the earlier resources in
/// place, and readiness of the endpoint is not polled here.
pub(crate) async fn function_handler(
    client: &Client,
    config: &DeployConfig,
    event: LambdaEvent<Request>,
) -> Result<Response, Error> {
    let version = event
        .payload
        .model_version
        .or(config.default_model_version)
        .ok_or(DeployError::MissingVersion)?;

    let listed = client
        .list_model_packages()
        .model_package_group_name(&config.model_package_group_name)
        .send()
        .await?;
    let package_arn = find_package_arn(listed.model_package_summary_list(), version)
        .ok_or(DeployError::VersionNotFound(version))?
        .to_owned();

    let model_name = model_name(version);
    client
        .create_model()
        .model_name(&model_name)
        .execution_role_arn(&config.execution_role_arn)
        .containers(
            ContainerDefinition::builder()
                .model_package_name(&package_arn)
                .build(),
        )
        .send()
        .await?;
    tracing::info!(%model_name, %package_arn, "created model");

    let endpoint_config_name = endpoint_config_name(Utc::now());
    client
        .create_endpoint_config()
        .endpoint_config_name(&endpoint_config_name)
        .production_variants(
            ProductionVariant::builder()
                .model_name(&model_name)
                .variant_name(VARIANT_NAME)
                .serverless_config(
                    ProductionVariantServerlessConfig::builder()
                        .memory_size_in_mb(MEMORY_SIZE_MB)
                        .max_concurrency(MAX_CONCURRENCY)
                        .provisioned_concurrency(PROVISIONED_CONCURRENCY)
                        .build(),
                )
                .build(),
        )
        .send()
        .await?;
    tracing::info!(%endpoint_config_name, "created endpoint config");

    let endpoint_name = endpoint_name(version);
    client
        .create_endpoint()
        .endpoint_name(&endpoint_name)
        .endpoint_config_name(&endpoint_config_name)
        .send()
        .await?;
    tracing::info!(%endpoint_name, "created endpoint");

    Ok(Response {
        status_code: 200,
        body: serde_json::to_string(&format!("deploying {endpoint_name}"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sagemaker::primitives::DateTime as SmithyDateTime;
    use aws_sdk_sagemaker::types::ModelPackageStatus;
    use chrono::TimeZone;

    fn summary(version: i32, arn: &str) -> ModelPackageSummary {
        ModelPackageSummary::builder()
            .model_package_arn(arn)
            .model_package_version(version)
            .model_package_status(ModelPackageStatus::Completed)
            .creation_time(SmithyDateTime::from_secs(0))
            .build()
    }

    #[test]
    fn finds_the_matching_package_version() {
        let summaries = vec![
            summary(1, "arn:aws:sagemaker:us-east-1:123:model-package/backtest/1"),
            summary(2, "arn:aws:sagemaker:us-east-1:123:model-package/backtest/2"),
        ];
        assert_eq!(
            find_package_arn(&summaries, 2),
            Some("arn:aws:sagemaker:us-east-1:123:model-package/backtest/2")
        );
    }

    #[test]
    fn absent_version_yields_no_arn() {
        let summaries = vec![summary(1, "arn:aws:sagemaker:us-east-1:123:model-package/backtest/1")];
        assert_eq!(find_package_arn(&summaries, 7), None);
        assert_eq!(find_package_arn(&[], 1), None);
    }

    #[test]
    fn resource_names_embed_the_version() {
        assert_eq!(model_name(3), "backtest-model-3");
        assert_eq!(endpoint_name(3), "backtest-endpoint-3");
    }

    #[test]
    fn endpoint_config_name_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            endpoint_config_name(now),
            "EndpointConfig-Backtest-2024-01-02-03-04-05"
        );
    }

    #[test]
    fn response_uses_the_lambda_proxy_field_names() {
        let response = Response {
            status_code: 200,
            body: "\"ok\"".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "\"ok\"");
    }
}
