use lambda_runtime::Error;

/// SageMaker settings, read once at cold start.
#[derive(Clone)]
pub struct DeployConfig {
    pub region: String,
    pub execution_role_arn: String,
    pub model_package_group_name: String,
    /// Fallback for events that carry no version of their own.
    pub default_model_version: Option<i32>,
}

impl DeployConfig {
    pub fn from_env() -> Result<Self, Error> {
        let default_model_version = match std::env::var("MODEL_VERSION") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| Error::from(format!("MODEL_VERSION is not an integer: {raw}")))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            region: required("REGION")?,
            execution_role_arn: required("SM_EXECUTION_ROLE")?,
            model_package_group_name: required("MODEL_PACKAGE_GROUP_NAME")?,
            default_model_version,
        })
    }
}

fn required(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::from(format!("{name} is not set")))
}
