use lambda_runtime::Error;
use mysql_async::OptsBuilder;

/// RDS settings, read once at cold start.
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub db_name: String,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            user: required("USER_NAME")?,
            password: required("PASSWORD")?,
            host: required("RDS_HOST")?,
            db_name: required("DB_NAME")?,
        })
    }

    pub fn opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .db_name(Some(self.db_name.clone()))
    }
}

fn required(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::from(format!("{name} is not set")))
}
