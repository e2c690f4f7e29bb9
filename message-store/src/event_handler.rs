use lambda_runtime::{tracing, Error, LambdaEvent};
use mysql_async::prelude::*;
use mysql_async::{Conn, TxOpts};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// Example user id; the SNS envelope carries no user identity.
const USER_ID: i32 = 1;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS Messages ( \
     RecordId INT NOT NULL AUTO_INCREMENT, \
     UserId INT, \
     MessageId VARCHAR(255), \
     PRIMARY KEY(RecordId))";

const INSERT_MESSAGE: &str = "INSERT INTO Messages (UserId, MessageId) VALUES (?, ?)";

const SELECT_MESSAGES: &str = "SELECT RecordId, UserId, MessageId FROM Messages";

/// The shape SNS delivers to a subscribed function.
#[derive(Deserialize)]
pub struct Request {
    #[serde(rename = "Records")]
    records: Vec<SnsRecord>,
}

#[derive(Deserialize)]
struct SnsRecord {
    #[serde(rename = "Sns")]
    sns: SnsNotification,
}

#[derive(Deserialize)]
struct SnsNotification {
    #[serde(rename = "MessageId")]
    message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("payload is missing {0}")]
    PayloadShape(&'static str),
    #[error("could not connect to MySQL instance")]
    Connection(#[source] mysql_async::Error),
    #[error("connection attempt timed out after {CONNECT_TIMEOUT:?}")]
    ConnectTimeout,
    #[error("failed to write message row")]
    Write(#[source] mysql_async::Error),
    #[error("failed to read back message rows")]
    Read(#[source] mysql_async::Error),
}

/// Opens the single connection this execution environment will reuse for its
/// whole lifetime. There is no reconnect path: if the session later breaks,
/// the environment stays degraded until the host recycles it.
pub(crate) async fn connect(config: &crate::config::DbConfig) -> Result<Conn, HandlerError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, Conn::new(config.opts())).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(err)) => Err(HandlerError::Connection(err)),
        Err(_) => Err(HandlerError::ConnectTimeout),
    }
}

fn first_message_id(event: &Request) -> Result<&str, HandlerError> {
    event
        .records
        .first()
        .map(|record| record.sns.message_id.as_str())
        .ok_or(HandlerError::PayloadShape("Records[0]"))
}

fn report(item_count: usize) -> String {
    format!("Added {item_count} items to RDS MySQL table")
}

pub(crate) async fn function_handler(
    connection: Arc<Mutex<Conn>>,
    event: LambdaEvent<Request>,
) -> Result<String, Error> {
    let message_id = first_message_id(&event.payload)?.to_owned();

    let mut conn = connection.lock().await;

    conn.query_drop(CREATE_TABLE)
        .await
        .map_err(HandlerError::Write)?;

    // Parameterized on purpose: MessageId is free-form text from the event.
    let mut tx = conn
        .start_transaction(TxOpts::default())
        .await
        .map_err(HandlerError::Write)?;
    tx.exec_drop(INSERT_MESSAGE, (USER_ID, message_id.as_str()))
        .await
        .map_err(HandlerError::Write)?;
    tx.commit().await.map_err(HandlerError::Write)?;

    // Full-table read back: the reported count is the table total, not the
    // number of rows this invocation added.
    let rows: Vec<(i32, i32, String)> = conn
        .query(SELECT_MESSAGES)
        .await
        .map_err(HandlerError::Read)?;

    tracing::info!("The following items have been added to the database:");
    for (record_id, user_id, message_id) in &rows {
        tracing::info!(record_id, user_id, %message_id, "row");
    }

    Ok(report(rows.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_id_from_sns_envelope() {
        let event: Request =
            serde_json::from_str(r#"{"Records":[{"Sns":{"MessageId":"abc-123"}}]}"#).unwrap();
        assert_eq!(first_message_id(&event).unwrap(), "abc-123");
    }

    #[test]
    fn first_record_wins_when_several_are_delivered() {
        let event: Request = serde_json::from_str(
            r#"{"Records":[{"Sns":{"MessageId":"first"}},{"Sns":{"MessageId":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_message_id(&event).unwrap(), "first");
    }

    #[test]
    fn event_without_records_is_rejected_at_deserialization() {
        assert!(serde_json::from_str::<Request>(r#"{"Detail":{}}"#).is_err());
    }

    #[test]
    fn empty_records_list_is_a_payload_shape_error() {
        let event: Request = serde_json::from_str(r#"{"Records":[]}"#).unwrap();
        let err = first_message_id(&event).unwrap_err();
        assert!(matches!(err, HandlerError::PayloadShape("Records[0]")));
    }

    #[test]
    fn report_counts_the_whole_table() {
        assert_eq!(report(1), "Added 1 items to RDS MySQL table");
        assert_eq!(report(42), "Added 42 items to RDS MySQL table");
    }
}
