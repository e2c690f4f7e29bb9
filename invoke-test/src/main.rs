use aws_config::BehaviorVersion;
use aws_sdk_lambda::Client;
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Default)]
struct Stats {
    success_count: usize,
    error_count: usize,
    last_table_count: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(name = "invoke-test")]
#[command(about = "Invoke the message-store function with synthetic SNS events")]
struct Args {
    /// Lambda function name
    function: String,

    /// Number of iterations to run
    #[arg(long, default_value = "100")]
    iters: usize,

    /// Number of parallel threads
    #[arg(long, default_value = "1")]
    threads: usize,
}

fn random_message_id(rng: &mut StdRng) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:08x}",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u32>()
    )
}

fn sns_envelope(message_id: &str) -> serde_json::Value {
    serde_json::json!({
        "Records": [
            { "Sns": { "MessageId": message_id } }
        ]
    })
}

/// Extracts N from a JSON-encoded `"Added N items to RDS MySQL table"` reply.
fn parse_table_count(response_payload: &str) -> Option<usize> {
    let report: String = serde_json::from_str(response_payload).ok()?;
    report
        .strip_prefix("Added ")?
        .strip_suffix(" items to RDS MySQL table")?
        .parse()
        .ok()
}

async fn run_invocations(
    client: Arc<Client>,
    function_name: String,
    thread_id: usize,
    start: usize,
    end: usize,
    total: usize,
    stats: Arc<Mutex<Stats>>,
) {
    let mut rng = StdRng::from_entropy();

    for i in start..=end {
        let message_id = random_message_id(&mut rng);
        let payload = sns_envelope(&message_id);

        let result = client
            .invoke()
            .function_name(&function_name)
            .payload(aws_sdk_lambda::primitives::Blob::new(
                serde_json::to_vec(&payload).unwrap(),
            ))
            .send()
            .await;

        match result {
            Ok(response) => {
                let response_payload = response
                    .payload()
                    .map(|b| String::from_utf8_lossy(b.as_ref()).to_string())
                    .unwrap_or_else(|| "No response".to_string());

                let table_count = parse_table_count(&response_payload);
                let is_error = table_count.is_none();

                {
                    let mut stats = stats.lock().await;
                    if is_error {
                        stats.error_count += 1;
                    } else {
                        stats.success_count += 1;
                        stats.last_table_count = table_count;
                    }
                }

                println!(
                    "[Thread {}: {}/{}] Stored message {} => {}",
                    thread_id, i, total, message_id, response_payload
                );
            }
            Err(e) => {
                {
                    let mut stats = stats.lock().await;
                    stats.error_count += 1;
                }

                eprintln!(
                    "[Thread {}: {}/{}] Error storing message {}: {}",
                    thread_id, i, total, message_id, e
                );
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!(
        "Running {} invocations across {} thread(s)",
        args.iters, args.threads
    );

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Arc::new(Client::new(&config));

    let stats = Arc::new(Mutex::new(Stats::default()));

    let iters_per_thread = args.iters / args.threads;
    let remainder = args.iters % args.threads;

    let mut tasks = JoinSet::new();

    let total_iters = args.iters;

    let mut start = 1;
    for t in 1..=args.threads {
        let end = if t == args.threads {
            start + iters_per_thread - 1 + remainder
        } else {
            start + iters_per_thread - 1
        };

        let client = Arc::clone(&client);
        let function_name = args.function.clone();
        let stats = Arc::clone(&stats);

        tasks.spawn(async move {
            run_invocations(client, function_name, t, start, end, total_iters, stats).await;
        });

        start = end + 1;
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            eprintln!("Task failed: {}", e);
        }
    }

    let stats = stats.lock().await;
    println!("Completed {} invocations", args.iters);
    println!();
    println!("Results:");
    println!("  Success: {}", stats.success_count);
    println!("  Errors:  {}", stats.error_count);
    if let Some(count) = stats.last_table_count {
        println!("  Last observed table count: {}", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_table_count_out_of_a_report() {
        assert_eq!(
            parse_table_count("\"Added 3 items to RDS MySQL table\""),
            Some(3)
        );
    }

    #[test]
    fn error_payloads_do_not_parse_as_counts() {
        assert_eq!(
            parse_table_count(r#"{"errorType":"HandlerError","errorMessage":"x"}"#),
            None
        );
        assert_eq!(parse_table_count("\"something else\""), None);
    }

    #[test]
    fn envelope_matches_what_sns_delivers() {
        let envelope = sns_envelope("abc-123");
        assert_eq!(envelope["Records"][0]["Sns"]["MessageId"], "abc-123");
    }
}
