use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::Parser;
use costkube::{new_client, DEFAULT_COST_PROXY_PATH};
use reqwest::blocking::Response;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod model;

use model::{AllocationSetRange, CostQuery, Summary};

const DEFAULT_FILTER: &str =
    r#"namespace:"kube-system"+controllerKind:"ReplicaSet"+label[app]:"ack-cost-exporter""#;

/// Query the in-cluster cost API through the API server's service proxy.
#[derive(Parser)]
struct Args {
    /// Kubeconfig to authenticate with; defaults to $KUBECONFIG, then ~/.kube/config
    kubeconfig: Option<PathBuf>,
    /// Path appended to the API server URL to reach the cost service
    #[arg(long, default_value = DEFAULT_COST_PROXY_PATH)]
    proxy_path: String,
    #[arg(long, default_value = "1h")]
    window: String,
    #[arg(long, default_value = DEFAULT_FILTER)]
    filter: String,
    #[arg(long)]
    step: Option<String>,
    #[arg(long)]
    aggregate: Option<String>,
    #[arg(long)]
    idle: Option<bool>,
    #[arg(long)]
    share_idle: Option<bool>,
    #[arg(long)]
    share_split: Option<String>,
    #[arg(long)]
    idle_by_node: Option<bool>,
    #[arg(long)]
    format: Option<String>,
}

impl Args {
    fn query(&self) -> CostQuery {
        CostQuery {
            window: self.window.clone(),
            filter: Some(self.filter.clone()).filter(|f| !f.is_empty()),
            step: self.step.clone(),
            aggregate: self.aggregate.clone(),
            idle: self.idle,
            share_idle: self.share_idle,
            share_split: self.share_split.clone(),
            idle_by_node: self.idle_by_node,
            format: self.format.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("configuration error: {0}")]
    Config(#[from] costkube::Error),
    #[error("API error: HTTP {status}\n{body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Failure::Config(_) => 1,
            Failure::Api { .. } => 2,
            Failure::Other(_) => 3,
        }
    }
}

/// Non-success replies become [`Failure::Api`] carrying the body as sent.
fn check_status(response: Response) -> Result<Response, Failure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().context("reading error body")?;
    Err(Failure::Api { status, body })
}

fn run(args: &Args) -> Result<(), Failure> {
    let client = new_client(args.kubeconfig.as_deref(), Some(&args.proxy_path))?;
    println!("Server URL: {}", client.base_url());

    let query = args.query();
    info!(window = %query.window, "querying cost data");
    let response = client
        .get("/cost")
        .query(&query.params())
        .send()
        .context("sending cost request")?;

    let response = check_status(response)?;
    let range: AllocationSetRange = response.json().context("decoding cost response")?;
    if let Some(message) = &range.message {
        info!(code = range.code, %message, "cost API replied");
    }
    print!("{}", Summary(&range));
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("{failure}");
            ExitCode::from(failure.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    use super::*;

    /// Answers a single request on a local port with `reply` and hangs up.
    fn serve_once(reply: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{addr}/cost")
    }

    fn fetch(reply: &'static str) -> Response {
        reqwest::blocking::Client::new()
            .get(serve_once(reply))
            .send()
            .unwrap()
    }

    #[test]
    fn error_status_keeps_the_body_verbatim() {
        let response = fetch(
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 14\r\nConnection: close\r\n\r\naccess  denied",
        );
        match check_status(response) {
            Err(Failure::Api { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert_eq!(body, "access  denied");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn truncated_error_body_is_not_reported_as_empty() {
        let response = fetch(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial",
        );
        let failure = check_status(response).unwrap_err();
        assert!(matches!(failure, Failure::Other(_)));
        assert_eq!(failure.exit_code(), 3);
        assert!(failure.to_string().contains("reading error body"));
    }

    #[test]
    fn success_passes_through() {
        let response =
            fetch("HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}");
        assert!(check_status(response).is_ok());
    }

    #[test]
    fn failures_map_to_distinct_exit_codes() {
        let config = Failure::from(costkube::Error::ContextMissing { name: "x".into() });
        let api = Failure::Api {
            status: reqwest::StatusCode::FORBIDDEN,
            body: "denied".into(),
        };
        let other = Failure::from(anyhow::anyhow!("boom"));

        assert_eq!(config.exit_code(), 1);
        assert_eq!(api.exit_code(), 2);
        assert_eq!(other.exit_code(), 3);
        assert_eq!(api.to_string(), "API error: HTTP 403 Forbidden\ndenied");
    }

    #[test]
    fn defaults_match_the_metrics_adapter_deployment() {
        let args = Args::parse_from(["cost-query"]);
        assert_eq!(args.proxy_path, DEFAULT_COST_PROXY_PATH);
        let query = args.query();
        assert_eq!(query.window, "1h");
        assert_eq!(query.filter.as_deref(), Some(DEFAULT_FILTER));
        assert!(query.step.is_none());
    }

    #[test]
    fn empty_filter_is_dropped() {
        let args = Args::parse_from(["cost-query", "--filter", "", "--idle", "true"]);
        let query = args.query();
        assert!(query.filter.is_none());
        assert_eq!(query.idle, Some(true));
    }
}
