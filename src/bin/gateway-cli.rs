use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Send commands to a running worker gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session cookie as `name=value`.
    #[arg(short, long)]
    cookie: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Worker service name.
    service: String,

    /// Function to call.
    function: String,

    /// Positional parameters, each parsed as JSON (bare words become strings).
    params: Vec<String>,

    /// Timeout in seconds.
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,
}

impl Target {
    fn call(&self) -> Value {
        let mut call = vec![json!(self.function)];
        call.extend(self.params.iter().map(|p| parse_param(p)));
        Value::Array(call)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Unary call; prints the response envelope
    Call(Target),
    /// Admin call; prints the response envelope
    Admin(Target),
    /// Streaming call; copies the body to stdout
    Stream(Target),
    /// Download call; writes the body to a file or stdout
    Download {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        filename: Option<String>,

        #[arg(long)]
        content_type: Option<String>,

        /// Output file; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| json!(raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}/api/pcp", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    if let Some(cookie) = &cli.cookie {
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
    }

    let (document, out) = match &cli.command {
        Commands::Call(t) => (json!([t.service, t.call(), t.timeout]), None),
        Commands::Admin(t) => (json!(["proxyAdmin", t.service, t.call(), t.timeout]), None),
        Commands::Stream(t) => (json!(["proxyStream", t.service, t.call(), t.timeout]), None),
        Commands::Download {
            target: t,
            filename,
            content_type,
            out,
        } => (
            json!([
                "download",
                t.service,
                t.call(),
                {"filename": filename, "contentType": content_type},
                t.timeout
            ]),
            out.clone(),
        ),
    };

    let mut res = client
        .post(&endpoint)
        .headers(headers)
        .json(&document)
        .send()
        .await?;

    if !res.status().is_success() {
        eprintln!("Error: gateway returned status {}", res.status());
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    match cli.command {
        Commands::Call(_) | Commands::Admin(_) => {
            let envelope: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Stream(_) | Commands::Download { .. } => {
            let mut sink: Box<dyn Write> = match out {
                Some(path) => Box::new(std::fs::File::create(path)?),
                None => Box::new(std::io::stdout()),
            };
            while let Some(chunk) = res.chunk().await? {
                sink.write_all(&chunk)?;
                sink.flush()?;
            }
        }
    }

    Ok(())
}
