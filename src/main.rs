use std::io::Read;

use verdict::config::Config;
use verdict::dispatch::http::HttpTransport;
use verdict::pipeline::{ReviewPipeline, ReviewUnit};

/// Read a diff (or `--- FILE: path ---` framed content) on stdin, print the
/// canonical review as JSON on stdout.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    tracing::info!("verdict starting");

    // Configuration problems are the only fatal error class.
    let config = Config::load()?;
    let transport = HttpTransport::from_config(&config)?;
    let pipeline = ReviewPipeline::new(transport, config);

    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    let unit = ReviewUnit::new(content, "stdin", "standard input");

    let review = pipeline.review_unit(&unit).await;
    println!("{}", serde_json::to_string_pretty(&review)?);

    Ok(())
}
