//! `bizdesk-probe`: issue one GET for a persisted session and print the envelope.
//!
//! Usage: `bizdesk-probe <session.json> <path> [application module action]`

use anyhow::{Context, bail};

use bizdesk_auth::{AccessCheck, explain, normalize};
use bizdesk_core::Session;
use bizdesk_http::{ClientConfig, RequestDescriptor, RequestPipeline};

const USAGE: &str = "usage: bizdesk-probe <session.json> <path> [application module action]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bizdesk_observability::init();

    let mut args = std::env::args().skip(1);
    let session_path = args.next().context(USAGE)?;
    let path = args.next().context(USAGE)?;
    let check: Vec<String> = args.collect();

    let raw = std::fs::read_to_string(&session_path)
        .with_context(|| format!("failed to read session file {session_path}"))?;
    let session: Session = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse session file {session_path}"))?;

    match check.as_slice() {
        [] => {}
        [application, module, action] => {
            let index = normalize(&session.access_grants);
            let explanation = explain(&index, AccessCheck::new(application, module, action));
            println!("{}", serde_json::to_string_pretty(&explanation)?);
            if !explanation.granted {
                return Ok(());
            }
        }
        _ => bail!(USAGE),
    }

    if !session.is_ready() {
        tracing::warn!("session is not fully hydrated; the request will likely fail");
    }

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let pipeline = RequestPipeline::from_config(&config)?;

    let envelope = pipeline.execute(&RequestDescriptor::get(path), &session).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(())
}
