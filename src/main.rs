// Main entry point for the ID-photo generation workflow

use idphoto_workflow::{
    core::Config,
    services::{ApiClient, ProcessingBackend},
    session::{ChatSession, SimulatedResponder},
};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "idphoto_workflow={}",
        match config.log_level {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== ID PHOTO GENERATOR ===");
    info!(
        "Config: base_url={} detect={}ms segment={}ms generate={}ms",
        config.api.base_url,
        config.api.face_detection_timeout.as_millis(),
        config.api.segmentation_timeout.as_millis(),
        config.api.generation_timeout.as_millis(),
    );

    let mut args = std::env::args().skip(1);
    let (image_path, instruction) = match (args.next(), args.next()) {
        (Some(path), Some(instruction)) => (path, instruction),
        _ => bail!("usage: idphoto-workflow <image> <instruction>"),
    };

    let client = Arc::new(ApiClient::new(config.clone())?);
    if !client.health_check().await {
        warn!("processing backend health check failed, continuing anyway");
    }

    let session = ChatSession::new(
        config.clone(),
        client,
        Arc::new(SimulatedResponder::new(&config)),
    );

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("Failed to read image {}", image_path))?;
    let filename = std::path::Path::new(&image_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.png");
    session.upload(filename, bytes)?;

    let reply = session.send(&instruction).await?;
    info!("assistant: {}", reply);

    let state = session.state().snapshot();
    let Some(run) = state.result else {
        // The instruction carried no generation intent; nothing to write out.
        return Ok(());
    };

    // The final image is a data URL; strip the header and decode the payload
    let payload = run
        .final_image
        .split_once(";base64,")
        .map(|(_, b64)| b64)
        .unwrap_or(&run.final_image);
    let decoded = general_purpose::STANDARD
        .decode(payload)
        .context("Failed to decode generated image")?;

    let output = format!("idphoto.{}", run.generation.format);
    std::fs::write(&output, &decoded)
        .with_context(|| format!("Failed to write {}", output))?;

    info!(
        "Generated {}x{} photo ({} bytes) -> {}",
        run.generation.size.width,
        run.generation.size.height,
        decoded.len(),
        output
    );

    Ok(())
}
