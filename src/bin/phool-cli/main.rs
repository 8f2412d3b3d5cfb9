//! Phool CLI
//!
//! Drives the identification flow from a terminal: pick a photo file (or
//! use the synthetic camera), send it to the identification service, and
//! print the result plus the running history.
//!
//! ## Usage
//!
//! ```bash
//! # Identify a photo
//! PHOOL_BACKEND_URL=http://localhost:8001 phool-cli --file rose.jpg
//!
//! # No photo at hand? Use the synthetic camera
//! phool-cli --fake-camera
//! ```

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use phool::media::fake::FakeMedia;
use phool::{App, CameraState, FileStore};

/// CLI configuration from environment/args
struct Config {
    /// Identification service base URL
    backend_url: String,
    /// Directory holding persisted history and session state
    state_dir: PathBuf,
    /// Photo to upload instead of using the camera
    file: Option<PathBuf>,
    /// Capture from the synthetic camera backend
    fake_camera: bool,
}

impl Config {
    fn from_env() -> Result<Self> {
        let backend_url = std::env::var("PHOOL_BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:8001".to_string());

        let state_dir = std::env::var("PHOOL_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".phool-state"));

        let args: Vec<String> = std::env::args().collect();
        let fake_camera = args.iter().any(|arg| arg == "--fake-camera");
        let file = args
            .iter()
            .position(|arg| arg == "--file")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from);

        if file.is_none() && !fake_camera {
            bail!("nothing to identify: pass --file <path> or --fake-camera");
        }

        Ok(Self {
            backend_url,
            state_dir,
            file,
            fake_camera,
        })
    }
}

/// Guess the MIME type from a file extension; the service only accepts
/// images, so unknown extensions default to JPEG.
fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phool=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env()?;

    info!("Phool CLI starting");
    info!("  Backend: {}", config.backend_url);
    info!("  State dir: {:?}", config.state_dir);

    let store = Arc::new(FileStore::new(&config.state_dir)?);
    let media = Arc::new(FakeMedia::new());
    let app = App::new(media, store, &config.backend_url);
    app.init().await;

    if !app.identify_client().health().await {
        info!("Identification service is not reachable; the request may fail");
    }

    if let Some(path) = &config.file {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {path:?}"))?;
        app.choose_file(bytes, mime_for(path)).await?;
        info!("Selected {:?}", path);
    } else if config.fake_camera {
        match app.start_camera().await {
            CameraState::Streaming => {
                app.capture_photo().await?;
                info!("Captured a frame from the synthetic camera");
            }
            CameraState::Error(err) => {
                bail!("camera failed: {}", err.remediation());
            }
            other => bail!("unexpected camera state: {other:?}"),
        }
    }

    match app.identify().await {
        Ok(Some(result)) => {
            println!("{} ({})", result.flower_name, result.scientific_name);
            println!("  Family:     {}", result.family);
            println!("  Confidence: {}", result.confidence);
            println!("  Facts:      {}", result.basic_facts);
            println!("  Season:     {}", result.seasonal_info);
            println!("  Care:       {}", result.care_instructions);
            println!("  Growing:    {}", result.cultivation_tips);
            println!("  Symbolism:  {}", result.symbolic_meanings);
            println!("  Story:      {}", result.interesting_story);
        }
        Ok(None) => println!("Nothing identified."),
        Err(_) => {
            let message = app
                .last_error()
                .await
                .unwrap_or_else(|| "Identification failed.".to_string());
            bail!("{message}");
        }
    }

    let history = app.history().entries().await;
    println!(
        "\nHistory: {} identification{}",
        history.len(),
        if history.len() == 1 { "" } else { "s" }
    );
    for entry in history.iter().take(5) {
        println!("  {} — {} ({})", entry.timestamp, entry.flower_name, entry.confidence);
    }

    Ok(())
}
