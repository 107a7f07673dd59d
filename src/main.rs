use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kaguya_server::catalog::{MusicCatalog, MusicRecommender, PlaylistApi, SpotifyClient};
use kaguya_server::config::{self, AppConfig, DEFAULT_MARKET, DEFAULT_REDIRECT_URI};
use kaguya_server::playlist::{PlaylistManager, SpotifyOAuth, TokenSource};
use kaguya_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use kaguya_server::vision::VisionModels;

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = config::DEFAULT_PORT)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// ONNX model classifying 48x48 grayscale faces into moods.
    #[clap(long = "mood-model", default_value = "MoodDetector.onnx")]
    pub mood_model_path: PathBuf,

    /// ONNX face detection model.
    #[clap(long = "face-model", default_value = "face_detector.onnx")]
    pub face_model_path: PathBuf,

    /// Prefix of the playlists created on the Spotify account.
    #[clap(long, default_value = config::DEFAULT_BRAND)]
    pub brand: String,

    /// Maximum accepted request body size for image payloads, in bytes.
    #[clap(long, default_value_t = config::DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,

    #[clap(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub spotify_client_id: Option<String>,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Must match one of the redirect URIs registered for the Spotify app.
    #[clap(long, env = "SPOTIFY_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    pub spotify_redirect_uri: String,

    #[clap(long, env = "SPOTIFY_MARKET", default_value = DEFAULT_MARKET)]
    pub spotify_market: String,

    /// File where the Spotify user token is persisted.
    #[clap(long = "token-cache", default_value = config::DEFAULT_TOKEN_CACHE)]
    pub token_cache_path: PathBuf,

    /// Timeout in seconds for Spotify requests.
    #[clap(long, default_value_t = config::DEFAULT_SPOTIFY_TIMEOUT_SEC)]
    pub spotify_timeout_sec: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            mood_model_path: args.mood_model_path.clone(),
            face_model_path: args.face_model_path.clone(),
            brand: args.brand.clone(),
            max_image_bytes: args.max_image_bytes,
            spotify_client_id: args.spotify_client_id.clone(),
            spotify_client_secret: args.spotify_client_secret.clone(),
            spotify_redirect_uri: args.spotify_redirect_uri.clone(),
            spotify_market: args.spotify_market.clone(),
            token_cache_path: args.token_cache_path.clone(),
            spotify_timeout_sec: args.spotify_timeout_sec,
        }
    }
}

#[cfg(feature = "onnx")]
fn load_models(face_model_path: &Path, mood_model_path: &Path) -> VisionModels {
    use kaguya_server::vision::onnx::{OnnxFaceDetector, OnnxMoodModel};
    use kaguya_server::vision::{FaceDetector, MoodModel};

    let face_detector = match OnnxFaceDetector::load(face_model_path) {
        Ok(detector) => {
            info!("Face detector loaded from {:?}", face_model_path);
            Some(Arc::new(detector) as Arc<dyn FaceDetector>)
        }
        Err(e) => {
            error!("Failed to load face detector - face detection will not work: {}", e);
            None
        }
    };
    let mood_model = match OnnxMoodModel::load(mood_model_path) {
        Ok(model) => {
            info!("Mood model loaded from {:?}", mood_model_path);
            Some(Arc::new(model) as Arc<dyn MoodModel>)
        }
        Err(e) => {
            error!("Failed to load mood model - mood detection will not work: {}", e);
            None
        }
    };
    VisionModels {
        face_detector,
        mood_model,
    }
}

#[cfg(not(feature = "onnx"))]
fn load_models(face_model_path: &Path, mood_model_path: &Path) -> VisionModels {
    warn!(
        "Built without the onnx feature, not loading {:?} and {:?} - mood detection will not work",
        face_model_path, mood_model_path
    );
    VisionModels::default()
}

/// One throwaway search so misconfigured credentials show up in the logs.
async fn check_spotify_connectivity(catalog: &dyn MusicCatalog) {
    match catalog.search_tracks("test", 1).await {
        Ok(_) => info!("Spotify client initialized successfully"),
        Err(e) => error!("Spotify connectivity check failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine, variables may come from the environment.
    let _ = dotenvy::dotenv();

    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Loading mood detection models...");
    let models = load_models(&app_config.face_model_path, &app_config.mood_model_path);

    let spotify = Arc::new(
        SpotifyClient::new(app_config.spotify.client_config())
            .context("Failed to build Spotify client")?,
    );
    let recommender = if spotify.has_credentials() {
        check_spotify_connectivity(spotify.as_ref()).await;
        Some(Arc::new(MusicRecommender::new(
            spotify.clone() as Arc<dyn MusicCatalog>
        )))
    } else {
        error!("Spotify credentials not found - music recommendations will not work");
        None
    };

    let oauth = match app_config.spotify.oauth_settings() {
        Some(settings) => Some(Arc::new(
            SpotifyOAuth::new(settings).context("Failed to set up Spotify OAuth")?,
        )),
        None => None,
    };

    let playlist_manager = Arc::new(PlaylistManager::new(
        app_config.brand.clone(),
        oauth.clone().map(|o| o as Arc<dyn TokenSource>),
        spotify as Arc<dyn PlaylistApi>,
        app_config.playlist.fallback_search_url,
    ));
    if playlist_manager.authenticated_user().await.is_some() {
        info!("Spotify user session found - playlists will be created");
    } else if oauth.is_some() {
        info!("No Spotify user session - visit /spotify-auth-url to enable playlist creation");
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        max_image_bytes: app_config.max_image_bytes,
        spotify_credentials: app_config.spotify.has_credentials(),
    };

    info!("Startup complete!");
    tokio::select! {
        result = run_server(
            server_config,
            app_config.metrics_port,
            models,
            recommender,
            playlist_manager,
            oauth,
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            Ok(())
        }
    }
}
