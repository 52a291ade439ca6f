use anyhow::Result;
use clap::Parser;
use smartcam::{
    AppBackends, CameraDevice, DirectoryPhotoLibrary, ModelKind, ModelLoader, SmartCameraApp,
    SmartCameraConfig,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "smartcam")]
#[command(about = "Camera with live image classification, photo capture and torch control")]
#[command(version)]
#[command(long_about = "A camera application core that previews a live camera feed, \
classifies streamed frames with a selectable model, captures and saves photos, and \
toggles the torch. Controlled from the terminal keyboard.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "smartcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - configure the camera but don't start it")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Model to start with
    #[arg(long, value_name = "MODEL", help = "Initial model: mobilenet, food or flowers")]
    model: Option<ModelKind>,

    /// Disable the terminal keyboard controls
    #[arg(long, help = "Run without reading keyboard input")]
    no_keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting SmartCam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match SmartCameraConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(model) = args.model {
        config.classifier.default_model = model;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let backends = AppBackends {
        camera: build_camera(&config),
        loader: build_model_loader(&config),
        library: Arc::new(DirectoryPhotoLibrary::new(&config.storage)),
    };

    let mut app = SmartCameraApp::new(config, backends);
    if !args.no_keyboard && !args.dry_run {
        app.enable_keyboard();
    }

    app.initialize().await.map_err(|e| {
        error!("Failed to initialize SmartCam: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    app.start().await.map_err(|e| {
        error!("Failed to start SmartCam: {}", e);
        e
    })?;

    let exit_code = app.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("SmartCam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

#[cfg(all(feature = "gstreamer", target_os = "linux"))]
fn build_camera(config: &SmartCameraConfig) -> Arc<dyn CameraDevice> {
    info!("Using GStreamer camera /dev/video{}", config.camera.index);
    Arc::new(smartcam::camera::GstCamera::new(config.camera.clone()))
}

#[cfg(not(all(feature = "gstreamer", target_os = "linux")))]
fn build_camera(config: &SmartCameraConfig) -> Arc<dyn CameraDevice> {
    info!("Built without GStreamer support, using the synthetic camera");
    Arc::new(smartcam::MockCamera::new(config.camera.clone()))
}

#[cfg(feature = "onnx")]
fn build_model_loader(config: &SmartCameraConfig) -> Arc<dyn ModelLoader> {
    info!("Loading ONNX models from {}", config.classifier.model_dir);
    Arc::new(smartcam::classifier::OnnxModelLoader::new(
        config.classifier.clone(),
    ))
}

#[cfg(not(feature = "onnx"))]
fn build_model_loader(_config: &SmartCameraConfig) -> Arc<dyn ModelLoader> {
    info!("Built without ONNX support, classification is unavailable");
    Arc::new(smartcam::classifier::UnavailableModelLoader)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("smartcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# SmartCam Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Environment overrides use SMARTCAM_<SECTION>__<KEY>, e.g. SMARTCAM_CAMERA__FPS=15");
    println!();
    println!("{}", toml::to_string_pretty(&SmartCameraConfig::default())?);
    Ok(())
}
