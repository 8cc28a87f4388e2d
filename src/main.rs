use clap::{Parser, Subcommand};
use imghost::config::{self, Config};
use imghost::imaging::RustBackend;
use imghost::pipeline::Pipeline;
use imghost::{logging, server};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imghost")]
#[command(about = "Self-hosted image upload service")]
#[command(long_about = "\
Self-hosted image upload service

Accepts multipart image uploads from allowlisted callers holding the shared
secret, normalises every image to one configured size and format, stores it
under a random name and answers with its public URL.

Upload form fields:

  key     shared secret (must match secretKey)
  image   the image file (PNG, JPEG, GIF or WebP)

  curl -F key=... -F image=@photo.jpg http://localhost:39716/upload

Stored files are served back under /img/{file}.

If the config file does not exist it is created with stock values on first
run. Run 'imghost gen-config' to print them.")]
#[command(version)]
struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upload server (default)
    Serve,
    /// Validate the config file without starting the server
    Check,
    /// Print a stock config.json
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = load(&cli.config)?;
            run_server(config)?;
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(&cli.config)?;
            if config.uses_placeholder_secret() {
                println!("warning: secretKey is still the placeholder value");
            }
            println!(
                "==> Config is valid: port {}, {}x{} crop {}x{} as {}",
                config.port,
                config.resize_width,
                config.resize_height,
                config.crop_width,
                config.crop_height,
                config.image_format,
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_json());
        }
    }

    Ok(())
}

/// Load (or bootstrap) the config and bring up logging.
fn load(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let (config, created) = config::load_or_create(path)?;
    let rotated = logging::init(&config.log_file_path)?;

    if created {
        tracing::info!(path = %path.display(), "Wrote stock config");
    }
    if let Some(old) = rotated {
        tracing::info!(path = %old.display(), "Rotated previous log");
    }
    if config.uses_placeholder_secret() {
        tracing::warn!("secretKey is still the placeholder value; change it before exposing the server");
    }
    Ok(config)
}

fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.image_directory)?;
    tracing::info!(
        directory = %config.image_directory.display(),
        url = %config.image_url,
        route = %config.upload_route,
        format = %config.image_format,
        thumbnails = config.generate_thumbnails,
        check_ip = config.check_ip,
        "Starting imghost"
    );

    let pipeline = Arc::new(Pipeline::new(Arc::new(config), RustBackend::new()));
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(pipeline))?;
    Ok(())
}
