mod cli;

use ugoiraforge::{batch, cache, config, conversion, server, source};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

/// Wire the source client, encoding backend and result cache into a scheduler.
fn build_scheduler(config: &config::Config) -> Result<conversion::Scheduler> {
    let source = Arc::new(source::PixivClient::new(&config.pixiv));
    let backend = ugoiraforge_av::select_backend(&config.backend_options())
        .context("No usable encoding backend")?;
    let cache = cache::open_cache(&config.cache).context("Failed to open result cache")?;

    tracing::info!(
        backend = backend.name(),
        cache_capacity = cache.capacity(),
        "Conversion pipeline ready"
    );

    Ok(conversion::Scheduler::new(
        source,
        backend,
        cache,
        conversion::SchedulerSettings::from(config),
    ))
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over file and environment
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting ugoiraforge server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let scheduler = Arc::new(build_scheduler(&config)?);
    server::start_server(config, scheduler).await
}

async fn convert_ids(raw: &[String], output_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    let Some(ids) = batch::parse_ids(raw) else {
        eprintln!("Invalid arguments: {}", raw.join(" "));
        return Ok(());
    };

    // Batch runs always exit 0; setup failures are reported like item failures
    let scheduler = match config::load_config_or_default(config_path)
        .and_then(|config| build_scheduler(&config))
    {
        Ok(scheduler) => scheduler,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            return Ok(());
        }
    };

    let items = match batch::run_batch(&scheduler, &ids, output_dir).await {
        Ok(items) => items,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            return Ok(());
        }
    };

    for item in items {
        match item {
            batch::BatchItem::Written { id, path } => println!("✓ {} -> {}", id, path.display()),
            batch::BatchItem::Failed { id, reason } => eprintln!("✗ {}: {}", id, reason),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ugoiraforge=trace,ugoiraforge_av=trace,ugoiraforge_common=debug,tower_http=debug"
                .to_string()
        } else {
            "ugoiraforge=debug,ugoiraforge_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert { ids, output_dir } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_ids(&ids, &output_dir, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ugoiraforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tool = ugoiraforge_av::check_ffmpeg(config.tools.ffmpeg_path.as_deref());

    let status = if tool.available { "✓" } else { "✗" };
    print!("{} {}", status, tool.name);
    if let Some(ref version) = tool.version {
        print!(" ({})", version);
    }
    if let Some(ref path) = tool.path {
        print!(" - {}", path.display());
    }
    println!();

    println!(
        "{} embedded encoder (libav feature)",
        if cfg!(feature = "libav") { "✓" } else { "✗" }
    );

    println!();
    if tool.available {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or build with the libav feature.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            config::validate_config(&config)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Encoder backend: {:?}", config.encoder.backend);
            println!("  Video codec: {}", config.encoder.video_codec);
            println!(
                "  Scheduler: limit {}, {} retries, {} ms backoff",
                config.scheduler.concurrency_limit,
                config.scheduler.max_retries,
                config.scheduler.retry_backoff_ms
            );
            println!(
                "  Cache: {:?}, capacity {}",
                config.cache.mode, config.cache.capacity
            );
            println!("  Cookie set: {}", !config.pixiv.cookie.is_empty());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
