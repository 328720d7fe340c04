use anyhow::Context;
use ragbench::{
    build_router,
    cli::{
        commands::{self, IngestArgs},
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    utils::toml_config::{LogFormat, RagBenchConfig},
    AppState, RagService,
};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    if let Commands::Init {
        path,
        force,
        host,
        port,
        backend,
    } = command
    {
        return match init::run(
            InitConfig {
                path,
                force,
                host,
                port,
                backend,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let config = RagBenchConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let is_server = matches!(command, Commands::Serve { .. });
    init_tracing(&config, cli.verbose, is_server);

    match command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        command => {
            let service = RagService::open(Arc::new(config)).await?;
            let result = match command {
                Commands::Ingest {
                    file,
                    text,
                    url,
                    source_type,
                    id,
                    metadata,
                    chunk_size,
                    chunk_overlap,
                    normalize,
                } => {
                    let args = IngestArgs {
                        file,
                        text,
                        url,
                        source_type,
                        id,
                        metadata,
                        chunk_size,
                        chunk_overlap,
                        normalize,
                    };
                    commands::ingest(&service, args, &output).await
                }
                Commands::Query {
                    text,
                    top_k,
                    threshold,
                } => commands::query(&service, text, top_k, threshold, &output).await,
                Commands::Status => commands::status(&service, &output).await,
                Commands::Rebuild => commands::rebuild(&service, &output).await,
                Commands::Serve { .. } | Commands::Init { .. } => Ok(()),
            };
            if let Err(e) = result {
                output.error(&e.to_string());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Server logs go to the configured level; one-shot commands stay quiet
/// unless `--verbose` is given. `RUST_LOG` overrides both.
fn init_tracing(config: &RagBenchConfig, verbose: bool, is_server: bool) {
    let level = if verbose {
        "debug"
    } else if is_server {
        config.server.log_level.as_str()
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = config.server.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn serve(
    config: RagBenchConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = config;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let rag = Arc::new(RagService::open(Arc::new(config)).await?);
    let app = build_router(AppState::new(rag.clone()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(address = %addr, "ragbench server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    rag.shutdown().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, finishing in-flight requests");
}
