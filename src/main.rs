use clap::Parser;
use loan_ledger::cli::{self, Cli, Commands};
use loan_ledger::config::{Config, LogFormat};
use loan_ledger::{create_app, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let command = cli.command.unwrap_or(Commands::Serve);
    if let Commands::Config = command {
        return cli::handle_config_validate(&config).await;
    }

    let state = AppState::from_config(&config);
    state
        .access
        .bootstrap(&config.bootstrap_admin_password)
        .await?;

    match command {
        Commands::Serve => serve(&config, state).await,
        Commands::Register { username, password } => {
            cli::handle_register(&state, &username, &password).await
        }
        Commands::Loans(loan_cmd) => cli::handle_loans(&state, loan_cmd).await,
        Commands::Dashboard(credentials) => cli::handle_dashboard(&state, &credentials).await,
        Commands::Report(credentials) => cli::handle_report(&state, &credentials).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}
