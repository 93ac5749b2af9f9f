use kiezpost_common::snowflake::{ProcessId, SnowflakePartOutOfRangeError, WorkerId};
use kiezpost_db::client::{DbClient, DbError};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Snowflake id part out of range: {0}")]
    SnowflakePart(#[from] SnowflakePartOutOfRangeError<u8>),
    #[error("Error setting up database: {0}")]
    Db(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default)]
    worker_id: u8,
    #[serde(default)]
    process_id: u8,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kiezpost_api=debug,kiezpost_common=debug,kiezpost_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let worker_id = WorkerId::try_from(env.worker_id)?;
    let process_id = ProcessId::try_from(env.process_id)?;
    let db_client = DbClient::connect(&env.database_url, worker_id, process_id).await?;

    let state = server::ServerState {
        db_client: Arc::new(db_client),
    };
    let app = server::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let cancellation_token = CancellationToken::new();
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error listening for shutdown signal");
        }
        signal_token.cancel();
    });

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    debug!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
