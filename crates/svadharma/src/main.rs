mod api;
mod catalog;
mod config;
mod counselor;
mod error;
mod filter;
mod model;
mod server;
mod view;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog::Catalog;
use config::Config;
use counselor::{AiGateway, GeminiGateway};
use server::SvadharmaServer;
use svadharma_common::gemini::{GeminiClient, GeminiClientConfig};
use svadharma_common::kv::{FileKv, KvStore};
use svadharma_common::redis::RedisKv;
use svadharma_common::roadmap::RoadmapStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting svadharma MCP server");

    let config = Config::from_env()?;
    info!(
        data_dir = %config.data_dir,
        storage_key = %config.storage_key,
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    let catalog = Arc::new(Catalog::load()?);
    info!(
        exams = catalog.exams().len(),
        courses = catalog.courses().len(),
        skills = catalog.skill_options().len(),
        careers = catalog.career_options().len(),
        "catalog loaded"
    );

    let gemini_config = GeminiClientConfig::from_env();
    if gemini_config.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; AI requests will fail");
    }
    info!(model = %gemini_config.model, "gateway configured");
    let client = Arc::new(GeminiClient::new(gemini_config)?);
    let gateway: Arc<dyn AiGateway> = Arc::new(GeminiGateway::new(client));

    let kv: Arc<dyn KvStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisKv::new(url)?;
            if redis.is_available().await {
                info!("redis connected");
            } else {
                tracing::warn!("redis not reachable yet; roadmap storage will fail until it is");
            }
            Arc::new(redis)
        }
        None => {
            std::fs::create_dir_all(config.data_dir())?;
            Arc::new(FileKv::new(config.data_dir()))
        }
    };
    info!(backend = kv.backend(), "roadmap storage selected");
    let store = Arc::new(RoadmapStore::open(kv, config.storage_key.clone()));

    if let Some(addr) = config.tcp_listen_addr.as_deref() {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = tokio::signal::ctrl_c() => break,
            };
            let catalog = Arc::clone(&catalog);
            let store = Arc::clone(&store);
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let server = SvadharmaServer::new(catalog, store, gateway)
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "failed to start session"))?;
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        let server = SvadharmaServer::new(catalog, Arc::clone(&store), gateway).await?;
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
    }

    store.close().await?;
    info!("MCP server shut down");
    Ok(())
}
