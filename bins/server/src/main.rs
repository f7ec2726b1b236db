//! Filegate API Server
//!
//! Main entry point for the Filegate file service.

mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use filegate_api::{AppState, RouterSettings, create_router};
use filegate_core::storage::{
    BucketAdmin, R2Presigner, StorageConfig, StorageProvider, StorageService,
};
use filegate_shared::config::{LogFormat, StorageBackend};
use filegate_shared::{AppConfig, AuthClient};

use crate::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(config.log_format());
    info!(env = %config.app.env, name = %config.app.name, "Starting Filegate");

    // Storage for the /files endpoints
    let provider = storage_provider(&config);
    let storage = StorageService::from_config(
        StorageConfig::new(provider.clone())
            .with_max_file_size(config.storage.max_file_size)
            .with_presign_ttl(config.storage.presign_expiry_secs),
    )
    .context("Failed to initialize storage")?;
    info!(
        provider = storage.provider_name(),
        bucket = storage.bucket(),
        max_file_size = config.storage.max_file_size,
        "Storage configured"
    );

    // Bucket administration
    let buckets = BucketAdmin::for_provider(&provider);
    if let Some(admin) = &buckets {
        if config.minio.create_bucket {
            admin
                .ensure_bucket(storage.bucket())
                .await
                .context("Failed to ensure storage bucket")?;
        }
    } else {
        info!("Bucket administration disabled for non-S3 storage");
    }

    // Cloudflare R2 (optional)
    let r2 = config.r2.as_ref().map(|r2| {
        info!(account_id = %r2.account_id, "Cloudflare R2 presigning enabled");
        R2Presigner::new(
            r2.endpoint_url(),
            &r2.access_key_id,
            &r2.secret_access_key,
            &r2.region,
            config.storage.max_presign_expiry_secs,
        )
    });

    // Auth service (optional)
    let auth = match config.auth.service_url() {
        Some(url) => {
            let client = AuthClient::new(url, Duration::from_secs(config.auth.timeout_secs))
                .context("Failed to create auth client")?;
            info!(verify_url = client.verify_url(), "Token verification enabled");
            Some(client)
        }
        None => {
            warn!("auth.service_url is not set; API routes are NOT authenticated");
            None
        }
    };

    // Create application state
    let state = AppState {
        storage: Arc::new(storage),
        buckets: buckets.map(Arc::new),
        r2: r2.map(Arc::new),
        auth: auth.map(Arc::new),
    };

    let settings = RouterSettings {
        development: config.is_development(),
        allowed_origins: config.cors.allowed_origins.clone(),
    };
    if !settings.development && settings.allowed_origins.is_empty() {
        warn!("cors.allowed_origins is empty; browser requests will be rejected");
    }

    // Create router
    let app = create_router(state, &settings);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result.context("Server task panicked")?.context("Server error")?;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!(timeout_secs = grace.as_secs(), "Shutdown signal received, draining connections");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            result.context("Server task panicked")?.context("Server error")?;
            info!("Server stopped");
        }
        Err(_) => warn!("Graceful shutdown timed out, exiting with open connections"),
    }

    Ok(())
}

/// Install the global subscriber in the configured format.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "filegate=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
    }
}

/// Storage provider for the configured backend.
fn storage_provider(config: &AppConfig) -> StorageProvider {
    match config.storage.backend {
        StorageBackend::Minio => StorageProvider::s3(
            config.minio.endpoint_url(),
            &config.minio.bucket,
            &config.minio.access_key,
            &config.minio.secret_key,
            &config.minio.region,
        ),
        StorageBackend::Local => StorageProvider::local_fs(&config.storage.local_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::load().expect("config should load")
    }

    #[test]
    fn test_minio_backend_uses_s3_provider() {
        let mut config = config();
        config.storage.backend = StorageBackend::Minio;
        config.minio.endpoint = "minio".to_string();
        config.minio.port = 9100;
        config.minio.bucket = "uploads".to_string();

        match storage_provider(&config) {
            StorageProvider::S3 {
                endpoint, bucket, ..
            } => {
                assert_eq!(endpoint, "http://minio:9100");
                assert_eq!(bucket, "uploads");
            }
            other => panic!("expected S3 provider, got {other:?}"),
        }
    }

    #[test]
    fn test_local_backend_uses_fs_provider() {
        let mut config = config();
        config.storage.backend = StorageBackend::Local;
        config.storage.local_root = "/tmp/filegate".into();

        assert!(matches!(
            storage_provider(&config),
            StorageProvider::LocalFs { ref root } if root.to_str() == Some("/tmp/filegate")
        ));
    }
}
