//! Process entry point. Wires the nine components lib.rs documents —
//! storage, secret store, credential cache, gateway adapter, trust
//! layer, the three engines, and the RPC surface — then serves the
//! router and drives the background sweepers alongside it, the same
//! shape as the teacher's `transaction_service::main` scaled up from
//! one background job to four.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use payment_orchestrator::api::router::{build_router, AppState};
use payment_orchestrator::config::{Config, SecretStoreBackend};
use payment_orchestrator::domain::repository::AuditRepository;
use payment_orchestrator::domain::secret_store::SecretStore;
use payment_orchestrator::infrastructure::credential_cache::MerchantCredentialCache;
use payment_orchestrator::infrastructure::gateway_adapter::http_adapter::HttpGatewayAdapter;
use payment_orchestrator::infrastructure::persistence::{
    PostgresAuditRepository, PostgresMerchantRepository, PostgresPaymentMethodRepository,
    PostgresRateLimitRepository, PostgresServiceRepository, PostgresSubscriptionRepository,
    PostgresTransactionRepository, PostgresTrustRepository,
};
use payment_orchestrator::infrastructure::secret_store::{CachingSecretStore, FileSecretStore};
use payment_orchestrator::infrastructure::storage::{run_pool_monitor, Storage};
use payment_orchestrator::infrastructure::trust::{CallbackVerifier, JwtAuthenticator, RateLimiter};
use payment_orchestrator::jobs;
use payment_orchestrator::use_cases::merchant_admin::MerchantAdminEngine;
use payment_orchestrator::use_cases::payment_method_engine::PaymentMethodEngine;
use payment_orchestrator::use_cases::service_admin::ServiceAdminEngine;
use payment_orchestrator::use_cases::subscription_engine::SubscriptionEngine;
use payment_orchestrator::use_cases::transaction_engine::TransactionEngine;

const SWEEPER_TICK: Duration = Duration::from_secs(60);
const POOL_MONITOR_TICK: Duration = Duration::from_secs(30);
/// Spec §5: in-flight requests (including a browser-post callback mid
/// finalize) get this long to finish once shutdown begins before the
/// listener is torn down out from under them.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment and logging.
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(environment = ?config.environment, "starting payment orchestrator");

    // 2. Storage.
    let storage = Storage::connect(&config.database_url, &config.pool).await?;
    let pool = storage.pool().clone();
    info!("connected to database");

    // 3. Secret store: file-backed, wrapped in the TTL cache every
    // backend gets regardless (spec §4.2).
    let secrets: Arc<dyn SecretStore> = match config.secret_store_backend {
        SecretStoreBackend::File => Arc::new(CachingSecretStore::new(
            FileSecretStore::new(config.secret_store_root.clone()),
            config.secret_cache_ttl,
        )),
        SecretStoreBackend::Cloud => {
            // No cloud KMS adapter is wired yet; falling back to the
            // file backend keeps startup honest about what's actually
            // running rather than silently no-op-ing.
            tracing::warn!("SECRET_STORE_BACKEND=cloud has no adapter; using file backend");
            Arc::new(CachingSecretStore::new(
                FileSecretStore::new(config.secret_store_root.clone()),
                config.secret_cache_ttl,
            ))
        }
    };

    // 4. Repositories (C1).
    let merchants = Arc::new(PostgresMerchantRepository::new(pool.clone()));
    let services = Arc::new(PostgresServiceRepository::new(pool.clone()));
    let payment_methods_repo = Arc::new(PostgresPaymentMethodRepository::new(pool.clone()));
    let transactions_repo = Arc::new(PostgresTransactionRepository::new(pool.clone()));
    let subscriptions_repo = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let rate_limits = Arc::new(PostgresRateLimitRepository::new(pool.clone()));
    let trust_repo: Arc<dyn payment_orchestrator::domain::repository::TrustRepository> =
        Arc::new(PostgresTrustRepository::new(pool.clone()));
    let audit: Arc<dyn AuditRepository> = Arc::new(PostgresAuditRepository::new(pool.clone()));

    // 5. Credential cache (C3), gateway adapter (C4), trust layer (C5).
    let credentials = Arc::new(MerchantCredentialCache::new(
        merchants.clone(),
        secrets.clone(),
        config.credential_cache_ttl,
        config.credential_cache_capacity,
    ));
    let gateway: Arc<dyn payment_orchestrator::domain::gateway::GatewayAdapter> = Arc::new(
        HttpGatewayAdapter::new(config.gateway_server_url.clone(), config.gateway_tokenization_url.clone()),
    );
    let jwt = JwtAuthenticator::new(services.clone(), trust_repo.clone(), config.jwt_issuer_allowlist.clone());
    let rate_limiter = RateLimiter::new(rate_limits);
    let callback_verifier = CallbackVerifier::new(trust_repo.clone());

    // 6. Use-case engines, in dependency order (subscriptions and
    // payment methods each charge through the transaction engine).
    let transactions = Arc::new(TransactionEngine::new(
        storage.clone(),
        transactions_repo,
        credentials.clone(),
        gateway.clone(),
        audit.clone(),
    ));
    let payment_methods = Arc::new(PaymentMethodEngine::new(
        storage.clone(),
        payment_methods_repo.clone(),
        credentials.clone(),
        gateway.clone(),
        transactions.clone(),
    ));
    let subscriptions = Arc::new(SubscriptionEngine::new(
        storage.clone(),
        subscriptions_repo,
        payment_methods_repo,
        transactions.clone(),
    ));
    let merchant_admin = MerchantAdminEngine::new(merchants, secrets, credentials.clone());
    let service_admin = ServiceAdminEngine::new(services);

    // 7. RPC surface.
    let state = Arc::new(AppState {
        jwt,
        rate_limiter,
        callback_verifier,
        credentials,
        audit: audit.clone(),
        admin_secret: config.admin_secret.clone(),
        cron_secret: config.cron_secret.clone(),
        transactions,
        payment_methods: payment_methods.clone(),
        subscriptions: subscriptions.clone(),
        merchant_admin,
        service_admin,
    });
    let app = build_router(state);

    // 8. Background sweepers, each cancellable through the same
    // shutdown channel the HTTP server waits on.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sweeper_handles = vec![
        jobs::billing::spawn(
            subscriptions.clone(),
            SWEEPER_TICK,
            jobs::billing::DEFAULT_BATCH_SIZE,
            shutdown_rx.clone(),
        ),
        jobs::ach_verification::spawn(
            payment_methods.clone(),
            SWEEPER_TICK,
            jobs::ach_verification::DEFAULT_VERIFICATION_DELAY,
            jobs::ach_verification::DEFAULT_BATCH_SIZE,
            shutdown_rx.clone(),
        ),
        jobs::audit_cleanup::spawn(
            audit,
            SWEEPER_TICK,
            jobs::audit_cleanup::DEFAULT_RETENTION_DAYS,
            jobs::audit_cleanup::DEFAULT_BATCH_SIZE,
            shutdown_rx.clone(),
        ),
        jobs::jwt_cleanup::spawn(trust_repo, SWEEPER_TICK, shutdown_rx),
    ];
    let pool_monitor = tokio::spawn(run_pool_monitor(
        storage.clone(),
        config.pool.max_connections,
        POOL_MONITOR_TICK,
    ));
    sweeper_handles.push(pool_monitor);

    // 9. Serve, with the client's real socket address threaded through
    // for the callback receiver's source-IP check.
    let addr: SocketAddr = config.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    for handle in sweeper_handles {
        handle.abort();
    }

    Ok(())
}

/// Waits for SIGINT/SIGTERM, then tells every sweeper to stop and gives
/// in-flight requests [`SHUTDOWN_GRACE_PERIOD`] to finish before
/// `axum::serve` returns and the pool is dropped (spec §5).
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
}
