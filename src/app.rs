/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (store, token, otp, permission, users) → Router 組み立て
 * - ADMIN_* が設定されていれば初期管理者を作成
 * - HTTP middleware の適用
 * - axum::serve() で起動
 */
use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use std::{panic, process, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::{AdminSeed, Config, StoreBackend};
use crate::middleware;
use crate::repos::{
    CredentialStore, MemoryStore, OtpChallengeStore, PgCredentialStore, PgOtpChallengeStore,
};
use crate::services::auth::{
    AuthenticationEngine, PermissionResolver, TokenService,
    jwt::{JwtCodec, SigningKey},
    otp::OtpChallengeService,
    password::PasswordHasher,
    permission::load_permission_catalog,
};
use crate::services::notify::LogNotifier;
use crate::services::users::{NewAccount, UserService};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set.
    // Ex: RUST_LOG=info,identity=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash the whole process so the panic cannot go unnoticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting identity service in {:?} mode on {} ({:?} store)",
        config.app_env,
        config.addr,
        config.store_backend
    );

    let state = build_state(&config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_stores(
    config: &Config,
) -> Result<(Arc<dyn CredentialStore>, Arc<dyn OtpChallengeStore>)> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("failed to connect to postgres")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;

            let credentials: Arc<dyn CredentialStore> =
                Arc::new(PgCredentialStore::new(pool.clone()));
            let otp_challenges: Arc<dyn OtpChallengeStore> =
                Arc::new(PgOtpChallengeStore::new(pool));
            Ok((credentials, otp_challenges))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; nothing survives a restart");
            let store = MemoryStore::with_default_roles().await;
            let credentials: Arc<dyn CredentialStore> = Arc::new(store.clone());
            let otp_challenges: Arc<dyn OtpChallengeStore> = Arc::new(store);
            Ok((credentials, otp_challenges))
        }
    }
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let (credentials, otp_challenges) = build_stores(config).await?;

    let key = SigningKey::from_secret(config.jwt_secret.as_bytes())?;
    let tokens = Arc::new(TokenService::new(
        JwtCodec::new(key, config.auth_issuer.clone()),
        config.access_token_ttl_seconds,
        config.refresh_token_ttl_seconds,
    ));

    let otp = OtpChallengeService::new(otp_challenges, config.otp_ttl_seconds);
    let notifier = Arc::new(LogNotifier::new(!config.app_env.is_production()));

    let hasher = PasswordHasher::new();
    let users = Arc::new(UserService::new(credentials.clone(), hasher.clone()));
    if let Some(seed) = &config.admin_seed {
        seed_admin(&users, seed).await?;
    }

    let engine = Arc::new(AuthenticationEngine::new(
        credentials,
        hasher,
        tokens.clone(),
        otp,
        notifier,
    ));

    let permissions =
        PermissionResolver::new(load_permission_catalog(&config.permission_catalog_path));

    Ok(AppState::new(engine, users, tokens, permissions))
}

async fn seed_admin(users: &UserService, seed: &AdminSeed) -> Result<()> {
    let new = NewAccount {
        username: seed.username.clone(),
        email: seed.email.clone(),
        name: seed.username.clone(),
        surname: String::new(),
        password: seed.password.clone(),
        use_otp: false,
    };

    if users
        .ensure_account(new, "admin")
        .await
        .context("failed to seed the admin account")?
    {
        tracing::info!(username = %seed.username, "admin account created");
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router)
}
