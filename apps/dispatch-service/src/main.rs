//! # Dispatch Service サーバー
//!
//! 告知メール配信エンジンのエントリーポイント。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DISPATCH_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `DISPATCH_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `MAILER_BACKEND` | No | `http` / `noop`（デフォルト: `noop`） |
//! | `MAILER_API_BASE_URL` | No | プロバイダ API のベース URL |
//! | `MAILER_API_KEY` | No | プロバイダ API キー（backend=http で必須） |
//! | `MAILER_FROM_ADDRESS` | No | 送信元メールアドレス |
//! | `MAILER_TIMEOUT_SECS` | No | 1 チャンク送信のタイムアウト秒（デフォルト: 10） |
//! | `WEBHOOK_SIGNING_SECRET` | No | webhook 署名シークレット（未設定だと webhook は 500） |
//! | `RATE_LIMIT_MAX_PER_WINDOW` | No | ウィンドウ内の最大送信数（デフォルト: 10） |
//! | `RATE_LIMIT_WINDOW_SECS` | No | ウィンドウ幅秒（デフォルト: 3600） |
//!
//! ## 起動方法
//!
//! ```bash
//! DISPATCH_PORT=3002 DATABASE_URL=postgres://... cargo run -p teamboard-dispatch-service
//! ```

use std::{net::SocketAddr, sync::Arc, time::Duration};

use teamboard_dispatch_service::{
    app_router,
    config::DispatchConfig,
    handler::{DispatchState, WebhookState},
    usecase::{
        AnnouncementTemplateRenderer,
        BatchEmailSender,
        DispatchUseCaseImpl,
        SendRateLimiter,
        WebhookReconcilerImpl,
    },
};
use teamboard_domain::clock::SystemClock;
use teamboard_infra::{
    db,
    mailer::{BatchMailer, HttpBatchMailer, NoopBatchMailer},
    repository::{
        AnnouncementRepository,
        PostgresAnnouncementRepository,
        PostgresTeamRepository,
    },
    webhook_signature::WebhookSignatureVerifier,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Dispatch Service サーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,teamboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 設定読み込み
    let config = DispatchConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "Dispatch Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの適用に失敗しました");
    tracing::info!("データベースに接続しました");

    // メール送信バックエンドを選択
    let mailer: Arc<dyn BatchMailer> = match config.mailer.backend.as_str() {
        "http" => {
            let mailer = HttpBatchMailer::new(
                config.mailer.api_base_url.clone(),
                config.mailer.api_key.clone(),
                config.mailer.from_address.clone(),
                Duration::from_secs(config.mailer.timeout_secs),
            )
            .expect("HTTP メーラーの構築に失敗しました");
            Arc::new(mailer)
        }
        _ => {
            tracing::warn!("Noop メールバックエンドを使用します（メールは送信されません）");
            Arc::new(NoopBatchMailer::new())
        }
    };

    // webhook 署名検証器（未設定の場合は fail closed）
    let verifier = match &config.webhook.signing_secret {
        Some(secret) => Some(
            WebhookSignatureVerifier::new(secret)
                .expect("WEBHOOK_SIGNING_SECRET が不正です"),
        ),
        None => {
            tracing::warn!(
                "WEBHOOK_SIGNING_SECRET が未設定のため、webhook は常に 500 を返します"
            );
            None
        }
    };

    // 依存コンポーネントを初期化
    let announcement_repo: Arc<dyn AnnouncementRepository> =
        Arc::new(PostgresAnnouncementRepository::new(pool.clone()));
    let team_repo = Arc::new(PostgresTeamRepository::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let renderer =
        AnnouncementTemplateRenderer::new().expect("テンプレートの初期化に失敗しました");
    let batch_sender = BatchEmailSender::new(mailer, renderer);
    let rate_limiter = SendRateLimiter::new(
        announcement_repo.clone(),
        config.rate_limit.max_per_window,
        config.rate_limit.window_secs,
    );

    let dispatch_state = Arc::new(DispatchState {
        usecase: DispatchUseCaseImpl::new(
            announcement_repo.clone(),
            team_repo,
            batch_sender,
            rate_limiter,
            clock.clone(),
        ),
    });

    let webhook_state = Arc::new(WebhookState {
        reconciler: WebhookReconcilerImpl::new(announcement_repo, verifier, clock),
    });

    // ルーター構築
    let app = app_router(dispatch_state, webhook_state).layer(TraceLayer::new_for_http());

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Dispatch Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
