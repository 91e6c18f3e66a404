//! # Dispatch Service 設定
//!
//! 環境変数から Dispatch Service サーバーの設定を読み込む。

use std::env;

/// Dispatch Service サーバーの設定
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// データベース接続 URL
    pub database_url: String,
    /// メール送信設定
    pub mailer: MailerConfig,
    /// webhook 設定
    pub webhook: WebhookConfig,
    /// レート制限設定
    pub rate_limit: RateLimitConfig,
}

/// メール送信の設定
///
/// `MAILER_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `http`: プロバイダのバッチ送信 API 経由で送信（本番）
/// - `noop`: 送信しない（ログ出力のみ、開発用）
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// 送信バックエンド（"http" | "noop"）
    pub backend:      String,
    /// プロバイダ API のベース URL（backend=http の場合に使用）
    pub api_base_url: String,
    /// プロバイダ API キー（backend=http の場合に使用）
    pub api_key:      String,
    /// 送信元メールアドレス
    pub from_address: String,
    /// 1 チャンク送信あたりのタイムアウト（秒）
    pub timeout_secs: u64,
}

/// webhook 受信の設定
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 署名シークレット（未設定の場合、webhook は fail closed で 500 を返す）
    pub signing_secret: Option<String>,
}

/// レート制限の設定
///
/// 1 チームあたり、直近 `window_secs` 秒間に送信成功
/// （sent / partially_failed）した告知が `max_per_window` 件以上ある場合、
/// 次の dispatch を拒否する。
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// ウィンドウ内の最大送信数
    pub max_per_window: u32,
    /// ウィンドウ幅（秒）
    pub window_secs:    u64,
}

impl DispatchConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("DISPATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("DISPATCH_PORT")
                .expect("DISPATCH_PORT が設定されていません")
                .parse()
                .expect("DISPATCH_PORT は有効なポート番号である必要があります"),
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL が設定されていません"),
            mailer: MailerConfig::from_env(),
            webhook: WebhookConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
        })
    }
}

impl MailerConfig {
    fn from_env() -> Self {
        Self {
            backend:      env::var("MAILER_BACKEND").unwrap_or_else(|_| "noop".to_string()),
            api_base_url: env::var("MAILER_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            api_key:      env::var("MAILER_API_KEY").unwrap_or_default(),
            from_address: env::var("MAILER_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@teamboard.example.com".to_string()),
            timeout_secs: env::var("MAILER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("MAILER_TIMEOUT_SECS は有効な秒数である必要があります"),
        }
    }
}

impl WebhookConfig {
    fn from_env() -> Self {
        Self {
            signing_secret: env::var("WEBHOOK_SIGNING_SECRET").ok(),
        }
    }
}

impl RateLimitConfig {
    fn from_env() -> Self {
        Self {
            max_per_window: env::var("RATE_LIMIT_MAX_PER_WINDOW")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("RATE_LIMIT_MAX_PER_WINDOW は有効な整数である必要があります"),
            window_secs:    env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .expect("RATE_LIMIT_WINDOW_SECS は有効な秒数である必要があります"),
        }
    }
}
