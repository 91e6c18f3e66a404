//! 統合テスト共通フィクスチャ
//!
//! モックを注入したルーターを組み立て、tower の `oneshot` で
//! HTTP レイヤーごしの振る舞いを検証する。

use std::sync::Arc;

use axum::Router;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use teamboard_dispatch_service::{
    app_router,
    handler::{DispatchState, WebhookState},
    usecase::{
        AnnouncementTemplateRenderer,
        BatchEmailSender,
        DispatchUseCaseImpl,
        SendRateLimiter,
        WebhookReconcilerImpl,
    },
};
use teamboard_domain::{
    clock::FixedClock,
    team::{LeaderId, Team, TeamId, TeamName},
};
use teamboard_infra::{
    mock::{MockAnnouncementRepository, MockBatchMailer, MockTeamRepository},
    repository::AnnouncementRepository,
    webhook_signature::WebhookSignatureVerifier,
};

pub const SECRET: &str = "whsec_dGVzdC1zZWNyZXQta2V5";

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub struct TestApp {
    pub router:            Router,
    pub announcement_repo: MockAnnouncementRepository,
    pub team_repo:         MockTeamRepository,
    pub mailer:            MockBatchMailer,
    pub team_id:           TeamId,
    pub leader:            LeaderId,
}

/// モック注入済みのアプリケーションを構築する
pub fn build_app(webhook_secret: Option<&str>) -> TestApp {
    let announcement_repo = MockAnnouncementRepository::new();
    let team_repo = MockTeamRepository::new();
    let mailer = MockBatchMailer::new();

    let team_id = TeamId::new();
    let leader = LeaderId::new("leader-1");
    team_repo.add_team(Team::new(
        team_id.clone(),
        TeamName::new("開発チーム").unwrap(),
        leader.clone(),
    ));

    let repo: Arc<dyn AnnouncementRepository> = Arc::new(announcement_repo.clone());
    let clock = Arc::new(FixedClock::new(fixed_now()));

    let dispatch_state = Arc::new(DispatchState {
        usecase: DispatchUseCaseImpl::new(
            repo.clone(),
            Arc::new(team_repo.clone()),
            BatchEmailSender::new(
                Arc::new(mailer.clone()),
                AnnouncementTemplateRenderer::new().unwrap(),
            ),
            SendRateLimiter::new(repo.clone(), 10, 3600),
            clock.clone(),
        ),
    });

    let webhook_state = Arc::new(WebhookState {
        reconciler: WebhookReconcilerImpl::new(
            repo,
            webhook_secret.map(|s| WebhookSignatureVerifier::new(s).unwrap()),
            clock,
        ),
    });

    TestApp {
        router: app_router(dispatch_state, webhook_state),
        announcement_repo,
        team_repo,
        mailer,
        team_id,
        leader,
    }
}

/// テスト用の webhook 署名を生成する（`(timestamp, signature)` を返す）
pub fn sign_payload(payload: &[u8]) -> (String, String) {
    let timestamp = fixed_now().timestamp().to_string();
    let key = BASE64
        .decode(SECRET.strip_prefix("whsec_").unwrap())
        .unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    mac.update(format!("msg-1.{timestamp}.").as_bytes());
    mac.update(payload);
    let signature = format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()));
    (timestamp, signature)
}
