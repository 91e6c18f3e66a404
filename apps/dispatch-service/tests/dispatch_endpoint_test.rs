//! dispatch エンドポイントの統合テスト
//!
//! 冪等性（2 回目の dispatch は 409 でプロバイダ呼び出しなし）と
//! dispatch → webhook の一連の流れを HTTP レイヤーごしに検証する。

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{build_app, sign_payload};
use pretty_assertions::assert_eq;
use teamboard_domain::{
    announcement::{AnnouncementId, EmailStatus},
    member::Recipient,
};
use tower::ServiceExt;

async fn create_pending(app: &common::TestApp) -> AnnouncementId {
    use teamboard_domain::announcement::{AnnouncementContent, AnnouncementTitle};
    use teamboard_infra::repository::AnnouncementRepository;

    app.announcement_repo
        .create(
            &app.team_id,
            &AnnouncementTitle::new("新機能のお知らせ").unwrap(),
            &AnnouncementContent::new("来週から新しいカレンダー機能が使えます。").unwrap(),
        )
        .await
        .unwrap()
        .id()
}

fn dispatch_request(id: AnnouncementId, actor_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/internal/announcements/{}/dispatch", id.as_i64()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(r#"{{"actor_id":"{actor_id}"}}"#)))
        .unwrap()
}

#[tokio::test]
async fn test_dispatchの正常系で告知がsentになる() {
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![
            Recipient::new("tanaka@example.com", Some("田中太郎".to_string())),
            Recipient::new("suzuki@example.com", None),
        ],
    );
    let id = create_pending(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    use teamboard_infra::repository::AnnouncementRepository;
    let announcement = app
        .announcement_repo
        .find_by_id(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(announcement.status(), EmailStatus::Sent);
    assert_eq!(announcement.recipient_count(), 2);
    assert_eq!(app.mailer.call_count(), 1);
}

#[tokio::test]
async fn test_2回目のdispatchは409で送信は増えない() {
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![Recipient::new("tanaka@example.com", None)],
    );
    let id = create_pending(&app).await;

    let first = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.mailer.call_count(), 1);
}

#[tokio::test]
async fn test_リーダー以外のdispatchは403() {
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![Recipient::new("tanaka@example.com", None)],
    );
    let id = create_pending(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "someone-else"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.mailer.call_count(), 0);
}

#[tokio::test]
async fn test_存在しない告知のdispatchは404() {
    let app = build_app(Some(common::SECRET));

    let response = app
        .router
        .clone()
        .oneshot(dispatch_request(AnnouncementId::new(999), "leader-1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_受信者なしのdispatchは422() {
    let app = build_app(Some(common::SECRET));
    let id = create_pending(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_dispatch後のバウンスwebhookで一部失敗になる() {
    // エンドツーエンド: pending → dispatch → sent → バウンス → partially_failed
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![
            Recipient::new("tanaka@example.com", None),
            Recipient::new("suzuki@example.com", None),
        ],
    );
    let id = create_pending(&app).await;

    let dispatch_response = app
        .router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();
    assert_eq!(dispatch_response.status(), StatusCode::OK);

    // モックメーラーは 1 チャンク目に batch-1 を払い出す
    let payload =
        br#"{"type":"email.bounced","data":{"batch_id":"batch-1","email":"suzuki@example.com"}}"#;
    let (timestamp, signature) = sign_payload(payload);
    let webhook_response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/email")
                .header("svix-id", "msg-1")
                .header("svix-timestamp", &timestamp)
                .header("svix-signature", &signature)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(webhook_response.status(), StatusCode::OK);

    use teamboard_infra::repository::AnnouncementRepository;
    let announcement = app
        .announcement_repo
        .find_by_id(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(announcement.status(), EmailStatus::PartiallyFailed);
    assert_eq!(announcement.recipient_count(), 2);
    assert_eq!(
        announcement.failed_recipients(),
        &["suzuki@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_ステータスエンドポイントが配信状況を返す() {
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![Recipient::new("tanaka@example.com", None)],
    );
    let id = create_pending(&app).await;

    app.router
        .clone()
        .oneshot(dispatch_request(id, "leader-1"))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/internal/announcements/{}/status?actor_id=leader-1",
                    id.as_i64()
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pendingの告知は削除できsentの告知は削除できない() {
    let app = build_app(Some(common::SECRET));
    app.team_repo.set_recipients(
        app.team_id.clone(),
        vec![Recipient::new("tanaka@example.com", None)],
    );

    let pending_id = create_pending(&app).await;
    let sent_id = create_pending(&app).await;
    app.router
        .clone()
        .oneshot(dispatch_request(sent_id, "leader-1"))
        .await
        .unwrap();

    let delete = |id: AnnouncementId| {
        Request::builder()
            .method("DELETE")
            .uri(format!(
                "/internal/announcements/{}?actor_id=leader-1",
                id.as_i64()
            ))
            .body(Body::empty())
            .unwrap()
    };

    let pending_response = app.router.clone().oneshot(delete(pending_id)).await.unwrap();
    assert_eq!(pending_response.status(), StatusCode::NO_CONTENT);

    let sent_response = app.router.clone().oneshot(delete(sent_id)).await.unwrap();
    assert_eq!(sent_response.status(), StatusCode::BAD_REQUEST);
}
