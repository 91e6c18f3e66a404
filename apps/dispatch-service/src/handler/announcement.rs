//! 告知ハンドラ
//!
//! 告知の作成・一覧・削除・ステータス参照・dispatch のエンドポイント。
//! 操作者 ID は内部 API の慣例に従い、変更系はリクエストボディ、
//! 参照系はクエリパラメータで受け取る。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamboard_domain::{
    announcement::{Announcement, AnnouncementId},
    team::{LeaderId, TeamId},
};
use teamboard_shared::ApiResponse;
use uuid::Uuid;

use crate::{
    error::DispatchError,
    usecase::{AnnouncementStatusView, CreateAnnouncementInput, DispatchUseCaseImpl},
};

/// 告知ハンドラの状態
pub struct DispatchState {
    pub usecase: DispatchUseCaseImpl,
}

/// 告知作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub team_id:  Uuid,
    pub actor_id: String,
    pub title:    String,
    pub content:  String,
}

/// dispatch リクエスト
#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub actor_id: String,
}

/// 参照系エンドポイントの操作者クエリ
#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor_id: String,
}

/// 告知 DTO
#[derive(Debug, Serialize)]
pub struct AnnouncementDto {
    pub id:                i64,
    pub team_id:           Uuid,
    pub title:             String,
    pub content:           String,
    pub email_status:      String,
    pub recipient_count:   u32,
    pub delivered_count:   u32,
    pub error_message:     Option<String>,
    pub failed_recipients: Vec<String>,
    pub batch_ids:         Vec<String>,
    pub sent_at:           Option<DateTime<Utc>>,
    pub created_at:        DateTime<Utc>,
}

impl AnnouncementDto {
    pub fn from_announcement(announcement: &Announcement) -> Self {
        Self {
            id:                announcement.id().as_i64(),
            team_id:           *announcement.team_id().as_uuid(),
            title:             announcement.title().as_str().to_string(),
            content:           announcement.content().as_str().to_string(),
            email_status:      announcement.status().as_str().to_string(),
            recipient_count:   announcement.recipient_count(),
            delivered_count:   announcement.delivered_count(),
            error_message:     announcement.error_message().map(String::from),
            failed_recipients: announcement.failed_recipients().to_vec(),
            batch_ids:         announcement
                .batch_ids()
                .iter()
                .map(|b| b.as_str().to_string())
                .collect(),
            sent_at:           announcement.sent_at(),
            created_at:        announcement.created_at(),
        }
    }
}

/// dispatch レスポンス DTO
#[derive(Debug, Serialize)]
pub struct DispatchResponseDto {
    pub batch_ids: Vec<String>,
}

/// ステータス DTO
#[derive(Debug, Serialize)]
pub struct AnnouncementStatusDto {
    pub email_status:      String,
    pub sent_at:           Option<DateTime<Utc>>,
    pub recipient_count:   u32,
    pub delivered_count:   u32,
    pub error_message:     Option<String>,
    pub failed_recipients: Vec<String>,
}

impl AnnouncementStatusDto {
    fn from_view(view: &AnnouncementStatusView) -> Self {
        Self {
            email_status:      view.email_status.as_str().to_string(),
            sent_at:           view.sent_at,
            recipient_count:   view.recipient_count,
            delivered_count:   view.delivered_count,
            error_message:     view.error_message.clone(),
            failed_recipients: view.failed_recipients.clone(),
        }
    }
}

/// 告知を作成する（pending）
///
/// ## エンドポイント
/// POST /internal/announcements
pub async fn create_announcement(
    State(state): State<Arc<DispatchState>>,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<Response, DispatchError> {
    let actor = LeaderId::new(req.actor_id);
    let input = CreateAnnouncementInput {
        team_id: TeamId::from_uuid(req.team_id),
        title:   req.title,
        content: req.content,
    };

    let announcement = state.usecase.create_announcement(input, &actor).await?;

    let response = ApiResponse::new(AnnouncementDto::from_announcement(&announcement));
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// チームの告知一覧を取得する
///
/// ## エンドポイント
/// GET /internal/teams/{team_id}/announcements
pub async fn list_announcements(
    State(state): State<Arc<DispatchState>>,
    Path(team_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Response, DispatchError> {
    let actor = LeaderId::new(query.actor_id);
    let team_id = TeamId::from_uuid(team_id);

    let announcements = state.usecase.list_announcements(&team_id, &actor).await?;

    let response = ApiResponse::new(
        announcements
            .iter()
            .map(AnnouncementDto::from_announcement)
            .collect::<Vec<_>>(),
    );
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 告知をチームメンバー全員にメール送信する
///
/// ## エンドポイント
/// POST /internal/announcements/{id}/dispatch
pub async fn dispatch_announcement(
    State(state): State<Arc<DispatchState>>,
    Path(id): Path<i64>,
    Json(req): Json<DispatchRequest>,
) -> Result<Response, DispatchError> {
    let actor = LeaderId::new(req.actor_id);

    let outcome = state
        .usecase
        .dispatch(AnnouncementId::new(id), &actor)
        .await?;

    let response = ApiResponse::new(DispatchResponseDto {
        batch_ids: outcome
            .batch_ids
            .iter()
            .map(|b| b.as_str().to_string())
            .collect(),
    });
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 告知の配信ステータスを取得する
///
/// ## エンドポイント
/// GET /internal/announcements/{id}/status
pub async fn get_announcement_status(
    State(state): State<Arc<DispatchState>>,
    Path(id): Path<i64>,
    Query(query): Query<ActorQuery>,
) -> Result<Response, DispatchError> {
    let actor = LeaderId::new(query.actor_id);

    let view = state
        .usecase
        .get_status(AnnouncementId::new(id), &actor)
        .await?;

    let response = ApiResponse::new(AnnouncementStatusDto::from_view(&view));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 告知を削除する（pending / failed のみ）
///
/// ## エンドポイント
/// DELETE /internal/announcements/{id}
pub async fn delete_announcement(
    State(state): State<Arc<DispatchState>>,
    Path(id): Path<i64>,
    Query(query): Query<ActorQuery>,
) -> Result<Response, DispatchError> {
    let actor = LeaderId::new(query.actor_id);

    state
        .usecase
        .delete_announcement(AnnouncementId::new(id), &actor)
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
