//! # TeamRepository
//!
//! チームと受信者リストの読み取りを担当するリポジトリ。
//!
//! チーム・メンバーの CRUD は別のサービスが所有しており、
//! 本エンジンは認可判定と受信者解決のための読み取りのみを行う。

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use teamboard_domain::{
    member::Recipient,
    team::{LeaderId, Team, TeamId, TeamName},
};

use crate::error::InfraError;

/// チームリポジトリトレイト
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// ID でチームを取得する
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, InfraError>;

    /// チームの受信者リストを解決する
    ///
    /// メールアドレスで重複排除し、登録順を保持する。
    async fn find_recipients(&self, id: &TeamId) -> Result<Vec<Recipient>, InfraError>;
}

/// PostgreSQL 実装の TeamRepository
#[derive(Debug, Clone)]
pub struct PostgresTeamRepository {
    pool: PgPool,
}

impl PostgresTeamRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamRepository for PostgresTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, InfraError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, leader_id
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let name = TeamName::new(row.try_get::<String, _>("name")?)
            .map_err(|e| InfraError::unexpected(e.to_string()))?;

        Ok(Some(Team::new(
            TeamId::from_uuid(row.try_get("id")?),
            name,
            LeaderId::new(row.try_get::<String, _>("leader_id")?),
        )))
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_recipients(&self, id: &TeamId) -> Result<Vec<Recipient>, InfraError> {
        let rows = sqlx::query(
            r#"
            SELECT m.email, m.full_name
            FROM team_members tm
            JOIN members m ON m.id = tm.member_id
            WHERE tm.team_id = $1
            ORDER BY m.created_at, m.id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        // 同一メンバーが複数回登録されていても 1 通だけ送る
        let mut seen = HashSet::new();
        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            let email: String = row.try_get("email")?;
            if seen.insert(email.clone()) {
                recipients.push(Recipient::new(email, row.try_get("full_name")?));
            }
        }

        Ok(recipients)
    }
}
