//! # 告知ユースケース
//!
//! 告知の作成・一覧・削除・ステータス参照と、メール一斉配信（dispatch）の
//! オーケストレーションを実装する。
//!
//! ## dispatch の冪等性
//!
//! 同一告知への dispatch が 2 回呼ばれても、プロバイダへの送信は
//! 最大 1 回しか発生しない。これは 2 段構えで保証される:
//!
//! 1. 事前チェック: ステータスが pending でなければ即座に拒否
//! 2. コミットポイント: `pending → sending` の条件付き更新。
//!    並行呼び出しが事前チェックをすり抜けても、ここで 1 つだけが通る

use std::sync::Arc;

use teamboard_domain::{
    announcement::{
        Announcement,
        AnnouncementContent,
        AnnouncementId,
        AnnouncementTitle,
        BatchId,
        EmailStatus,
    },
    clock::Clock,
    team::{LeaderId, Team, TeamId},
};
use teamboard_infra::repository::{AnnouncementRepository, TeamRepository};
use teamboard_shared::{event_log::event, log_business_event};

use super::{
    batch_sender::{BatchEmailSender, BatchSendError},
    rate_limiter::SendRateLimiter,
};
use crate::error::DispatchError;

/// 告知作成入力
#[derive(Debug, Clone)]
pub struct CreateAnnouncementInput {
    /// 対象チーム ID
    pub team_id: TeamId,
    /// タイトル（200 文字以内）
    pub title:   String,
    /// 本文（2000 文字以内）
    pub content: String,
}

/// dispatch の成功結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// プロバイダが払い出したバッチ ID（チャンクごとに 1 件）
    pub batch_ids: Vec<BatchId>,
}

/// 告知ステータスの参照ビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementStatusView {
    pub email_status:      EmailStatus,
    pub sent_at:           Option<chrono::DateTime<chrono::Utc>>,
    pub recipient_count:   u32,
    pub delivered_count:   u32,
    pub error_message:     Option<String>,
    pub failed_recipients: Vec<String>,
}

/// 告知ユースケース実装
///
/// すべての操作はチームリーダーのみが実行できる。
pub struct DispatchUseCaseImpl {
    announcement_repo: Arc<dyn AnnouncementRepository>,
    team_repo:         Arc<dyn TeamRepository>,
    batch_sender:      BatchEmailSender,
    rate_limiter:      SendRateLimiter,
    clock:             Arc<dyn Clock>,
}

impl DispatchUseCaseImpl {
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        team_repo: Arc<dyn TeamRepository>,
        batch_sender: BatchEmailSender,
        rate_limiter: SendRateLimiter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            announcement_repo,
            team_repo,
            batch_sender,
            rate_limiter,
            clock,
        }
    }

    /// 告知とその所属チームを取得し、操作者の認可を検証する
    async fn load_authorized(
        &self,
        id: AnnouncementId,
        actor: &LeaderId,
    ) -> Result<(Announcement, Team), DispatchError> {
        let announcement = self
            .announcement_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("告知が見つかりません: {id}")))?;

        let team = self
            .team_repo
            .find_by_id(announcement.team_id())
            .await?
            .ok_or_else(|| {
                DispatchError::NotFound(format!(
                    "チームが見つかりません: {}",
                    announcement.team_id()
                ))
            })?;

        if !team.is_led_by(actor) {
            return Err(DispatchError::Forbidden(
                "チームリーダーのみ告知を操作できます".to_string(),
            ));
        }

        Ok((announcement, team))
    }

    /// チームを取得し、操作者の認可を検証する
    async fn load_authorized_team(
        &self,
        team_id: &TeamId,
        actor: &LeaderId,
    ) -> Result<Team, DispatchError> {
        let team = self
            .team_repo
            .find_by_id(team_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("チームが見つかりません: {team_id}")))?;

        if !team.is_led_by(actor) {
            return Err(DispatchError::Forbidden(
                "チームリーダーのみ告知を操作できます".to_string(),
            ));
        }

        Ok(team)
    }

    /// 告知を作成する（pending）
    ///
    /// ## エラー
    ///
    /// - チームが見つからない場合: 404
    /// - 操作者がリーダーでない場合: 403
    /// - タイトル・本文のバリデーション失敗: 400
    pub async fn create_announcement(
        &self,
        input: CreateAnnouncementInput,
        actor: &LeaderId,
    ) -> Result<Announcement, DispatchError> {
        self.load_authorized_team(&input.team_id, actor).await?;

        let title = AnnouncementTitle::new(input.title)
            .map_err(|e| DispatchError::BadRequest(e.to_string()))?;
        let content = AnnouncementContent::new(input.content)
            .map_err(|e| DispatchError::BadRequest(e.to_string()))?;

        let announcement = self
            .announcement_repo
            .create(&input.team_id, &title, &content)
            .await?;

        log_business_event!(
            event.category = event::category::ANNOUNCEMENT,
            event.action = event::action::ANNOUNCEMENT_CREATED,
            event.entity_type = event::entity_type::ANNOUNCEMENT,
            event.entity_id = %announcement.id(),
            event.actor_id = %actor,
            event.result = event::result::SUCCESS,
            "告知を作成しました"
        );

        Ok(announcement)
    }

    /// チームの告知一覧を取得する（作成日時の降順）
    pub async fn list_announcements(
        &self,
        team_id: &TeamId,
        actor: &LeaderId,
    ) -> Result<Vec<Announcement>, DispatchError> {
        self.load_authorized_team(team_id, actor).await?;

        Ok(self.announcement_repo.find_by_team(team_id).await?)
    }

    /// 告知を削除する
    ///
    /// pending / failed のみ削除できる。sending / sent / partially_failed は
    /// 配信記録の監査性を保つため削除不可。
    pub async fn delete_announcement(
        &self,
        id: AnnouncementId,
        actor: &LeaderId,
    ) -> Result<(), DispatchError> {
        let (announcement, _team) = self.load_authorized(id, actor).await?;

        if !announcement.can_delete() {
            return Err(DispatchError::BadRequest(
                "送信中または送信済みの告知は削除できません".to_string(),
            ));
        }

        let deleted = self.announcement_repo.delete(id).await?;
        if !deleted {
            // 読み取りと削除の間に dispatch が始まった場合
            return Err(DispatchError::BadRequest(
                "送信中または送信済みの告知は削除できません".to_string(),
            ));
        }

        log_business_event!(
            event.category = event::category::ANNOUNCEMENT,
            event.action = event::action::ANNOUNCEMENT_DELETED,
            event.entity_type = event::entity_type::ANNOUNCEMENT,
            event.entity_id = %id,
            event.actor_id = %actor,
            event.result = event::result::SUCCESS,
            "告知を削除しました"
        );

        Ok(())
    }

    /// 告知の配信ステータスを取得する
    pub async fn get_status(
        &self,
        id: AnnouncementId,
        actor: &LeaderId,
    ) -> Result<AnnouncementStatusView, DispatchError> {
        let (announcement, _team) = self.load_authorized(id, actor).await?;

        Ok(AnnouncementStatusView {
            email_status:      announcement.status(),
            sent_at:           announcement.sent_at(),
            recipient_count:   announcement.recipient_count(),
            delivered_count:   announcement.delivered_count(),
            error_message:     announcement.error_message().map(String::from),
            failed_recipients: announcement.failed_recipients().to_vec(),
        })
    }

    /// 告知をチームメンバー全員にメール送信する
    ///
    /// ## 処理フロー
    ///
    /// 1. 告知とチームを取得し、操作者がリーダーであることを確認
    /// 2. 冪等性チェック: pending 以外は副作用なしで拒否
    /// 3. レート制限: ウィンドウ内の送信成功数が上限なら拒否
    /// 4. 受信者を解決（0 件なら拒否）
    /// 5. `pending → sending` の条件付き更新（コミットポイント、
    ///    `recipient_count` を同時に確定）
    /// 6. バッチ送信
    ///    - 成功: sent + バッチ ID + sent_at を記録
    ///    - 失敗: failed + 失敗理由を記録（受理済みバッチ ID があれば保持）
    ///
    /// ## エラー
    ///
    /// - 告知・チームが見つからない場合: 404
    /// - 操作者がリーダーでない場合: 403
    /// - pending 以外の告知: 409（プロバイダ呼び出しなし）
    /// - レート制限超過: 429（書き込みなし）
    /// - 受信者 0 件: 422
    /// - アドレス不正: 422（告知は failed になる）
    /// - プロバイダ失敗: 502（告知は failed になる）
    pub async fn dispatch(
        &self,
        id: AnnouncementId,
        actor: &LeaderId,
    ) -> Result<DispatchOutcome, DispatchError> {
        // 1. 取得と認可
        let (announcement, team) = self.load_authorized(id, actor).await?;

        // 2. 冪等性チェック
        if !announcement.status().is_dispatchable() {
            return Err(DispatchError::AlreadyProcessed(announcement.status()));
        }

        // 3. レート制限
        let now = self.clock.now();
        self.rate_limiter.check(team.id(), now).await?;

        // 4. 受信者を解決
        let recipients = self.team_repo.find_recipients(team.id()).await?;
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        // 5. コミットポイント: pending → sending の条件付き更新。
        //    並行 dispatch はここで 1 つだけが通る
        let started = self
            .announcement_repo
            .begin_sending(id, recipients.len() as u32)
            .await?;
        if !started {
            let current = self
                .announcement_repo
                .find_by_id(id)
                .await?
                .map(|a| a.status())
                .unwrap_or(EmailStatus::Sending);
            return Err(DispatchError::AlreadyProcessed(current));
        }

        // 6. バッチ送信と結果の記録
        match self
            .batch_sender
            .send(
                &recipients,
                announcement.title().as_str(),
                announcement.content().as_str(),
                team.name().as_str(),
            )
            .await
        {
            Ok(outcome) => {
                self.announcement_repo
                    .mark_sent(id, &outcome.batch_ids, self.clock.now())
                    .await?;

                log_business_event!(
                    event.category = event::category::ANNOUNCEMENT,
                    event.action = event::action::ANNOUNCEMENT_DISPATCHED,
                    event.entity_type = event::entity_type::ANNOUNCEMENT,
                    event.entity_id = %id,
                    event.actor_id = %actor,
                    event.result = event::result::SUCCESS,
                    recipient_count = outcome.total_recipients,
                    batch_count = outcome.batch_ids.len(),
                    "告知メールを送信しました"
                );

                Ok(DispatchOutcome {
                    batch_ids: outcome.batch_ids,
                })
            }
            Err(BatchSendError::Validation { invalid }) => {
                let message = format!("不正なメールアドレス: {}", invalid.join(", "));
                self.announcement_repo
                    .mark_failed(id, &message, &[])
                    .await?;

                log_business_event!(
                    event.category = event::category::ANNOUNCEMENT,
                    event.action = event::action::ANNOUNCEMENT_DISPATCH_FAILED,
                    event.entity_type = event::entity_type::ANNOUNCEMENT,
                    event.entity_id = %id,
                    event.actor_id = %actor,
                    event.result = event::result::FAILURE,
                    "アドレス不正のため告知メールを送信できませんでした"
                );

                Err(DispatchError::ValidationFailed { invalid })
            }
            Err(BatchSendError::Provider {
                message,
                committed_batch_ids,
            }) => {
                // 受理済みチャンクはプロバイダ側で取り消せない。
                // バッチ ID を保持し、後続の webhook イベントを突き合わせ可能にする
                self.announcement_repo
                    .mark_failed(id, &message, &committed_batch_ids)
                    .await?;

                log_business_event!(
                    event.category = event::category::ANNOUNCEMENT,
                    event.action = event::action::ANNOUNCEMENT_DISPATCH_FAILED,
                    event.entity_type = event::entity_type::ANNOUNCEMENT,
                    event.entity_id = %id,
                    event.actor_id = %actor,
                    event.result = event::result::FAILURE,
                    committed_batch_count = committed_batch_ids.len(),
                    "プロバイダエラーのため告知メールを送信できませんでした"
                );

                Err(DispatchError::Provider {
                    message,
                    committed_batch_ids,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use teamboard_domain::{
        clock::FixedClock,
        member::Recipient,
        team::{Team, TeamName},
    };
    use teamboard_infra::mock::{
        MockAnnouncementRepository,
        MockBatchMailer,
        MockTeamRepository,
    };

    use super::*;
    use crate::usecase::template_renderer::AnnouncementTemplateRenderer;

    const RATE_LIMIT: u32 = 10;
    const RATE_WINDOW_SECS: u64 = 3600;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Fixture {
        usecase:           DispatchUseCaseImpl,
        announcement_repo: MockAnnouncementRepository,
        team_repo:         MockTeamRepository,
        mailer:            MockBatchMailer,
        team_id:           TeamId,
        leader:            LeaderId,
    }

    fn make_fixture() -> Fixture {
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
        let usecase = DispatchUseCaseImpl::new(
            repo.clone(),
            Arc::new(team_repo.clone()),
            BatchEmailSender::new(
                Arc::new(mailer.clone()),
                AnnouncementTemplateRenderer::new().unwrap(),
            ),
            SendRateLimiter::new(repo, RATE_LIMIT, RATE_WINDOW_SECS),
            Arc::new(FixedClock::new(now())),
        );

        Fixture {
            usecase,
            announcement_repo,
            team_repo,
            mailer,
            team_id,
            leader,
        }
    }

    fn set_two_recipients(fixture: &Fixture) {
        fixture.team_repo.set_recipients(
            fixture.team_id.clone(),
            vec![
                Recipient::new("tanaka@example.com", Some("田中太郎".to_string())),
                Recipient::new("suzuki@example.com", None),
            ],
        );
    }

    async fn create_pending(fixture: &Fixture) -> AnnouncementId {
        let input = CreateAnnouncementInput {
            team_id: fixture.team_id.clone(),
            title:   "新機能のお知らせ".to_string(),
            content: "来週から新しいカレンダー機能が使えます。".to_string(),
        };
        fixture
            .usecase
            .create_announcement(input, &fixture.leader)
            .await
            .unwrap()
            .id()
    }

    /// 事前条件: 送信成功済みの告知を count 件作る（レート制限テスト用）
    async fn create_sent_announcements(fixture: &Fixture, count: usize) {
        for i in 0..count {
            let id = create_pending(fixture).await;
            fixture.announcement_repo.begin_sending(id, 1).await.unwrap();
            fixture
                .announcement_repo
                .mark_sent(id, &[BatchId::new(format!("prior-{i}"))], now())
                .await
                .unwrap();
        }
    }

    // ===== dispatch =====

    #[tokio::test]
    async fn test_dispatch_正常系でsentになりバッチidが返る() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        let id = create_pending(&fixture).await;

        let outcome = fixture.usecase.dispatch(id, &fixture.leader).await.unwrap();

        assert_eq!(outcome.batch_ids, vec![BatchId::new("batch-1")]);

        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Sent);
        assert_eq!(announcement.recipient_count(), 2);
        assert_eq!(announcement.sent_at(), Some(now()));
        assert_eq!(announcement.batch_ids(), &[BatchId::new("batch-1")]);
        assert_eq!(fixture.mailer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_2回目はalready_processedで送信は1回だけ() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        let id = create_pending(&fixture).await;

        fixture.usecase.dispatch(id, &fixture.leader).await.unwrap();
        let before = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();

        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        assert!(matches!(
            result,
            Err(DispatchError::AlreadyProcessed(EmailStatus::Sent))
        ));
        // プロバイダ呼び出しは増えず、recipient_count / バッチ ID も不変
        assert_eq!(fixture.mailer.call_count(), 1);
        let after = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_dispatch_リーダー以外は403() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        let id = create_pending(&fixture).await;

        let result = fixture
            .usecase
            .dispatch(id, &LeaderId::new("someone-else"))
            .await;

        assert!(matches!(result, Err(DispatchError::Forbidden(_))));
        assert_eq!(fixture.mailer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_存在しない告知は404() {
        let fixture = make_fixture();

        let result = fixture
            .usecase
            .dispatch(AnnouncementId::new(999), &fixture.leader)
            .await;

        assert!(matches!(result, Err(DispatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dispatch_受信者0件は拒否されステータスはpendingのまま() {
        let fixture = make_fixture();
        // 受信者を設定しない
        let id = create_pending(&fixture).await;

        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        assert!(matches!(result, Err(DispatchError::NoRecipients)));
        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_ウィンドウ内10件送信済みで11件目は429() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        create_sent_announcements(&fixture, RATE_LIMIT as usize).await;
        let calls_before = fixture.mailer.call_count();

        let id = create_pending(&fixture).await;
        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        assert!(matches!(result, Err(DispatchError::RateLimited { .. })));
        // プロバイダ呼び出しなし、ステータスも pending のまま
        assert_eq!(fixture.mailer.call_count(), calls_before);
        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Pending);
    }

    #[tokio::test]
    async fn test_dispatch_不正アドレスでfailedになり送信されない() {
        let fixture = make_fixture();
        fixture.team_repo.set_recipients(
            fixture.team_id.clone(),
            vec![
                Recipient::new("ok@example.com", None),
                Recipient::new("not-an-address", None),
            ],
        );
        let id = create_pending(&fixture).await;

        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        assert!(matches!(
            result,
            Err(DispatchError::ValidationFailed { .. })
        ));
        assert_eq!(fixture.mailer.call_count(), 0);

        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Failed);
        assert!(
            announcement
                .error_message()
                .unwrap()
                .contains("not-an-address")
        );
    }

    #[tokio::test]
    async fn test_dispatch_プロバイダ失敗でfailedになり理由が残る() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        fixture.mailer.fail_on_nth_call(1);
        let id = create_pending(&fixture).await;

        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        assert!(matches!(result, Err(DispatchError::Provider { .. })));

        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Failed);
        assert!(announcement.error_message().is_some());
    }

    #[tokio::test]
    async fn test_dispatch_チャンク途中失敗では受理済みバッチidが永続化される() {
        let fixture = make_fixture();
        let recipients: Vec<Recipient> = (0..150)
            .map(|i| Recipient::new(format!("member{i}@example.com"), None))
            .collect();
        fixture
            .team_repo
            .set_recipients(fixture.team_id.clone(), recipients);
        fixture.mailer.fail_on_nth_call(2);
        let id = create_pending(&fixture).await;

        let result = fixture.usecase.dispatch(id, &fixture.leader).await;

        let Err(DispatchError::Provider {
            committed_batch_ids,
            ..
        }) = result
        else {
            panic!("Provider エラーであること");
        };
        assert_eq!(committed_batch_ids, vec![BatchId::new("batch-1")]);

        // failed でも受理済みバッチ ID から逆引きできる
        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Failed);
        assert_eq!(announcement.batch_ids(), &[BatchId::new("batch-1")]);
        let ids = fixture
            .announcement_repo
            .find_ids_by_batch_id(&BatchId::new("batch-1"))
            .await
            .unwrap();
        assert_eq!(ids, vec![id]);
    }

    #[tokio::test]
    async fn test_dispatch_250件の受信者で3バッチidが返る() {
        let fixture = make_fixture();
        let recipients: Vec<Recipient> = (0..250)
            .map(|i| Recipient::new(format!("member{i}@example.com"), None))
            .collect();
        fixture
            .team_repo
            .set_recipients(fixture.team_id.clone(), recipients);
        let id = create_pending(&fixture).await;

        let outcome = fixture.usecase.dispatch(id, &fixture.leader).await.unwrap();

        assert_eq!(outcome.batch_ids.len(), 3);
        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.recipient_count(), 250);
    }

    // ===== 作成・一覧・削除・ステータス =====

    #[tokio::test]
    async fn test_create_announcement_正常系() {
        let fixture = make_fixture();

        let id = create_pending(&fixture).await;

        let announcement = fixture
            .announcement_repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(announcement.status(), EmailStatus::Pending);
        assert_eq!(announcement.title().as_str(), "新機能のお知らせ");
    }

    #[tokio::test]
    async fn test_create_announcement_タイトル超過は400() {
        let fixture = make_fixture();

        let input = CreateAnnouncementInput {
            team_id: fixture.team_id.clone(),
            title:   "あ".repeat(201),
            content: "本文".to_string(),
        };
        let result = fixture
            .usecase
            .create_announcement(input, &fixture.leader)
            .await;

        assert!(matches!(result, Err(DispatchError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_announcement_リーダー以外は403() {
        let fixture = make_fixture();

        let input = CreateAnnouncementInput {
            team_id: fixture.team_id.clone(),
            title:   "お知らせ".to_string(),
            content: "本文".to_string(),
        };
        let result = fixture
            .usecase
            .create_announcement(input, &LeaderId::new("someone-else"))
            .await;

        assert!(matches!(result, Err(DispatchError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_announcement_pendingは削除できる() {
        let fixture = make_fixture();
        let id = create_pending(&fixture).await;

        fixture
            .usecase
            .delete_announcement(id, &fixture.leader)
            .await
            .unwrap();

        assert!(
            fixture
                .announcement_repo
                .find_by_id(id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_announcement_送信済みは400() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        let id = create_pending(&fixture).await;
        fixture.usecase.dispatch(id, &fixture.leader).await.unwrap();

        let result = fixture.usecase.delete_announcement(id, &fixture.leader).await;

        assert!(matches!(result, Err(DispatchError::BadRequest(_))));
        assert!(
            fixture
                .announcement_repo
                .find_by_id(id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_get_status_送信後の内容を返す() {
        let fixture = make_fixture();
        set_two_recipients(&fixture);
        let id = create_pending(&fixture).await;
        fixture.usecase.dispatch(id, &fixture.leader).await.unwrap();

        let status = fixture.usecase.get_status(id, &fixture.leader).await.unwrap();

        assert_eq!(
            status,
            AnnouncementStatusView {
                email_status:      EmailStatus::Sent,
                sent_at:           Some(now()),
                recipient_count:   2,
                delivered_count:   0,
                error_message:     None,
                failed_recipients: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_list_announcements_チームの告知のみ返す() {
        let fixture = make_fixture();
        let id = create_pending(&fixture).await;

        // 別チームの告知
        let other_team = TeamId::new();
        fixture.team_repo.add_team(Team::new(
            other_team.clone(),
            TeamName::new("別チーム").unwrap(),
            LeaderId::new("other-leader"),
        ));
        fixture
            .usecase
            .create_announcement(
                CreateAnnouncementInput {
                    team_id: other_team,
                    title:   "別チームのお知らせ".to_string(),
                    content: "本文".to_string(),
                },
                &LeaderId::new("other-leader"),
            )
            .await
            .unwrap();

        let list = fixture
            .usecase
            .list_announcements(&fixture.team_id, &fixture.leader)
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id(), id);
    }
}
