//! Candidate repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::CandidateDbModel;
use crate::database::time::now_ms;
use crate::domain::{CandidateMedia, PrimaryMedia, ProcessingStatus, TargetLanguage};
use crate::utils::json::{self, JsonContext};
use crate::{Error, Result};

/// Candidate repository trait.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn get_candidate(&self, external_id: &str) -> Result<CandidateDbModel>;
    async fn find_candidate(&self, external_id: &str) -> Result<Option<CandidateDbModel>>;
    /// Insert unless a row with the same external id exists. Returns whether a row was inserted.
    async fn insert_if_absent(&self, candidate: &CandidateDbModel) -> Result<bool>;
    async fn mark_processing(&self, external_id: &str) -> Result<()>;
    /// Record re-hosted media and move to `completed` in one write.
    async fn complete_fetch(&self, external_id: &str, media: &CandidateMedia) -> Result<()>;
    async fn mark_failed(&self, external_id: &str, error: &str) -> Result<()>;
    /// Fail the candidate only if it is still `processing`.
    async fn fail_if_processing(&self, external_id: &str, error: &str) -> Result<bool>;
    async fn save_analysis(
        &self,
        external_id: &str,
        analysis: &str,
        adaptation_score: Option<f64>,
        is_adaptable: Option<bool>,
    ) -> Result<()>;
    async fn save_translation(
        &self,
        external_id: &str,
        lang: TargetLanguage,
        analysis: &str,
    ) -> Result<()>;
}

/// SQLx implementation of CandidateRepository.
pub struct SqlxCandidateRepository {
    pool: SqlitePool,
}

impl SqlxCandidateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn expect_one(rows: u64, external_id: &str) -> Result<()> {
    if rows == 0 {
        return Err(Error::not_found("Candidate", external_id));
    }
    Ok(())
}

#[async_trait]
impl CandidateRepository for SqlxCandidateRepository {
    async fn get_candidate(&self, external_id: &str) -> Result<CandidateDbModel> {
        self.find_candidate(external_id)
            .await?
            .ok_or_else(|| Error::not_found("Candidate", external_id))
    }

    async fn find_candidate(&self, external_id: &str) -> Result<Option<CandidateDbModel>> {
        let row = sqlx::query_as::<_, CandidateDbModel>(
            "SELECT * FROM candidates WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_if_absent(&self, c: &CandidateDbModel) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO candidates (
                external_id, platform, source_url, title, description,
                view_count, like_count, comment_count, share_count,
                creator_handle, creator_name, creator_followers, creator_avatar_source_url,
                music_title, music_author, hashtags, thumbnail_source_url,
                processing_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&c.external_id)
        .bind(&c.platform)
        .bind(&c.source_url)
        .bind(&c.title)
        .bind(&c.description)
        .bind(c.view_count)
        .bind(c.like_count)
        .bind(c.comment_count)
        .bind(c.share_count)
        .bind(&c.creator_handle)
        .bind(&c.creator_name)
        .bind(c.creator_followers)
        .bind(&c.creator_avatar_source_url)
        .bind(&c.music_title)
        .bind(&c.music_author)
        .bind(&c.hashtags)
        .bind(&c.thumbnail_source_url)
        .bind(&c.processing_status)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_processing(&self, external_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE candidates SET processing_status = ?, processing_error = NULL, updated_at = ? WHERE external_id = ?",
        )
        .bind(ProcessingStatus::Processing.as_str())
        .bind(now_ms())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), external_id)
    }

    async fn complete_fetch(&self, external_id: &str, media: &CandidateMedia) -> Result<()> {
        let (is_photo_post, video_url, image_urls) = match &media.primary {
            PrimaryMedia::Video { url } => (false, Some(url.clone()), None),
            PrimaryMedia::PhotoSet { urls } => (
                true,
                None,
                Some(json::to_string_or(
                    urls,
                    "[]",
                    JsonContext::CandidateField {
                        candidate_id: external_id,
                        field: "image_urls",
                    },
                    "Failed to serialize image_urls",
                )),
            ),
        };

        let result = sqlx::query(
            r#"
            UPDATE candidates SET
                is_photo_post = ?,
                video_url = ?,
                image_urls = ?,
                thumbnail_url = ?,
                creator_avatar_url = ?,
                processing_status = ?,
                processing_error = NULL,
                updated_at = ?
            WHERE external_id = ?
            "#,
        )
        .bind(is_photo_post)
        .bind(video_url)
        .bind(image_urls)
        .bind(&media.thumbnail_url)
        .bind(&media.creator_avatar_url)
        .bind(ProcessingStatus::Completed.as_str())
        .bind(now_ms())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), external_id)
    }

    async fn mark_failed(&self, external_id: &str, error: &str) -> Result<()> {
        // Media from an earlier fetch does not survive a failed one.
        let result = sqlx::query(
            r#"
            UPDATE candidates SET
                is_photo_post = 0,
                video_url = NULL,
                image_urls = NULL,
                thumbnail_url = NULL,
                creator_avatar_url = NULL,
                processing_status = ?,
                processing_error = ?,
                updated_at = ?
            WHERE external_id = ?
            "#,
        )
        .bind(ProcessingStatus::Failed.as_str())
        .bind(error)
        .bind(now_ms())
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), external_id)
    }

    async fn fail_if_processing(&self, external_id: &str, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE candidates SET
                is_photo_post = 0,
                video_url = NULL,
                image_urls = NULL,
                thumbnail_url = NULL,
                creator_avatar_url = NULL,
                processing_status = ?,
                processing_error = ?,
                updated_at = ?
            WHERE external_id = ? AND processing_status = ?
            "#,
        )
        .bind(ProcessingStatus::Failed.as_str())
        .bind(error)
        .bind(now_ms())
        .bind(external_id)
        .bind(ProcessingStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn save_analysis(
        &self,
        external_id: &str,
        analysis: &str,
        adaptation_score: Option<f64>,
        is_adaptable: Option<bool>,
    ) -> Result<()> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            UPDATE candidates SET
                gemini_analysis = ?,
                adaptation_score = ?,
                is_adaptable = ?,
                analyzed_at = ?,
                updated_at = ?
            WHERE external_id = ?
            "#,
        )
        .bind(analysis)
        .bind(adaptation_score)
        .bind(is_adaptable)
        .bind(now)
        .bind(now)
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), external_id)
    }

    async fn save_translation(
        &self,
        external_id: &str,
        lang: TargetLanguage,
        analysis: &str,
    ) -> Result<()> {
        // Column names come from a closed enum, never from input.
        let sql = format!(
            "UPDATE candidates SET {} = ?, updated_at = ? WHERE external_id = ?",
            lang.column()
        );
        let result = sqlx::query(&sql)
            .bind(analysis)
            .bind(now_ms())
            .bind(external_id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::domain::{CandidateDraft, CreatorInfo, EngagementStats, Platform};

    fn row(id: &str) -> CandidateDbModel {
        CandidateDbModel::from_draft(&CandidateDraft {
            external_id: id.to_string(),
            platform: Platform::TikTok,
            source_url: format!("https://www.tiktok.com/@u/video/{id}"),
            title: None,
            description: None,
            stats: EngagementStats::default(),
            creator: CreatorInfo::default(),
            music: None,
            hashtags: vec![],
            thumbnail_source_url: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_if_absent_dedups() {
        let repo = SqlxCandidateRepository::new(test_pool().await);

        assert!(repo.insert_if_absent(&row("1")).await.unwrap());
        assert!(!repo.insert_if_absent(&row("1")).await.unwrap());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM candidates")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_complete_fetch_sets_media_and_status() {
        let repo = SqlxCandidateRepository::new(test_pool().await);
        repo.insert_if_absent(&row("2")).await.unwrap();
        repo.mark_processing("2").await.unwrap();

        let media = CandidateMedia {
            primary: PrimaryMedia::PhotoSet {
                urls: vec!["https://s/1.jpg".into(), "https://s/3.jpg".into()],
            },
            thumbnail_url: None,
            creator_avatar_url: Some("https://s/avatar.jpg".into()),
        };
        repo.complete_fetch("2", &media).await.unwrap();

        let candidate = repo.get_candidate("2").await.unwrap().into_domain().unwrap();
        assert_eq!(candidate.processing_status, ProcessingStatus::Completed);
        assert_eq!(candidate.media, Some(media));
    }

    #[tokio::test]
    async fn test_missing_candidate_is_not_found() {
        let repo = SqlxCandidateRepository::new(test_pool().await);
        assert!(matches!(
            repo.mark_processing("nope").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            repo.get_candidate("nope").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_translation_does_not_touch_original() {
        let repo = SqlxCandidateRepository::new(test_pool().await);
        repo.insert_if_absent(&row("3")).await.unwrap();
        repo.save_analysis("3", r#"{"why_viral":"hola"}"#, Some(8.0), Some(true))
            .await
            .unwrap();
        repo.save_translation("3", TargetLanguage::En, r#"{"why_viral":"hello"}"#)
            .await
            .unwrap();

        let stored = repo.get_candidate("3").await.unwrap();
        assert_eq!(stored.gemini_analysis.as_deref(), Some(r#"{"why_viral":"hola"}"#));
        assert_eq!(stored.analysis_en.as_deref(), Some(r#"{"why_viral":"hello"}"#));
        assert!(stored.analysis_de.is_none());
        assert_eq!(stored.is_adaptable, Some(true));
    }

    #[tokio::test]
    async fn test_failure_clears_previous_media() {
        let repo = SqlxCandidateRepository::new(test_pool().await);
        repo.insert_if_absent(&row("5")).await.unwrap();
        let media = CandidateMedia {
            primary: PrimaryMedia::Video {
                url: "https://s/old.mp4".into(),
            },
            thumbnail_url: Some("https://s/thumb.jpg".into()),
            creator_avatar_url: Some("https://s/avatar.jpg".into()),
        };
        repo.complete_fetch("5", &media).await.unwrap();

        // Refetch that fails.
        repo.mark_processing("5").await.unwrap();
        repo.mark_failed("5", "resolver gone").await.unwrap();
        let stored = repo.get_candidate("5").await.unwrap();
        assert_eq!(stored.processing_status, "failed");
        assert!(!stored.is_photo_post);
        assert!(stored.video_url.is_none());
        assert!(stored.image_urls.is_none());
        assert!(stored.thumbnail_url.is_none());
        assert!(stored.creator_avatar_url.is_none());

        // Same for a stale refetch reaped by the job timeout.
        repo.complete_fetch("5", &media).await.unwrap();
        repo.mark_processing("5").await.unwrap();
        assert!(repo.fail_if_processing("5", "timeout").await.unwrap());
        let stored = repo.get_candidate("5").await.unwrap();
        assert!(stored.video_url.is_none());
        assert!(stored.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_fail_if_processing_only_touches_processing_rows() {
        let repo = SqlxCandidateRepository::new(test_pool().await);
        repo.insert_if_absent(&row("4")).await.unwrap();
        assert!(!repo.fail_if_processing("4", "timeout").await.unwrap());

        repo.mark_processing("4").await.unwrap();
        assert!(repo.fail_if_processing("4", "timeout").await.unwrap());
        let stored = repo.get_candidate("4").await.unwrap();
        assert_eq!(stored.processing_status, "failed");
        assert_eq!(stored.processing_error.as_deref(), Some("timeout"));
    }
}
