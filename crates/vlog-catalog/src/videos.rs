//! Video repository.

use chrono::Utc;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vlog_models::ids::VideoId;
use vlog_models::video::{Codec, StreamingFormat, Video, VideoStatus};

use crate::error::{CatalogError, CatalogResult};

pub struct VideoRepository {
    pool: PgPool,
}

#[derive(FromRow)]
struct VideoRow {
    id: Uuid,
    slug: String,
    title: String,
    duration_secs: Option<f64>,
    source_width: Option<i32>,
    source_height: Option<i32>,
    status: String,
    streaming_format: String,
    primary_codec: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    deleted_at: Option<chrono::DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = "id, slug, title, duration_secs, source_width, source_height, \
     status, streaming_format, primary_codec, created_at, updated_at, deleted_at";

impl VideoRow {
    fn into_video(self) -> CatalogResult<Video> {
        Ok(Video {
            id: VideoId::from(self.id),
            slug: self.slug,
            title: self.title,
            duration_secs: self.duration_secs,
            source_width: self.source_width.map(|w| w as u32),
            source_height: self.source_height.map(|h| h as u32),
            status: parse_status(&self.status)?,
            streaming_format: parse_streaming_format(&self.streaming_format)?,
            primary_codec: self.primary_codec.as_deref().map(parse_codec).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

fn parse_status(s: &str) -> CatalogResult<VideoStatus> {
    match s {
        "pending" => Ok(VideoStatus::Pending),
        "processing" => Ok(VideoStatus::Processing),
        "ready" => Ok(VideoStatus::Ready),
        "failed" => Ok(VideoStatus::Failed),
        other => Err(CatalogError::ConstraintViolation(format!("unknown video status: {other}"))),
    }
}

fn parse_streaming_format(s: &str) -> CatalogResult<StreamingFormat> {
    match s {
        "hls_ts" => Ok(StreamingFormat::HlsTs),
        "cmaf" => Ok(StreamingFormat::Cmaf),
        other => Err(CatalogError::ConstraintViolation(format!("unknown streaming format: {other}"))),
    }
}

fn parse_codec(s: &str) -> CatalogResult<Codec> {
    match s {
        "h264" => Ok(Codec::H264),
        "hevc" => Ok(Codec::Hevc),
        "av1" => Ok(Codec::Av1),
        other => Err(CatalogError::ConstraintViolation(format!("unknown codec: {other}"))),
    }
}

/// Input to [`VideoRepository::create_video`].
pub struct NewVideo {
    pub slug: String,
    pub title: String,
    pub streaming_format: StreamingFormat,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_video(&self, meta: NewVideo) -> CatalogResult<VideoId> {
        if !vlog_models::slug::is_valid_slug(&meta.slug) {
            return Err(CatalogError::validation(format!("invalid slug: {}", meta.slug)));
        }
        let id = Uuid::new_v4();
        let streaming_format = match meta.streaming_format {
            StreamingFormat::HlsTs => "hls_ts",
            StreamingFormat::Cmaf => "cmaf",
        };
        sqlx::query(
            "INSERT INTO videos (id, slug, title, status, streaming_format) \
             VALUES ($1, $2, $3, 'pending', $4)",
        )
        .bind(id)
        .bind(&meta.slug)
        .bind(&meta.title)
        .bind(streaming_format)
        .execute(&self.pool)
        .await?;
        Ok(VideoId::from(id))
    }

    pub async fn get_by_id(&self, id: VideoId) -> CatalogResult<Video> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM videos WHERE id = $1");
        let row: VideoRow = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("video {id}")))?;
        row.into_video()
    }

    pub async fn get_by_slug(&self, slug: &str) -> CatalogResult<Video> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM videos WHERE slug = $1 AND deleted_at IS NULL");
        let row: VideoRow = sqlx::query_as(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("video {slug}")))?;
        row.into_video()
    }

    pub async fn list_active(&self, limit: i64, offset: i64) -> CatalogResult<Vec<Video>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM videos WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let rows: Vec<VideoRow> = sqlx::query_as(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(VideoRow::into_video).collect()
    }

    pub async fn set_status(&self, id: VideoId, status: VideoStatus) -> CatalogResult<()> {
        let rows = sqlx::query(
            "UPDATE videos SET status = $1, updated_at = now() WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(status.as_str())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("video {id}")));
        }
        Ok(())
    }

    pub async fn set_probed_metadata(
        &self,
        id: VideoId,
        duration_secs: f64,
        width: u32,
        height: u32,
        codec: Codec,
    ) -> CatalogResult<()> {
        let codec_str = match codec {
            Codec::H264 => "h264",
            Codec::Hevc => "hevc",
            Codec::Av1 => "av1",
        };
        sqlx::query(
            "UPDATE videos SET duration_secs = $1, source_width = $2, source_height = $3, \
             primary_codec = $4, updated_at = now() WHERE id = $5",
        )
        .bind(duration_secs)
        .bind(width as i32)
        .bind(height as i32)
        .bind(codec_str)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-delete; status transitions otherwise remain monotone.
    pub async fn soft_delete(&self, id: VideoId) -> CatalogResult<()> {
        let rows = sqlx::query("UPDATE videos SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("video {id}")));
        }
        Ok(())
    }

    pub async fn restore(&self, id: VideoId) -> CatalogResult<()> {
        let rows = sqlx::query("UPDATE videos SET deleted_at = NULL WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 {
            return Err(CatalogError::not_found(format!("video {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in ["pending", "processing", "ready", "failed"] {
            assert_eq!(parse_status(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn unknown_status_is_constraint_violation() {
        assert!(matches!(
            parse_status("bogus"),
            Err(CatalogError::ConstraintViolation(_))
        ));
    }
}
