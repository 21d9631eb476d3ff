//! Segment storage operations and HLS/CMAF static-serving metadata (§4.5, §6).

use tracing::info;
use vlog_models::ids::VideoId;
use vlog_models::video::Quality;

use crate::client::R2Client;
use crate::error::StorageResult;

/// Object key for a single transcoded segment.
pub fn segment_key(video_id: VideoId, quality: Quality, name: &str) -> String {
    format!("{}/{}/{}", video_id, quality.as_str(), name)
}

/// Object key for a quality's playlist (`.m3u8`) or CMAF manifest.
pub fn playlist_key(video_id: VideoId, quality: Quality, filename: &str) -> String {
    format!("{}/{}/{}", video_id, quality.as_str(), filename)
}

/// Object key for a video's thumbnail.
pub fn thumbnail_key(video_id: VideoId) -> String {
    format!("{video_id}/thumbnail.jpg")
}

/// Object key for a video's uploaded source, prior to transcoding.
pub fn source_key(video_id: VideoId) -> String {
    format!("{video_id}/source")
}

/// `(content_type, cache_control)` for a path served under `/videos/{slug}/…`.
///
/// File-extension rules per the static-serving contract: manifests are
/// never cached, media segments and init segments are cached for a year
/// (content-addressed by sequence, never overwritten in place), and the
/// thumbnail gets a short revalidating cache.
pub fn content_headers_for_path(path: &str) -> (&'static str, &'static str) {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with("thumbnail.jpg") {
        ("image/jpeg", "max-age=60, must-revalidate")
    } else if lower.ends_with(".m3u8") {
        ("application/vnd.apple.mpegurl", "no-cache")
    } else if lower.ends_with(".ts") {
        ("video/mp2t", "public, max-age=31536000")
    } else if lower.ends_with(".m4s") {
        ("video/iso.segment", "public, max-age=31536000")
    } else if lower.ends_with(".mp4") {
        ("video/mp4", "public, max-age=31536000")
    } else {
        ("application/octet-stream", "no-cache")
    }
}

impl R2Client {
    /// Uploads one verified segment. Payload bytes only; the Catalog tracks
    /// the metadata reference once this succeeds.
    pub async fn upload_segment(
        &self,
        video_id: VideoId,
        quality: Quality,
        name: &str,
        bytes: Vec<u8>,
    ) -> StorageResult<String> {
        let key = segment_key(video_id, quality, name);
        let (content_type, _) = content_headers_for_path(name);
        self.upload_bytes(bytes, &key, content_type).await?;
        Ok(key)
    }

    /// Uploads a quality's playlist/manifest file.
    pub async fn upload_playlist(
        &self,
        video_id: VideoId,
        quality: Quality,
        filename: &str,
        bytes: Vec<u8>,
    ) -> StorageResult<String> {
        let key = playlist_key(video_id, quality, filename);
        let (content_type, _) = content_headers_for_path(filename);
        self.upload_bytes(bytes, &key, content_type).await?;
        Ok(key)
    }

    /// Uploads the video's thumbnail.
    pub async fn upload_thumbnail(&self, video_id: VideoId, bytes: Vec<u8>) -> StorageResult<String> {
        let key = thumbnail_key(video_id);
        self.upload_bytes(bytes, &key, "image/jpeg").await?;
        Ok(key)
    }

    /// Deletes every object under a video's prefix (all qualities,
    /// manifests, and the thumbnail).
    pub async fn delete_video_files(&self, video_id: VideoId) -> StorageResult<u32> {
        let prefix = format!("{video_id}/");
        let objects = self.list_objects(&prefix).await?;

        if objects.is_empty() {
            info!(%video_id, "no storage objects found to delete");
            return Ok(0);
        }

        let keys: Vec<_> = objects.into_iter().map(|o| o.key).collect();
        self.delete_objects(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_gets_no_cache() {
        let (content_type, cache_control) = content_headers_for_path("index.m3u8");
        assert_eq!(content_type, "application/vnd.apple.mpegurl");
        assert_eq!(cache_control, "no-cache");
    }

    #[test]
    fn ts_segment_gets_long_lived_cache() {
        let (content_type, cache_control) = content_headers_for_path("seg-00012.ts");
        assert_eq!(content_type, "video/mp2t");
        assert_eq!(cache_control, "public, max-age=31536000");
    }

    #[test]
    fn cmaf_segment_and_init_get_long_lived_cache() {
        let (content_type, _) = content_headers_for_path("seg-00012.m4s");
        assert_eq!(content_type, "video/iso.segment");
        let (content_type, _) = content_headers_for_path("init.mp4");
        assert_eq!(content_type, "video/mp4");
    }

    #[test]
    fn thumbnail_gets_short_revalidating_cache() {
        let (content_type, cache_control) = content_headers_for_path("thumbnail.jpg");
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(cache_control, "max-age=60, must-revalidate");
    }

    #[test]
    fn segment_key_is_namespaced_by_video_and_quality() {
        let video_id = VideoId::new();
        let key = segment_key(video_id, Quality::P720, "seg-00001.ts");
        assert_eq!(key, format!("{video_id}/720p/seg-00001.ts"));
    }
}
