//! S3-compatible object storage client (Cloudflare R2 in production).
//!
//! This crate provides:
//! - Segment/playlist/thumbnail upload and cleanup for the Segment Pipeline
//! - Range-read support for HLS/CMAF static serving
//! - Content-type and cache-control resolution per the static-serving contract

pub mod client;
pub mod error;
pub mod operations;

pub use client::{ObjectInfo, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use operations::{content_headers_for_path, playlist_key, segment_key, thumbnail_key};
