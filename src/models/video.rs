//! Video media descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requested download quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    #[default]
    Auto,
    Hd,
    Sd,
}

impl VideoQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Hd => "hd",
            Self::Sd => "sd",
        }
    }
}

/// Media URLs found in a video's `video` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadUrls {
    pub with_watermark: Option<String>,
    pub without_watermark: Option<String>,
    pub hd_url: Option<String>,
    pub sd_url: Option<String>,
    pub auto_url: Option<String>,
}

impl DownloadUrls {
    /// Read the URLs out of a video item (`itemStruct`)
    ///
    /// Bitrate variants are sorted by their gear name; without any variant the
    /// auto URL falls back to `playAddr`, then `downloadAddr`.
    pub fn from_video(item: &Value) -> Self {
        let video = &item["video"];
        let play_addr = non_empty(&video["playAddr"]);
        let download_addr = non_empty(&video["downloadAddr"]);

        let mut urls = Self::default();
        for variant in bitrate_variants(video) {
            let gear = variant["GearName"].as_str().unwrap_or_default().to_lowercase();
            let Some(url) = non_empty(&variant["PlayAddr"]["UrlList"][0]) else {
                continue;
            };

            if gear.contains("hd") || gear.contains("high") {
                urls.hd_url = Some(url);
            } else if gear.contains("sd") || gear.contains("standard") {
                urls.sd_url = Some(url);
            } else {
                urls.auto_url = Some(url);
            }
        }

        if urls.hd_url.is_none() && urls.sd_url.is_none() && urls.auto_url.is_none() {
            urls.auto_url = play_addr.clone().or_else(|| download_addr.clone());
        }

        urls.with_watermark = play_addr.or_else(|| urls.auto_url.clone());
        urls.without_watermark = download_addr.or_else(|| urls.auto_url.clone());
        urls
    }

    /// Best URL for the given preferences
    pub fn pick(&self, quality: VideoQuality, watermark: bool) -> Option<&str> {
        let preferred = if watermark {
            self.with_watermark.as_ref()
        } else {
            match quality {
                VideoQuality::Hd => self.hd_url.as_ref(),
                VideoQuality::Sd => self.sd_url.as_ref(),
                VideoQuality::Auto => None,
            }
        };

        preferred
            .or(self.auto_url.as_ref())
            .or(self.without_watermark.as_ref())
            .or(self.with_watermark.as_ref())
            .map(String::as_str)
    }
}

/// Download metadata for one video
#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub video_id: String,
    pub download_urls: DownloadUrls,
    pub quality: VideoQuality,
    pub watermark: bool,
    /// Size in bytes of the picked variant, when the platform reports it
    pub file_size: Option<u64>,
    /// Duration in seconds
    pub duration: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl DownloadInfo {
    pub fn from_video(video_id: &str, item: &Value, quality: VideoQuality, watermark: bool) -> Self {
        let download_urls = DownloadUrls::from_video(item);
        let file_size = download_urls
            .pick(quality, watermark)
            .and_then(|url| variant_size(item, url));

        Self {
            video_id: video_id.to_string(),
            download_urls,
            quality,
            watermark,
            file_size,
            duration: item["video"]["duration"].as_u64(),
            timestamp: Utc::now(),
        }
    }
}

fn bitrate_variants(video: &Value) -> &[Value] {
    video["bitrateInfo"].as_array().map(Vec::as_slice).unwrap_or_default()
}

fn variant_size(item: &Value, url: &str) -> Option<u64> {
    bitrate_variants(&item["video"])
        .iter()
        .find(|v| v["PlayAddr"]["UrlList"][0].as_str() == Some(url))
        .and_then(|v| v["PlayAddr"]["DataSize"].as_u64())
}

fn non_empty(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}
