use url::Url;

/// Extract a video id from a canonical video URL or a bare numeric id
///
/// Accepts `https://www.tiktok.com/@user/video/<digits>` with or without the
/// scheme and `www.` prefix. Short links (`vm.tiktok.com`, `/t/...`) are not
/// resolved and yield `None`.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_numeric(input) {
        return Some(input.to_string());
    }

    let url = if input.contains("://") {
        Url::parse(input).ok()?
    } else {
        Url::parse(&format!("https://{}", input)).ok()?
    };

    let host = url.host_str()?;
    if host != "tiktok.com" && host != "www.tiktok.com" {
        return None;
    }

    let mut segments = url.path_segments()?;
    let user = segments.next()?;
    let kind = segments.next()?;
    let id = segments.next()?;

    (user.starts_with('@') && user.len() > 1 && kind == "video" && is_numeric(id))
        .then(|| id.to_string())
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
