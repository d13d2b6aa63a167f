//! Parses pixiv original-image URLs into `(illust_id, page_index, ext)`, a
//! direct port of `original_source/backend/app/core/pixiv_urls.py`. Used by
//! the import handler to seed `images` rows from a flat URL list.

use std::sync::LazyLock;

use regex::Regex;

pub const ALLOWED_IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixivOriginalUrl<'a> {
    pub illust_id: i64,
    pub page_index: i32,
    pub ext: &'a str,
}

static PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<illust_id>\d+)_p(?P<page_index>\d+)(?:_master1200)?\.(?P<ext>[A-Za-z0-9]+)$").unwrap());
static UGOIRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<illust_id>\d+)_ugoira(?P<page_index>\d+)\.(?P<ext>[A-Za-z0-9]+)$").unwrap());

/// `Owned` variant of `PixivOriginalUrl` so callers can hold it past the
/// input string's lifetime (the regex extension capture borrows it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPixivOriginalUrl {
    pub illust_id: i64,
    pub page_index: i32,
    pub ext: String,
}

pub fn parse_pixiv_original_url(url: &str) -> Result<OwnedPixivOriginalUrl, String> {
    let url = url.trim();
    if url.is_empty() {
        return Err("url is required".to_string());
    }

    let parsed = reqwest::Url::parse(url).map_err(|_| "unsupported pixiv original url".to_string())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err("unsupported scheme".to_string());
    }
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if !host.ends_with("pximg.net") {
        return Err("unsupported host".to_string());
    }

    let path = parsed.path();
    let caps = PAGE_RE.captures(path).or_else(|| UGOIRA_RE.captures(path));
    let Some(caps) = caps else {
        return Err("unsupported pixiv original url".to_string());
    };

    let illust_id: i64 = caps["illust_id"].parse().map_err(|_| "invalid illust_id".to_string())?;
    let page_index: i32 = caps["page_index"].parse().map_err(|_| "invalid page_index".to_string())?;
    let ext = caps["ext"].to_ascii_lowercase();
    if !ALLOWED_IMAGE_EXTS.contains(&ext.as_str()) {
        return Err("unsupported ext".to_string());
    }

    Ok(OwnedPixivOriginalUrl { illust_id, page_index, ext })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_standard_page_url() {
        let parsed = parse_pixiv_original_url(
            "https://i.pximg.net/img-original/img/2023/01/01/00/00/00/12345670_p0.jpg",
        )
        .unwrap();
        assert_eq!(parsed.illust_id, 12345670);
        assert_eq!(parsed.page_index, 0);
        assert_eq!(parsed.ext, "jpg");
    }

    #[test]
    fn rejects_a_non_pximg_host() {
        assert!(parse_pixiv_original_url("https://evil.example.com/12345670_p0.jpg").is_err());
    }

    #[test]
    fn rejects_an_unsupported_extension() {
        assert!(parse_pixiv_original_url("https://i.pximg.net/img-original/123_p0.svg").is_err());
    }
}
