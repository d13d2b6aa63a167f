//! Concrete `PixivAppClient`: issues the illustration-detail request
//! against the upstream app API and maps its response onto
//! `curator_handlers::pixiv_client::IllustMetadata`. The exact upstream
//! JSON shape is out of scope (§1 Non-goals); this reads the handful of
//! fields the store layer actually persists and treats anything else
//! as opaque.

use async_trait::async_trait;
use curator_handlers::pixiv_client::{IllustMetadata, PixivAppClient, PixivClientError};
use reqwest::Client;
use serde::Deserialize;

const ILLUST_DETAIL_URL: &str = "https://app-api.pixiv.net/v1/illust/detail";

pub struct HttpPixivAppClient {
    client: Client,
}

impl HttpPixivAppClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct IllustDetailResponse {
    illust: Option<IllustBody>,
}

#[derive(Debug, Deserialize)]
struct IllustBody {
    id: i64,
    width: i64,
    height: i64,
    #[serde(default)]
    x_restrict: i64,
    #[serde(rename = "illustAiType", default)]
    illust_ai_type: i64,
    #[serde(rename = "type")]
    illust_type_name: String,
    user: IllustUser,
    title: String,
    create_date: String,
    total_bookmarks: i64,
    total_view: i64,
    tags: IllustTags,
    meta_single_page: Option<MetaSinglePage>,
    meta_pages: Vec<MetaPage>,
}

#[derive(Debug, Deserialize)]
struct IllustUser {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct IllustTags {
    tags: Vec<IllustTag>,
}

#[derive(Debug, Deserialize)]
struct IllustTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MetaSinglePage {
    original_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaPage {
    image_urls: MetaPageUrls,
}

#[derive(Debug, Deserialize)]
struct MetaPageUrls {
    original: Option<String>,
}

fn illust_type_code(name: &str) -> i64 {
    match name {
        "manga" => 1,
        "ugoira" => 2,
        _ => 0,
    }
}

#[async_trait]
impl PixivAppClient for HttpPixivAppClient {
    async fn fetch_illust(&self, illust_id: i64, access_token: &str) -> Result<IllustMetadata, PixivClientError> {
        let response = self
            .client
            .get(ILLUST_DETAIL_URL)
            .query(&[("illust_id", illust_id.to_string())])
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| PixivClientError::RequestFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(PixivClientError::NotFound(illust_id));
        }
        if !response.status().is_success() {
            return Err(PixivClientError::RequestFailed(format!("status {}", response.status())));
        }

        let body: IllustDetailResponse = response
            .json()
            .await
            .map_err(|e| PixivClientError::RequestFailed(e.to_string()))?;
        let illust = body.illust.ok_or(PixivClientError::NotFound(illust_id))?;

        let fresh_original_url = illust
            .meta_single_page
            .and_then(|p| p.original_image_url)
            .or_else(|| illust.meta_pages.first().and_then(|p| p.image_urls.original.clone()));

        Ok(IllustMetadata {
            illust_id: illust.id,
            width: illust.width,
            height: illust.height,
            x_restrict: illust.x_restrict,
            ai_type: illust.illust_ai_type,
            illust_type: illust_type_code(&illust.illust_type_name),
            user_id: illust.user.id,
            user_name: illust.user.name,
            title: illust.title,
            created_at_pixiv: illust.create_date,
            bookmark_count: illust.total_bookmarks,
            view_count: illust.total_view,
            tags: illust.tags.tags.into_iter().map(|t| t.name).collect(),
            fresh_original_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illust_type_code_maps_friendly_names() {
        assert_eq!(illust_type_code("illust"), 0);
        assert_eq!(illust_type_code("manga"), 1);
        assert_eq!(illust_type_code("ugoira"), 2);
        assert_eq!(illust_type_code("unknown"), 0);
    }
}
