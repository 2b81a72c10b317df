use anisync_core::{FavoriteEntry, HistoryEntry, ReleaseDetails, ReleaseId};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Duration;

use crate::api::{AnalyticsSink, CatalogApi, MediaSource};
use crate::error::ApiError;
use crate::types::{
    self, AnalyticsEvent, AnalyticsUpload, CatalogPage, FavoriteAck, FavoriteAckResponse,
    FavoriteUpload, HistoryAck, HistoryAckResponse, HistoryUpload, PageResponse, ReleaseDto,
};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the content API.
///
/// Stateless apart from the connection pool: every call is an independent
/// request with its own timeout.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("anisync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(format!("failed to build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a response body, classifying non-success statuses.
    async fn read_body(resp: reqwest::Response) -> Result<String, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, ApiError> {
        let resp = self.http.get(self.url(path)).query(query).send().await?;
        let text = Self::read_body(resp).await?;
        types::decode(&text, what)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, ApiError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::read_body(resp).await
    }

    /// Fetch one catalog page.
    pub async fn get_page(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<CatalogPage, ApiError> {
        let mut query = vec![("limit", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let resp: PageResponse = self.get_json("/releases", &query, "release page").await?;
        let page = CatalogPage::try_from(resp)?;
        log::debug!(
            "Fetched {} releases (cursor {:?}, next {:?})",
            page.releases.len(),
            cursor,
            page.next
        );
        Ok(page)
    }

    /// Fetch a single release with its details.
    pub async fn get_details(&self, id: ReleaseId) -> Result<ReleaseDetails, ApiError> {
        let dto: ReleaseDto = self
            .get_json(&format!("/releases/{id}"), &[], "release details")
            .await?;
        if dto.id != id {
            return Err(ApiError::protocol(format!(
                "asked for release {id}, got {}",
                dto.id
            )));
        }
        ReleaseDetails::try_from(dto)
    }

    pub async fn upload_history(&self, entries: &[HistoryEntry]) -> Result<Vec<HistoryAck>, ApiError> {
        let body: Vec<HistoryUpload> = entries.iter().map(HistoryUpload::from).collect();
        let text = self.post_json("/history", &body).await?;
        let resp: HistoryAckResponse = types::decode(&text, "history acknowledgment")?;
        Ok(resp.results)
    }

    pub async fn upload_favorites(
        &self,
        entries: &[FavoriteEntry],
    ) -> Result<Vec<FavoriteAck>, ApiError> {
        let body: Vec<FavoriteUpload> = entries.iter().map(FavoriteUpload::from).collect();
        let text = self.post_json("/favorites", &body).await?;
        let resp: FavoriteAckResponse = types::decode(&text, "favorites acknowledgment")?;
        Ok(resp.results)
    }

    pub async fn upload_analytics(&self, events: &[AnalyticsEvent]) -> Result<(), ApiError> {
        self.post_json("/analytics", &AnalyticsUpload { events }).await?;
        Ok(())
    }

    /// Download a media file from an absolute URL.
    pub async fn download_media(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl CatalogApi for ApiClient {
    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a str>,
        page_size: usize,
    ) -> BoxFuture<'a, Result<CatalogPage, ApiError>> {
        self.get_page(cursor, page_size).boxed()
    }

    fn fetch_details(&self, id: ReleaseId) -> BoxFuture<'_, Result<ReleaseDetails, ApiError>> {
        self.get_details(id).boxed()
    }

    fn push_history<'a>(
        &'a self,
        entries: &'a [HistoryEntry],
    ) -> BoxFuture<'a, Result<Vec<HistoryAck>, ApiError>> {
        self.upload_history(entries).boxed()
    }

    fn push_favorites<'a>(
        &'a self,
        entries: &'a [FavoriteEntry],
    ) -> BoxFuture<'a, Result<Vec<FavoriteAck>, ApiError>> {
        self.upload_favorites(entries).boxed()
    }
}

impl MediaSource for ApiClient {
    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ApiError>> {
        self.download_media(url).boxed()
    }
}

impl AnalyticsSink for ApiClient {
    fn send_events<'a>(
        &'a self,
        events: &'a [AnalyticsEvent],
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        self.upload_analytics(events).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("https://api.example.org/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.org");
        assert_eq!(client.url("/releases"), "https://api.example.org/releases");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        // Port 9 (discard) on localhost is closed on test machines.
        let client =
            ApiClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.get_page(None, 10).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
        assert!(err.is_retryable());
    }
}
