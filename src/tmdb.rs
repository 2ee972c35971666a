use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::de::DeserializeOwned;
use tracing::debug;
use wreq::header::{AUTHORIZATION, USER_AGENT};

use crate::{
    error::SyncResult,
    models::{
        CREW_JOB_WHITELIST, CelebrityDetail, ChangesPage, CollectionDetail, CountryDetail,
        EntityKind, FilmDetail, TrendingPage,
    },
};

/// Cast members kept per film, lowest billing order first.
pub const MAX_CAST: usize = 50;

/// Read-only view of the metadata provider. Implementations return details
/// already shaped by [`shape_film_detail`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn changes_page(&self, kind: EntityKind, page: u32) -> SyncResult<ChangesPage>;
    async fn film_detail(&self, tmdb_id: i32) -> SyncResult<FilmDetail>;
    async fn celebrity_detail(&self, tmdb_id: i32) -> SyncResult<CelebrityDetail>;
    async fn collection_detail(&self, collection_id: i32) -> SyncResult<CollectionDetail>;
    async fn countries(&self) -> SyncResult<Vec<CountryDetail>>;
    async fn trending_page(&self, page: u32) -> SyncResult<TrendingPage>;
}

pub struct TmdbClient {
    client: wreq::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: wreq::Client, access_token: String, base_url: String, rps: u32) -> Self {
        let rps = NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, access_token, base_url, limiter }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SyncResult<T> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        debug!(url = %url, "tmdb request");

        let body = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(USER_AGENT, "cinesync/0.1")
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn changes_page(&self, kind: EntityKind, page: u32) -> SyncResult<ChangesPage> {
        self.get(&format!("{}/changes", kind.as_path()), &[("page", page.to_string())]).await
    }

    async fn film_detail(&self, tmdb_id: i32) -> SyncResult<FilmDetail> {
        let detail: FilmDetail = self
            .get(&format!("movie/{tmdb_id}"), &[("append_to_response", "credits".to_string())])
            .await?;
        Ok(shape_film_detail(detail))
    }

    async fn celebrity_detail(&self, tmdb_id: i32) -> SyncResult<CelebrityDetail> {
        self.get(&format!("person/{tmdb_id}"), &[]).await
    }

    async fn collection_detail(&self, collection_id: i32) -> SyncResult<CollectionDetail> {
        self.get(&format!("collection/{collection_id}"), &[]).await
    }

    async fn countries(&self) -> SyncResult<Vec<CountryDetail>> {
        self.get("configuration/countries", &[("language", "en-US".to_string())]).await
    }

    async fn trending_page(&self, page: u32) -> SyncResult<TrendingPage> {
        self.get("trending/movie/day", &[("page", page.to_string())]).await
    }
}

/// Truncates the cast to the [`MAX_CAST`] lowest billing orders (stable, so
/// provider order breaks ties) and drops crew outside the job whitelist.
pub fn shape_film_detail(mut detail: FilmDetail) -> FilmDetail {
    let credits = &mut detail.credits;

    if credits.cast.len() > MAX_CAST {
        credits.cast.sort_by_key(|member| member.order.unwrap_or(i32::MAX));
        credits.cast.truncate(MAX_CAST);
    }

    credits.crew.retain(|member| is_whitelisted_job(&member.job));
    detail
}

pub fn is_whitelisted_job(job: &str) -> bool {
    let job = job.trim();
    CREW_JOB_WHITELIST.iter().any(|allowed| allowed.eq_ignore_ascii_case(job))
}
