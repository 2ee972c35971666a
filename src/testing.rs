//! Fakes shared by unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::{
    error::{SyncError, SyncResult},
    jobs::SyncContext,
    models::{
        CastMember, CelebrityDetail, ChangeEntry, ChangesPage, CollectionDetail, CountryDetail,
        CrewMember, EntityKind, FilmDetail, TrendingEntry, TrendingPage,
    },
    retry::RetryPolicy,
    tmdb::{MetadataSource, shape_film_detail},
};

pub const IMAGE_BASE: &str = "https://img.test";

#[derive(Default)]
struct FakeState {
    change_pages: HashMap<EntityKind, Vec<ChangesPage>>,
    films: HashMap<i32, FilmDetail>,
    celebrities: HashMap<i32, CelebrityDetail>,
    collections: HashMap<i32, CollectionDetail>,
    countries: Vec<CountryDetail>,
    trending: Vec<TrendingPage>,
    requested_pages: Vec<(EntityKind, u32)>,
    requested_trending: Vec<u32>,
    celebrity_fetches: HashMap<i32, u32>,
    film_fetches: HashMap<i32, u32>,
}

/// In-memory provider. Unknown ids fail like a 404 would. Clones share state.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    pub fn with_change_pages(self, kind: EntityKind, pages: Vec<ChangesPage>) -> Self {
        self.state.lock().unwrap().change_pages.insert(kind, pages);
        self
    }

    pub fn with_film(self, detail: FilmDetail) -> Self {
        let id = detail.id.unwrap_or_default();
        self.state.lock().unwrap().films.insert(id, detail);
        self
    }

    /// Registers a film under an explicit id, for details missing their own.
    pub fn with_film_at(self, id: i32, detail: FilmDetail) -> Self {
        self.state.lock().unwrap().films.insert(id, detail);
        self
    }

    pub fn with_celebrity(self, detail: CelebrityDetail) -> Self {
        let id = detail.id.unwrap_or_default();
        self.state.lock().unwrap().celebrities.insert(id, detail);
        self
    }

    pub fn with_collection(self, detail: CollectionDetail) -> Self {
        self.state.lock().unwrap().collections.insert(detail.id, detail);
        self
    }

    pub fn with_countries(self, countries: Vec<CountryDetail>) -> Self {
        self.state.lock().unwrap().countries = countries;
        self
    }

    pub fn with_trending(self, pages: Vec<TrendingPage>) -> Self {
        self.state.lock().unwrap().trending = pages;
        self
    }

    pub fn requested_pages(&self) -> Vec<(EntityKind, u32)> {
        self.state.lock().unwrap().requested_pages.clone()
    }

    pub fn requested_trending(&self) -> Vec<u32> {
        self.state.lock().unwrap().requested_trending.clone()
    }

    pub fn celebrity_fetches(&self, id: i32) -> u32 {
        self.state.lock().unwrap().celebrity_fetches.get(&id).copied().unwrap_or(0)
    }

    pub fn film_fetches(&self, id: i32) -> u32 {
        self.state.lock().unwrap().film_fetches.get(&id).copied().unwrap_or(0)
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> SyncError {
    SyncError::Fetch(format!("404 Not Found: {what} {id}"))
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn changes_page(&self, kind: EntityKind, page: u32) -> SyncResult<ChangesPage> {
        let mut state = self.state.lock().unwrap();
        state.requested_pages.push((kind, page));
        state
            .change_pages
            .get(&kind)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .ok_or_else(|| not_found("changes page", page))
    }

    async fn film_detail(&self, tmdb_id: i32) -> SyncResult<FilmDetail> {
        let mut state = self.state.lock().unwrap();
        *state.film_fetches.entry(tmdb_id).or_default() += 1;
        let detail = state.films.get(&tmdb_id).cloned().ok_or_else(|| not_found("movie", tmdb_id))?;
        Ok(shape_film_detail(detail))
    }

    async fn celebrity_detail(&self, tmdb_id: i32) -> SyncResult<CelebrityDetail> {
        let mut state = self.state.lock().unwrap();
        *state.celebrity_fetches.entry(tmdb_id).or_default() += 1;
        state.celebrities.get(&tmdb_id).cloned().ok_or_else(|| not_found("person", tmdb_id))
    }

    async fn collection_detail(&self, collection_id: i32) -> SyncResult<CollectionDetail> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(&collection_id)
            .cloned()
            .ok_or_else(|| not_found("collection", collection_id))
    }

    async fn countries(&self) -> SyncResult<Vec<CountryDetail>> {
        Ok(self.state.lock().unwrap().countries.clone())
    }

    async fn trending_page(&self, page: u32) -> SyncResult<TrendingPage> {
        let mut state = self.state.lock().unwrap();
        state.requested_trending.push(page);
        state
            .trending
            .get(page as usize - 1)
            .cloned()
            .ok_or_else(|| not_found("trending page", page))
    }
}

pub fn test_context(source: FakeSource) -> SyncContext {
    SyncContext {
        source: Arc::new(source),
        retry: RetryPolicy::new(3, Duration::ZERO),
        image_base_url: IMAGE_BASE.to_string(),
    }
}

pub async fn test_db() -> DatabaseConnection {
    crate::db::connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}

pub fn changes(entries: &[(i32, Option<bool>)], total_pages: u32) -> ChangesPage {
    ChangesPage {
        results: entries.iter().map(|&(id, adult)| ChangeEntry { id, adult }).collect(),
        total_pages,
    }
}

pub fn trending(ids: impl IntoIterator<Item = i32>, total_pages: u32) -> TrendingPage {
    TrendingPage { results: ids.into_iter().map(|id| TrendingEntry { id }).collect(), total_pages }
}

pub fn film_detail(id: i32) -> FilmDetail {
    FilmDetail {
        id: Some(id),
        title: Some(format!("Film {id}")),
        original_title: Some(format!("Film {id}")),
        overview: Some(format!("Synopsis of film {id}")),
        poster_path: Some(format!("/poster-{id}.jpg")),
        backdrop_path: None,
        runtime: Some(100),
        release_date: Some("2020-01-01".to_string()),
        ..Default::default()
    }
}

pub fn celebrity_detail(id: i32, name: &str) -> CelebrityDetail {
    CelebrityDetail {
        id: Some(id),
        name: Some(name.to_string()),
        biography: Some(format!("Biography of {name}")),
        profile_path: Some(format!("/profile-{id}.jpg")),
    }
}

pub fn cast(id: i32, character: &str, order: i32) -> CastMember {
    CastMember { id: Some(id), character: Some(character.to_string()), order: Some(order) }
}

pub fn crew(id: i32, job: &str) -> CrewMember {
    CrewMember { id: Some(id), job: job.to_string() }
}
