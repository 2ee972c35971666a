use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    entities::film,
    error::{SkipReason, SyncResult},
    legacy::{BatchLoader, FileSink},
    models::{EntityKind, FilmDetail},
    reconciler,
    retry::RetryPolicy,
    scanner,
    scheduler::{Cadence, Schedule, SyncJob},
    tmdb::MetadataSource,
    writer::{self, UnitOfWork},
};

/// Number of ranks kept by the trending pass.
pub const TRENDING_SIZE: i32 = 10;

/// What every pass needs to talk to the provider.
pub struct SyncContext {
    pub source: Arc<dyn MetadataSource>,
    pub retry: RetryPolicy,
    pub image_base_url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedItem {
    pub tmdb_id: i32,
    pub reason: SkipReason,
}

/// Outcome of one pass: item counts plus every skip with its reason.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PassReport {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub deleted: u64,
    pub skips: Vec<SkippedItem>,
}

impl PassReport {
    pub fn record<T>(&mut self, tmdb_id: i32, outcome: Result<T, SkipReason>) -> Option<T> {
        match outcome {
            Ok(value) => {
                self.processed += 1;
                Some(value)
            },
            Err(reason) => {
                warn!(tmdb_id, reason = %reason, "skipping item");
                if reason.is_error() {
                    self.errored += 1;
                } else {
                    self.skipped += 1;
                }
                self.skips.push(SkippedItem { tmdb_id, reason });
                None
            },
        }
    }
}

/// Shared state for all catalog passes. With a sink configured, film and
/// celebrity passes write documents instead of touching the store.
pub struct CatalogSync {
    pub ctx: SyncContext,
    pub db: DatabaseConnection,
    pub sink: Option<FileSink>,
    pub loader: Option<BatchLoader>,
}

impl CatalogSync {
    pub async fn film_pass(&self) -> SyncResult<PassReport> {
        let changes = scanner::scan(&self.ctx, EntityKind::Movie).await?;
        info!(to_delete = changes.to_delete.len(), to_update = changes.to_update.len(), "film changes scanned");

        let mut report = PassReport::default();
        report.deleted = self.delete(EntityKind::Movie, &changes.to_delete).await?;

        for tmdb_id in changes.to_update {
            let outcome = sync_film(&self.ctx, &self.db, self.sink.as_ref(), tmdb_id).await;
            report.record(tmdb_id, outcome);
        }

        Ok(report)
    }

    pub async fn celebrity_pass(&self) -> SyncResult<PassReport> {
        let changes = scanner::scan(&self.ctx, EntityKind::Person).await?;
        info!(to_delete = changes.to_delete.len(), to_update = changes.to_update.len(), "celebrity changes scanned");

        let mut report = PassReport::default();
        report.deleted = self.delete(EntityKind::Person, &changes.to_delete).await?;

        for tmdb_id in changes.to_update {
            let outcome = sync_celebrity(&self.ctx, &self.db, self.sink.as_ref(), tmdb_id).await;
            report.record(tmdb_id, outcome);
        }

        Ok(report)
    }

    /// Syncs trending films in provider order until [`TRENDING_SIZE`] ranks
    /// are filled, then replaces the stored ranking.
    pub async fn trending_pass(&self) -> SyncResult<PassReport> {
        let mut report = PassReport::default();
        let mut ranked = Vec::new();
        let mut rank = 1;
        let mut page = 1;

        while rank <= TRENDING_SIZE {
            let resp = self
                .ctx
                .retry
                .call("trending page", || self.ctx.source.trending_page(page))
                .await?;
            if resp.results.is_empty() {
                break;
            }

            for entry in resp.results {
                if rank > TRENDING_SIZE {
                    break;
                }
                let outcome = sync_film(&self.ctx, &self.db, None, entry.id).await;
                if let Some(Some(film)) = report.record(entry.id, outcome) {
                    ranked.push((film.id, rank));
                    rank += 1;
                }
            }

            if page >= resp.total_pages {
                break;
            }
            page += 1;
        }

        if ranked.is_empty() {
            warn!("no trending film could be synced, keeping the previous ranking");
            return Ok(report);
        }

        writer::apply_trending(&mut UnitOfWork::new(&self.db), &ranked).await?;
        info!(ranks = ranked.len(), "trending replaced");
        Ok(report)
    }

    pub async fn country_pass(&self) -> SyncResult<PassReport> {
        let countries = self.ctx.retry.call("countries", || self.ctx.source.countries()).await?;
        let mut report = PassReport::default();
        report.processed = countries.len();

        writer::apply_countries(&mut UnitOfWork::new(&self.db), countries).await?;
        info!(countries = report.processed, "countries replaced");
        Ok(report)
    }

    pub async fn legacy_import_pass(&self) -> SyncResult<PassReport> {
        let Some(loader) = &self.loader else {
            debug!("legacy import not configured");
            return Ok(PassReport::default());
        };
        let loaded = loader.load(&self.db).await?;
        Ok(PassReport {
            processed: loaded.loaded,
            skipped: loaded.unresolved,
            errored: loaded.malformed,
            ..Default::default()
        })
    }

    async fn delete(&self, kind: EntityKind, ids: &BTreeSet<i32>) -> SyncResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i32> = ids.iter().copied().collect();
        let mut uow = UnitOfWork::new(&self.db);
        let deleted = uow.delete_by_ids(kind, &ids).await?;
        uow.commit().await?;
        info!(kind = kind.as_path(), requested = ids.len(), deleted, "soft-deleted removed entities");
        Ok(deleted)
    }
}

/// Fetches, reconciles and persists one film. Returns the stored film, or
/// `None` when the film went to the file sink.
pub async fn sync_film(
    ctx: &SyncContext,
    db: &DatabaseConnection,
    sink: Option<&FileSink>,
    tmdb_id: i32,
) -> Result<Option<film::Model>, SkipReason> {
    let detail = ctx.retry.call("film detail", || ctx.source.film_detail(tmdb_id)).await?;

    let mut uow = UnitOfWork::new(db);
    let known: HashSet<i32> = uow
        .celebrities_by_ids(&referenced_people(&detail))
        .await?
        .into_iter()
        .map(|c| c.tmdb_id)
        .collect();

    let reconciled = reconciler::reconcile_film(ctx, detail, &known).await?;
    debug!(
        tmdb_id,
        credits = reconciled.credits.len(),
        new_celebrities = reconciled.new_celebrities.len(),
        dropped = reconciled.dropped.len(),
        "film reconciled"
    );

    if let Some(sink) = sink {
        sink.write_film(&reconciled).await?;
        return Ok(None);
    }

    let existing = uow.films_by_ids(&[reconciled.film.tmdb_id]).await?.pop();
    let film = writer::apply_film(&mut uow, reconciled, existing).await?;
    Ok(Some(film))
}

pub async fn sync_celebrity(
    ctx: &SyncContext,
    db: &DatabaseConnection,
    sink: Option<&FileSink>,
    tmdb_id: i32,
) -> Result<(), SkipReason> {
    let detail = ctx.retry.call("celebrity detail", || ctx.source.celebrity_detail(tmdb_id)).await?;
    let draft = reconciler::reconcile_celebrity(detail, &ctx.image_base_url)?;

    match sink {
        Some(sink) => sink.write_celebrity(&draft).await?,
        None => {
            writer::apply_celebrity(&mut UnitOfWork::new(db), &draft).await?;
        },
    }
    Ok(())
}

fn referenced_people(detail: &FilmDetail) -> Vec<i32> {
    let cast = detail.credits.cast.iter().filter_map(|m| m.id);
    let crew = detail.credits.crew.iter().filter_map(|m| m.id);
    let mut ids: Vec<i32> = cast.chain(crew).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Films,
    Celebrities,
    Trending,
    Countries,
    LegacyImport,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::Films => "film-sync",
            JobKind::Celebrities => "celebrity-sync",
            JobKind::Trending => "trending-sync",
            JobKind::Countries => "country-sync",
            JobKind::LegacyImport => "legacy-import",
        }
    }

    pub fn cadence(self) -> Cadence {
        match self {
            JobKind::Countries => Cadence::MONTHLY,
            _ => Cadence::DAILY,
        }
    }
}

pub struct CatalogJob {
    kind: JobKind,
    at: jiff::civil::Time,
    sync: Arc<CatalogSync>,
}

impl CatalogJob {
    pub fn new(kind: JobKind, at: jiff::civil::Time, sync: Arc<CatalogSync>) -> Self {
        Self { kind, at, sync }
    }
}

#[async_trait]
impl SyncJob for CatalogJob {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn schedule(&self) -> Schedule {
        Schedule { at: self.at, cadence: self.kind.cadence() }
    }

    async fn run_pass(&self) -> SyncResult<PassReport> {
        match self.kind {
            JobKind::Films => self.sync.film_pass().await,
            JobKind::Celebrities => self.sync.celebrity_pass().await,
            JobKind::Trending => self.sync.trending_pass().await,
            JobKind::Countries => self.sync.country_pass().await,
            JobKind::LegacyImport => self.sync.legacy_import_pass().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

    use super::*;
    use crate::{
        entities::{celebrity, celebrity_credit, country, trending},
        legacy::LegacyDirs,
        models::{CountryDetail, Role},
        testing::{
            FakeSource, cast, celebrity_detail, changes, crew, film_detail, test_context, test_db,
            trending as trending_page,
        },
    };

    async fn catalog(source: FakeSource) -> CatalogSync {
        CatalogSync { ctx: test_context(source), db: test_db().await, sink: None, loader: None }
    }

    fn casted_film(id: i32) -> FilmDetail {
        let mut detail = film_detail(id);
        detail.credits.cast = vec![cast(100, "Lead", 0), cast(101, "Support", 1)];
        detail.credits.crew = vec![
            crew(100, "Director"),
            crew(102, "Gaffer"),
            crew(103, "Original Music Composer"),
        ];
        detail
    }

    fn people(source: FakeSource) -> FakeSource {
        source
            .with_celebrity(celebrity_detail(100, "Lead"))
            .with_celebrity(celebrity_detail(101, "Support"))
            .with_celebrity(celebrity_detail(103, "Composer"))
    }

    #[tokio::test]
    async fn film_pass_reports_per_item_outcomes() {
        let mut nameless = film_detail(3);
        nameless.id = None;
        let source = people(FakeSource::default())
            .with_change_pages(
                EntityKind::Movie,
                vec![changes(
                    &[(1, Some(false)), (2, Some(false)), (3, Some(false)), (4, Some(true))],
                    1,
                )],
            )
            .with_film(casted_film(1))
            .with_film_at(3, nameless);
        let sync = catalog(source.clone()).await;

        let report = sync.film_pass().await.unwrap();

        assert_eq!((report.processed, report.skipped, report.errored), (1, 1, 1));
        assert!(matches!(
            report.skips[0],
            SkippedItem { tmdb_id: 2, reason: SkipReason::FetchFailed(_) }
        ));
        assert!(matches!(report.skips[1].reason, SkipReason::MissingExternalId("film")));
        assert_eq!(source.film_fetches(4), 0);

        let film = film::Entity::find().one(&sync.db).await.unwrap().unwrap();
        let roles: Vec<_> = celebrity_credit::Entity::find()
            .filter(celebrity_credit::Column::FilmId.eq(film.id))
            .order_by_asc(celebrity_credit::Column::Id)
            .all(&sync.db)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|c| Role::from_code(c.role))
            .collect();
        assert_eq!(roles, vec![Role::Actor, Role::Actor, Role::Director, Role::Composer]);
        assert_eq!(source.celebrity_fetches(102), 0);
    }

    #[tokio::test]
    async fn second_pass_reuses_people_and_replaces_credits() {
        let source = people(FakeSource::default())
            .with_change_pages(EntityKind::Movie, vec![changes(&[(1, Some(false))], 1)])
            .with_film(casted_film(1));
        let sync = catalog(source.clone()).await;

        sync.film_pass().await.unwrap();
        sync.film_pass().await.unwrap();

        assert_eq!(source.celebrity_fetches(100), 1);
        assert_eq!(celebrity::Entity::find().count(&sync.db).await.unwrap(), 3);
        assert_eq!(celebrity_credit::Entity::find().count(&sync.db).await.unwrap(), 4);
        assert_eq!(film::Entity::find().count(&sync.db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn removed_films_are_soft_deleted_before_updates() {
        let source = people(FakeSource::default())
            .with_change_pages(EntityKind::Movie, vec![changes(&[(1, Some(false))], 1)])
            .with_film(casted_film(1));
        let sync = catalog(source).await;
        sync.film_pass().await.unwrap();

        let removal = FakeSource::default()
            .with_change_pages(EntityKind::Movie, vec![changes(&[(1, None), (2, None)], 1)]);
        let sync = CatalogSync { ctx: test_context(removal), ..sync };
        let report = sync.film_pass().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.processed, 0);
        let film = film::Entity::find().one(&sync.db).await.unwrap().unwrap();
        assert!(film.is_deleted);
    }

    #[tokio::test]
    async fn broken_change_feed_fails_the_pass() {
        let sync = catalog(FakeSource::default()).await;
        assert!(sync.film_pass().await.is_err());
    }

    #[tokio::test]
    async fn trending_keeps_the_first_ten_ranks() {
        let mut source = FakeSource::default().with_trending(vec![trending_page(1..=15, 1)]);
        for id in 1..=15 {
            source = source.with_film(film_detail(id));
        }
        let sync = catalog(source.clone()).await;

        let mut uow = UnitOfWork::new(&sync.db);
        let stale = writer::apply_film(
            &mut uow,
            reconciler::ReconciledFilm {
                film: reconciler::FilmDraft {
                    tmdb_id: 500,
                    title: "Old".into(),
                    original_title: None,
                    synopsis: "s".into(),
                    poster_path: None,
                    backdrop_path: None,
                    runtime_minutes: 0,
                    release_year: 0,
                    genres: vec![],
                    production_countries: vec![],
                    collection_posters: None,
                },
                new_celebrities: vec![],
                credits: vec![],
                dropped: vec![],
            },
            None,
        )
        .await
        .unwrap();
        writer::apply_trending(&mut uow, &[(stale.id, 1)]).await.unwrap();

        let report = sync.trending_pass().await.unwrap();

        assert_eq!(report.processed, 10);
        let rows = trending::Entity::find()
            .order_by_asc(trending::Column::Rank)
            .all(&sync.db)
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.rank).collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
        assert!(rows.iter().all(|r| r.film_id != stale.id));
        assert_eq!(source.film_fetches(10), 1);
        assert_eq!(source.film_fetches(11), 0);
    }

    #[tokio::test]
    async fn trending_stops_paging_once_ranks_are_full() {
        let mut source = FakeSource::default().with_trending(vec![
            trending_page(1..=10, 3),
            trending_page(11..=20, 3),
            trending_page(21..=30, 3),
        ]);
        for id in 1..=10 {
            source = source.with_film(film_detail(id));
        }
        let sync = catalog(source.clone()).await;

        let report = sync.trending_pass().await.unwrap();

        assert_eq!(report.processed, 10);
        assert_eq!(source.requested_trending(), vec![1]);
    }

    #[tokio::test]
    async fn trending_skips_failed_films_without_losing_a_rank() {
        let mut source = FakeSource::default()
            .with_trending(vec![trending_page([1, 999, 2], 2), trending_page([3], 2)]);
        for id in 1..=3 {
            source = source.with_film(film_detail(id));
        }
        let sync = catalog(source).await;

        let report = sync.trending_pass().await.unwrap();

        assert_eq!((report.processed, report.skipped), (3, 1));
        let rows = trending::Entity::find()
            .order_by_asc(trending::Column::Rank)
            .all(&sync.db)
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn celebrity_pass_creates_and_deletes() {
        let source = FakeSource::default()
            .with_change_pages(
                EntityKind::Person,
                vec![
                    changes(&[(100, Some(false)), (101, Some(false))], 2),
                    changes(&[(100, None)], 2),
                ],
            )
            .with_celebrity(celebrity_detail(100, "Lead"))
            .with_celebrity(celebrity_detail(101, "Support"));
        let sync = catalog(source).await;

        let report = sync.celebrity_pass().await.unwrap();

        // 100 is both updated and flagged; removal runs first, the update revives it
        assert_eq!(report.processed, 2);
        let stored = celebrity::Entity::find().all(&sync.db).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|c| !c.is_deleted));
    }

    #[tokio::test]
    async fn country_pass_replaces_the_list() {
        let source = FakeSource::default().with_countries(vec![
            CountryDetail { iso_3166_1: "FR".into(), english_name: "France".into() },
            CountryDetail { iso_3166_1: "JP".into(), english_name: "Japan".into() },
        ]);
        let sync = catalog(source).await;

        let report = sync.country_pass().await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(country::Entity::find().count(&sync.db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn file_mode_writes_documents_for_the_loader() {
        let root = tempfile::tempdir().unwrap();
        let dirs = LegacyDirs {
            films: root.path().join("films"),
            celebrities: root.path().join("celebrities"),
            credits: root.path().join("credits"),
        };
        let source = people(FakeSource::default())
            .with_change_pages(EntityKind::Movie, vec![changes(&[(1, Some(false))], 1)])
            .with_film(casted_film(1));
        let sync = CatalogSync {
            sink: Some(FileSink::new(dirs.clone())),
            loader: Some(BatchLoader::new(dirs.clone(), 50)),
            ..catalog(source).await
        };

        let report = sync.film_pass().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(film::Entity::find().count(&sync.db).await.unwrap(), 0);
        assert!(dirs.films.join("film-1.json").exists());

        let imported = sync.legacy_import_pass().await.unwrap();
        assert_eq!(imported.errored, 0);
        assert_eq!(film::Entity::find().count(&sync.db).await.unwrap(), 1);
        assert_eq!(celebrity_credit::Entity::find().count(&sync.db).await.unwrap(), 4);
    }
}
