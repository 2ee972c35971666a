use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait, sea_query::Expr,
};
use tracing::{debug, warn};

use crate::{
    entities::{celebrity, celebrity_credit, country, film, trending},
    error::SyncResult,
    models::{CountryDetail, EntityKind},
    reconciler::{CelebrityDraft, CreditDraft, FilmDraft, ReconciledFilm},
};

/// Keeps `IN (...)` lists well under SQLite's bound-variable limit.
const ID_CHUNK: usize = 500;

/// Explicit unit of work over the catalog store.
///
/// Reads go through the open transaction when there is one, otherwise
/// straight to the connection. Writes open a transaction lazily; `commit`
/// ends it. Dropping a unit of work with pending writes rolls them back.
pub struct UnitOfWork<'a> {
    db: &'a DatabaseConnection,
    txn: Option<DatabaseTransaction>,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db, txn: None }
    }

    async fn txn(&mut self) -> SyncResult<&DatabaseTransaction> {
        let txn = match self.txn.take() {
            Some(txn) => txn,
            None => self.db.begin().await?,
        };
        let txn = self.txn.insert(txn);
        Ok(&*txn)
    }

    pub async fn commit(&mut self) -> SyncResult<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await?;
        }
        Ok(())
    }

    /// Bulk soft delete by external id. Returns the number of rows flagged.
    pub async fn delete_by_ids(&mut self, kind: EntityKind, tmdb_ids: &[i32]) -> SyncResult<u64> {
        let now = now_sec();
        let txn = self.txn().await?;
        let mut affected = 0;

        for chunk in tmdb_ids.chunks(ID_CHUNK) {
            let result = match kind {
                EntityKind::Movie => {
                    film::Entity::update_many()
                        .col_expr(film::Column::IsDeleted, Expr::value(true))
                        .col_expr(film::Column::UpdatedAt, Expr::value(now))
                        .filter(film::Column::TmdbId.is_in(chunk.iter().copied()))
                        .filter(film::Column::IsDeleted.eq(false))
                        .exec(txn)
                        .await?
                },
                EntityKind::Person => {
                    celebrity::Entity::update_many()
                        .col_expr(celebrity::Column::IsDeleted, Expr::value(true))
                        .col_expr(celebrity::Column::UpdatedAt, Expr::value(now))
                        .filter(celebrity::Column::TmdbId.is_in(chunk.iter().copied()))
                        .filter(celebrity::Column::IsDeleted.eq(false))
                        .exec(txn)
                        .await?
                },
            };
            affected += result.rows_affected;
        }

        Ok(affected)
    }

    pub async fn films_by_ids(&self, tmdb_ids: &[i32]) -> SyncResult<Vec<film::Model>> {
        let mut out = Vec::new();
        for chunk in tmdb_ids.chunks(ID_CHUNK) {
            let query =
                film::Entity::find().filter(film::Column::TmdbId.is_in(chunk.iter().copied()));
            let rows = match &self.txn {
                Some(txn) => query.all(txn).await?,
                None => query.all(self.db).await?,
            };
            out.extend(rows);
        }
        Ok(out)
    }

    pub async fn celebrities_by_ids(&self, tmdb_ids: &[i32]) -> SyncResult<Vec<celebrity::Model>> {
        let mut out = Vec::new();
        for chunk in tmdb_ids.chunks(ID_CHUNK) {
            let query = celebrity::Entity::find()
                .filter(celebrity::Column::TmdbId.is_in(chunk.iter().copied()));
            let rows = match &self.txn {
                Some(txn) => query.all(txn).await?,
                None => query.all(self.db).await?,
            };
            out.extend(rows);
        }
        Ok(out)
    }

    pub async fn add_film(&mut self, model: film::ActiveModel) -> SyncResult<film::Model> {
        let txn = self.txn().await?;
        Ok(model.insert(txn).await?)
    }

    pub async fn add_celebrity(
        &mut self,
        model: celebrity::ActiveModel,
    ) -> SyncResult<celebrity::Model> {
        let txn = self.txn().await?;
        Ok(model.insert(txn).await?)
    }

    pub async fn add_films(&mut self, models: Vec<film::ActiveModel>) -> SyncResult<()> {
        if models.is_empty() {
            return Ok(());
        }
        let txn = self.txn().await?;
        film::Entity::insert_many(models).exec(txn).await?;
        Ok(())
    }

    pub async fn add_celebrities(&mut self, models: Vec<celebrity::ActiveModel>) -> SyncResult<()> {
        if models.is_empty() {
            return Ok(());
        }
        let txn = self.txn().await?;
        celebrity::Entity::insert_many(models).exec(txn).await?;
        Ok(())
    }

    pub async fn add_credits(
        &mut self,
        models: Vec<celebrity_credit::ActiveModel>,
    ) -> SyncResult<()> {
        if models.is_empty() {
            return Ok(());
        }
        let txn = self.txn().await?;
        celebrity_credit::Entity::insert_many(models).exec(txn).await?;
        Ok(())
    }

    pub async fn update_film(&mut self, model: film::ActiveModel) -> SyncResult<film::Model> {
        let txn = self.txn().await?;
        Ok(model.update(txn).await?)
    }

    pub async fn update_celebrity(
        &mut self,
        model: celebrity::ActiveModel,
    ) -> SyncResult<celebrity::Model> {
        let txn = self.txn().await?;
        Ok(model.update(txn).await?)
    }

    pub async fn delete_credits_for_film(&mut self, film_id: i32) -> SyncResult<u64> {
        let txn = self.txn().await?;
        let result = celebrity_credit::Entity::delete_many()
            .filter(celebrity_credit::Column::FilmId.eq(film_id))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn replace_trending(&mut self, rows: Vec<trending::ActiveModel>) -> SyncResult<()> {
        let txn = self.txn().await?;
        trending::Entity::delete_many().exec(txn).await?;
        if !rows.is_empty() {
            trending::Entity::insert_many(rows).exec(txn).await?;
        }
        Ok(())
    }

    pub async fn replace_countries(&mut self, rows: Vec<country::ActiveModel>) -> SyncResult<()> {
        let txn = self.txn().await?;
        country::Entity::delete_many().exec(txn).await?;
        if !rows.is_empty() {
            country::Entity::insert_many(rows).exec(txn).await?;
        }
        Ok(())
    }
}

/// Applies one reconciled film.
///
/// Film and new celebrities are committed first so credits can reference
/// them; credits for the film are then replaced wholesale and committed.
pub async fn apply_film(
    uow: &mut UnitOfWork<'_>,
    reconciled: ReconciledFilm,
    existing: Option<film::Model>,
) -> SyncResult<film::Model> {
    let now = now_sec();
    let ReconciledFilm { film: draft, new_celebrities, credits, .. } = reconciled;
    let is_new = existing.is_none();

    let film = match existing {
        None => uow.add_film(new_film_model(&draft, now)?).await?,
        Some(existing) => uow.update_film(merge_film(existing, &draft, now)?).await?,
    };

    add_new_celebrities(uow, new_celebrities, now).await?;
    uow.commit().await?;

    let rows = credit_models(uow, film.id, &credits).await?;
    if !is_new {
        let removed = uow.delete_credits_for_film(film.id).await?;
        debug!(tmdb_id = film.tmdb_id, removed, "cleared previous credits");
    }
    uow.add_credits(rows).await?;
    uow.commit().await?;

    Ok(film)
}

/// Creates or merges a single celebrity and commits.
pub async fn apply_celebrity(
    uow: &mut UnitOfWork<'_>,
    draft: &CelebrityDraft,
) -> SyncResult<celebrity::Model> {
    let now = now_sec();
    let existing = uow.celebrities_by_ids(&[draft.tmdb_id]).await?.into_iter().next();
    let model = match existing {
        Some(existing) => uow.update_celebrity(merge_celebrity(existing, draft, now)).await?,
        None => uow.add_celebrity(new_celebrity_model(draft, now)).await?,
    };
    uow.commit().await?;
    Ok(model)
}

/// Replaces the whole trending table with `(film_id, rank)` pairs.
pub async fn apply_trending(uow: &mut UnitOfWork<'_>, ranked: &[(i32, i32)]) -> SyncResult<()> {
    let now = now_sec();
    let rows = ranked
        .iter()
        .map(|&(film_id, rank)| trending::ActiveModel {
            id: Default::default(),
            film_id: Set(film_id),
            rank: Set(rank),
            updated_at: Set(now),
        })
        .collect();
    uow.replace_trending(rows).await?;
    uow.commit().await
}

pub async fn apply_countries(
    uow: &mut UnitOfWork<'_>,
    countries: Vec<CountryDetail>,
) -> SyncResult<()> {
    let mut seen = HashSet::new();
    let rows = countries
        .into_iter()
        .filter(|c| seen.insert(c.iso_3166_1.clone()))
        .map(|c| country::ActiveModel { iso_code: Set(c.iso_3166_1), name: Set(c.english_name) })
        .collect();
    uow.replace_countries(rows).await?;
    uow.commit().await
}

/// Inserts drafts whose external id is not stored yet.
pub(crate) async fn add_new_celebrities(
    uow: &mut UnitOfWork<'_>,
    drafts: Vec<CelebrityDraft>,
    now: i64,
) -> SyncResult<()> {
    if drafts.is_empty() {
        return Ok(());
    }
    let ids: Vec<i32> = drafts.iter().map(|c| c.tmdb_id).collect();
    let mut stored: HashSet<i32> =
        uow.celebrities_by_ids(&ids).await?.into_iter().map(|c| c.tmdb_id).collect();

    let rows = drafts
        .iter()
        .filter(|c| stored.insert(c.tmdb_id))
        .map(|c| new_celebrity_model(c, now))
        .collect();
    uow.add_celebrities(rows).await
}

/// Resolves credit drafts to rows; drafts whose celebrity is not stored are dropped.
pub(crate) async fn credit_models(
    uow: &UnitOfWork<'_>,
    film_id: i32,
    credits: &[CreditDraft],
) -> SyncResult<Vec<celebrity_credit::ActiveModel>> {
    let mut ids: Vec<i32> = credits.iter().map(|c| c.celebrity_tmdb_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let by_tmdb: HashMap<i32, i32> =
        uow.celebrities_by_ids(&ids).await?.into_iter().map(|c| (c.tmdb_id, c.id)).collect();

    let rows = credits
        .iter()
        .filter_map(|credit| {
            let Some(&celebrity_id) = by_tmdb.get(&credit.celebrity_tmdb_id) else {
                warn!(film_id, celebrity_tmdb_id = credit.celebrity_tmdb_id, "credit references unknown celebrity");
                return None;
            };
            Some(celebrity_credit::ActiveModel {
                id: Default::default(),
                celebrity_id: Set(celebrity_id),
                film_id: Set(film_id),
                role: Set(credit.role.as_code()),
                character_name: Set(credit.character_name.clone()),
                billing_order: Set(credit.billing_order),
            })
        })
        .collect();
    Ok(rows)
}

pub fn new_film_model(draft: &FilmDraft, now: i64) -> SyncResult<film::ActiveModel> {
    Ok(film::ActiveModel {
        id: Default::default(),
        tmdb_id: Set(draft.tmdb_id),
        title: Set(draft.title.clone()),
        original_title: Set(draft.original_title.clone()),
        synopsis: Set(draft.synopsis.clone()),
        poster_path: Set(draft.poster_path.clone()),
        backdrop_path: Set(draft.backdrop_path.clone()),
        runtime_minutes: Set(draft.runtime_minutes),
        release_year: Set(draft.release_year),
        genres: Set(serde_json::to_string(&draft.genres)?),
        production_countries: Set(serde_json::to_string(&draft.production_countries)?),
        collection_posters: Set(collection_json(draft)?),
        title_locked: Set(false),
        synopsis_locked: Set(false),
        poster_locked: Set(false),
        backdrop_locked: Set(false),
        is_deleted: Set(false),
        favorites_count: Set(0),
        watch_count: Set(0),
        updated_at: Set(now),
    })
}

/// Merges provider fields into a stored film. Locked fields and counters
/// owned elsewhere are left as they are; a soft-deleted film is revived.
pub fn merge_film(
    existing: film::Model,
    draft: &FilmDraft,
    now: i64,
) -> SyncResult<film::ActiveModel> {
    let locks = (
        existing.title_locked,
        existing.synopsis_locked,
        existing.poster_locked,
        existing.backdrop_locked,
    );
    let mut model: film::ActiveModel = existing.into();

    if !locks.0 {
        model.title = Set(draft.title.clone());
        model.original_title = Set(draft.original_title.clone());
    }
    if !locks.1 {
        model.synopsis = Set(draft.synopsis.clone());
    }
    if !locks.2 {
        model.poster_path = Set(draft.poster_path.clone());
    }
    if !locks.3 {
        model.backdrop_path = Set(draft.backdrop_path.clone());
    }

    model.runtime_minutes = Set(draft.runtime_minutes);
    model.release_year = Set(draft.release_year);
    model.genres = Set(serde_json::to_string(&draft.genres)?);
    model.production_countries = Set(serde_json::to_string(&draft.production_countries)?);
    model.collection_posters = Set(collection_json(draft)?);
    model.is_deleted = Set(false);
    model.updated_at = Set(now);
    Ok(model)
}

pub fn new_celebrity_model(draft: &CelebrityDraft, now: i64) -> celebrity::ActiveModel {
    celebrity::ActiveModel {
        id: Default::default(),
        tmdb_id: Set(draft.tmdb_id),
        name: Set(draft.name.clone()),
        biography: Set(draft.biography.clone()),
        picture_path: Set(draft.picture_path.clone()),
        name_locked: Set(false),
        biography_locked: Set(false),
        picture_locked: Set(false),
        is_deleted: Set(false),
        updated_at: Set(now),
    }
}

pub fn merge_celebrity(
    existing: celebrity::Model,
    draft: &CelebrityDraft,
    now: i64,
) -> celebrity::ActiveModel {
    let locks = (existing.name_locked, existing.biography_locked, existing.picture_locked);
    let mut model: celebrity::ActiveModel = existing.into();

    if !locks.0 {
        model.name = Set(draft.name.clone());
    }
    if !locks.1 {
        model.biography = Set(draft.biography.clone());
    }
    if !locks.2 {
        model.picture_path = Set(draft.picture_path.clone());
    }
    model.is_deleted = Set(false);
    model.updated_at = Set(now);
    model
}

fn collection_json(draft: &FilmDraft) -> SyncResult<Option<String>> {
    Ok(draft.collection_posters.as_ref().map(serde_json::to_string).transpose()?)
}

pub(crate) fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
