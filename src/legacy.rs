//! File-based persistence: reconciled entities are written as one JSON
//! document each and later bulk-loaded into the store in batches.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{
    error::SyncResult,
    reconciler::{CelebrityDraft, CreditDraft, FilmDraft, ReconciledFilm},
    writer::{self, UnitOfWork},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditDocument {
    pub film_tmdb_id: i32,
    #[serde(flatten)]
    pub credit: CreditDraft,
}

#[derive(Clone, Debug)]
pub struct LegacyDirs {
    pub films: PathBuf,
    pub celebrities: PathBuf,
    pub credits: PathBuf,
}

pub struct FileSink {
    dirs: LegacyDirs,
}

impl FileSink {
    pub fn new(dirs: LegacyDirs) -> Self {
        Self { dirs }
    }

    /// Writes the film, its new people and its full credit list. Credit files
    /// left from an earlier pass for the same film are removed first.
    pub async fn write_film(&self, reconciled: &ReconciledFilm) -> SyncResult<()> {
        let film_id = reconciled.film.tmdb_id;
        write_document(&self.dirs.films, &format!("film-{film_id}.json"), &reconciled.film).await?;

        for celebrity in &reconciled.new_celebrities {
            self.write_celebrity(celebrity).await?;
        }

        tokio::fs::create_dir_all(&self.dirs.credits).await?;
        let prefix = format!("credit-{film_id}-");
        for stale in json_files(&self.dirs.credits).await? {
            if file_name(&stale).starts_with(&prefix) {
                tokio::fs::remove_file(&stale).await?;
            }
        }

        for (n, credit) in reconciled.credits.iter().enumerate() {
            let name = format!(
                "credit-{film_id}-{}-{}-{n}.json",
                credit.celebrity_tmdb_id,
                credit.role.as_code()
            );
            let doc = CreditDocument { film_tmdb_id: film_id, credit: credit.clone() };
            write_document(&self.dirs.credits, &name, &doc).await?;
        }

        debug!(tmdb_id = film_id, credits = reconciled.credits.len(), "wrote film documents");
        Ok(())
    }

    pub async fn write_celebrity(&self, celebrity: &CelebrityDraft) -> SyncResult<()> {
        let name = format!("celebrity-{}.json", celebrity.tmdb_id);
        write_document(&self.dirs.celebrities, &name, celebrity).await
    }
}

async fn write_document<T: Serialize>(dir: &Path, name: &str, doc: &T) -> SyncResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    let body = serde_json::to_vec_pretty(doc)?;
    let tmp = dir.join(format!(".{name}.tmp"));
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, dir.join(name)).await?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub malformed: usize,
    pub unresolved: usize,
}

impl std::ops::AddAssign for LoadReport {
    fn add_assign(&mut self, rhs: Self) {
        self.loaded += rhs.loaded;
        self.malformed += rhs.malformed;
        self.unresolved += rhs.unresolved;
    }
}

/// Loads documents written by [`FileSink`] in fixed-size batches, deleting
/// each file once its batch is committed. Malformed files are skipped and
/// left on disk.
pub struct BatchLoader {
    dirs: LegacyDirs,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(dirs: LegacyDirs, batch_size: usize) -> Self {
        Self { dirs, batch_size: batch_size.max(1) }
    }

    pub async fn load(&self, db: &DatabaseConnection) -> SyncResult<LoadReport> {
        let mut report = self.load_films(db).await?;
        report += self.load_celebrities(db).await?;
        report += self.load_credits(db).await?;
        info!(loaded = report.loaded, malformed = report.malformed, unresolved = report.unresolved, "legacy import finished");
        Ok(report)
    }

    async fn load_films(&self, db: &DatabaseConnection) -> SyncResult<LoadReport> {
        let mut report = LoadReport::default();
        let files = json_files(&self.dirs.films).await?;

        for batch in files.chunks(self.batch_size) {
            let (docs, malformed) = read_batch::<FilmDraft>(batch).await;
            report.malformed += malformed;

            let mut uow = UnitOfWork::new(db);
            let ids: Vec<i32> = docs.iter().map(|(_, d)| d.tmdb_id).collect();
            let mut stored: HashMap<i32, _> =
                uow.films_by_ids(&ids).await?.into_iter().map(|f| (f.tmdb_id, f)).collect();

            let now = writer::now_sec();
            let mut fresh = BTreeMap::new();
            for (_, draft) in &docs {
                match stored.remove(&draft.tmdb_id) {
                    Some(existing) => {
                        uow.update_film(writer::merge_film(existing, draft, now)?).await?;
                    },
                    None => {
                        fresh.insert(draft.tmdb_id, writer::new_film_model(draft, now)?);
                    },
                }
            }
            uow.add_films(fresh.into_values().collect()).await?;
            uow.commit().await?;

            report.loaded += docs.len();
            remove_consumed(&docs).await;
        }

        Ok(report)
    }

    async fn load_celebrities(&self, db: &DatabaseConnection) -> SyncResult<LoadReport> {
        let mut report = LoadReport::default();
        let files = json_files(&self.dirs.celebrities).await?;

        for batch in files.chunks(self.batch_size) {
            let (docs, malformed) = read_batch::<CelebrityDraft>(batch).await;
            report.malformed += malformed;

            let mut uow = UnitOfWork::new(db);
            let ids: Vec<i32> = docs.iter().map(|(_, d)| d.tmdb_id).collect();
            let mut stored: HashMap<i32, _> =
                uow.celebrities_by_ids(&ids).await?.into_iter().map(|c| (c.tmdb_id, c)).collect();

            let now = writer::now_sec();
            let mut fresh = Vec::new();
            for (_, draft) in &docs {
                match stored.remove(&draft.tmdb_id) {
                    Some(existing) => {
                        uow.update_celebrity(writer::merge_celebrity(existing, draft, now)).await?;
                    },
                    None => fresh.push(draft.clone()),
                }
            }
            writer::add_new_celebrities(&mut uow, fresh, now).await?;
            uow.commit().await?;

            report.loaded += docs.len();
            remove_consumed(&docs).await;
        }

        Ok(report)
    }

    /// Credits are grouped per film and replace that film's stored credits.
    /// A film whose credits reference a film or celebrity that is not stored
    /// yet keeps all of its files on disk for a later run.
    async fn load_credits(&self, db: &DatabaseConnection) -> SyncResult<LoadReport> {
        let mut report = LoadReport::default();
        let files = json_files(&self.dirs.credits).await?;

        let mut by_film: BTreeMap<i32, Vec<(PathBuf, CreditDraft)>> = BTreeMap::new();
        for batch in files.chunks(self.batch_size) {
            let (docs, malformed) = read_batch::<CreditDocument>(batch).await;
            report.malformed += malformed;
            for (path, doc) in docs {
                by_film.entry(doc.film_tmdb_id).or_default().push((path, doc.credit));
            }
        }

        let films: Vec<_> = by_film.into_iter().collect();
        for batch in films.chunks(self.batch_size) {
            let mut uow = UnitOfWork::new(db);
            let ids: Vec<i32> = batch.iter().map(|(id, _)| *id).collect();
            let stored: HashMap<i32, i32> =
                uow.films_by_ids(&ids).await?.into_iter().map(|f| (f.tmdb_id, f.id)).collect();

            let mut consumed = Vec::new();
            for (film_tmdb_id, entries) in batch {
                let Some(&film_id) = stored.get(film_tmdb_id) else {
                    warn!(film_tmdb_id, credits = entries.len(), "credits reference a film that is not stored");
                    report.unresolved += entries.len();
                    continue;
                };
                let drafts: Vec<CreditDraft> = entries.iter().map(|(_, c)| c.clone()).collect();
                let rows = writer::credit_models(&uow, film_id, &drafts).await?;
                if rows.len() < drafts.len() {
                    warn!(
                        film_tmdb_id,
                        missing = drafts.len() - rows.len(),
                        "credits reference celebrities that are not stored, keeping the film's files"
                    );
                    report.unresolved += drafts.len();
                    continue;
                }
                report.loaded += rows.len();

                uow.delete_credits_for_film(film_id).await?;
                uow.add_credits(rows).await?;
                consumed.extend(entries.iter().cloned());
            }
            uow.commit().await?;
            remove_consumed(&consumed).await;
        }

        Ok(report)
    }
}

async fn json_files(dir: &Path) -> SyncResult<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && !file_name(&path).starts_with('.') {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_batch<T: DeserializeOwned>(paths: &[PathBuf]) -> (Vec<(PathBuf, T)>, usize) {
    let mut docs = Vec::with_capacity(paths.len());
    let mut malformed = 0;

    for path in paths {
        let parsed = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice::<T>(&bytes).map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match parsed {
            Ok(doc) => docs.push((path.clone(), doc)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed document");
                malformed += 1;
            },
        }
    }

    (docs, malformed)
}

async fn remove_consumed<T>(docs: &[(PathBuf, T)]) {
    for (path, _) in docs {
        if let Err(err) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %err, "failed to remove consumed document");
        }
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

    use super::*;
    use crate::{
        entities::{celebrity, celebrity_credit, film},
        models::Role,
        testing::test_db,
    };

    fn dirs(root: &Path) -> LegacyDirs {
        LegacyDirs {
            films: root.join("films"),
            celebrities: root.join("celebrities"),
            credits: root.join("credits"),
        }
    }

    fn reconciled(tmdb_id: i32, credits: Vec<CreditDraft>) -> ReconciledFilm {
        ReconciledFilm {
            film: FilmDraft {
                tmdb_id,
                title: format!("Film {tmdb_id}"),
                original_title: None,
                synopsis: "s".to_string(),
                poster_path: None,
                backdrop_path: None,
                runtime_minutes: 90,
                release_year: 1990,
                genres: vec![],
                production_countries: vec![],
                collection_posters: None,
            },
            new_celebrities: vec![CelebrityDraft {
                tmdb_id: 7,
                name: "Seven".to_string(),
                biography: None,
                picture_path: None,
            }],
            credits,
            dropped: vec![],
        }
    }

    fn actor(order: i32) -> CreditDraft {
        CreditDraft {
            celebrity_tmdb_id: 7,
            role: Role::Actor,
            character_name: None,
            billing_order: Some(order),
        }
    }

    async fn count_files(dir: &Path) -> usize {
        json_files(dir).await.unwrap().len()
    }

    #[tokio::test]
    async fn sink_writes_one_document_per_entity() {
        let root = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dirs(root.path()));

        sink.write_film(&reconciled(1, vec![actor(0), actor(1)])).await.unwrap();

        assert!(root.path().join("films/film-1.json").exists());
        assert!(root.path().join("celebrities/celebrity-7.json").exists());
        assert_eq!(count_files(&root.path().join("credits")).await, 2);

        sink.write_film(&reconciled(1, vec![actor(0)])).await.unwrap();
        assert_eq!(count_files(&root.path().join("credits")).await, 1);
    }

    #[tokio::test]
    async fn loader_imports_batches_and_consumes_files() {
        let root = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dirs(root.path()));
        for id in 1..=5 {
            sink.write_film(&reconciled(id, vec![actor(0)])).await.unwrap();
        }
        tokio::fs::write(root.path().join("films/broken.json"), b"{not json").await.unwrap();

        let db = test_db().await;
        let report = BatchLoader::new(dirs(root.path()), 2).load(&db).await.unwrap();

        assert_eq!(report.malformed, 1);
        assert_eq!(report.unresolved, 0);
        assert_eq!(film::Entity::find().count(&db).await.unwrap(), 5);
        assert_eq!(celebrity::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(celebrity_credit::Entity::find().count(&db).await.unwrap(), 5);

        assert_eq!(count_files(&root.path().join("films")).await, 1);
        assert_eq!(count_files(&root.path().join("celebrities")).await, 0);
        assert_eq!(count_files(&root.path().join("credits")).await, 0);
    }

    #[tokio::test]
    async fn reloading_a_film_replaces_its_credits() {
        let root = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dirs(root.path()));
        let loader = BatchLoader::new(dirs(root.path()), 10);
        let db = test_db().await;

        sink.write_film(&reconciled(1, vec![actor(0), actor(1)])).await.unwrap();
        loader.load(&db).await.unwrap();
        sink.write_film(&reconciled(1, vec![actor(3)])).await.unwrap();
        loader.load(&db).await.unwrap();

        let stored = film::Entity::find()
            .filter(film::Column::TmdbId.eq(1))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let credits = celebrity_credit::Entity::find()
            .filter(celebrity_credit::Column::FilmId.eq(stored.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].billing_order, Some(3));
    }

    #[tokio::test]
    async fn credits_for_missing_films_stay_on_disk() {
        let root = tempfile::tempdir().unwrap();
        let d = dirs(root.path());
        let doc = CreditDocument { film_tmdb_id: 42, credit: actor(0) };
        write_document(&d.credits, "credit-42-7-1-0.json", &doc).await.unwrap();

        let db = test_db().await;
        let report = BatchLoader::new(d.clone(), 10).load(&db).await.unwrap();

        assert_eq!(report.unresolved, 1);
        assert_eq!(count_files(&d.credits).await, 1);
    }

    #[tokio::test]
    async fn credits_for_unknown_celebrities_keep_the_film_untouched() {
        let root = tempfile::tempdir().unwrap();
        let d = dirs(root.path());
        let sink = FileSink::new(d.clone());
        let loader = BatchLoader::new(d.clone(), 10);
        let db = test_db().await;

        sink.write_film(&reconciled(1, vec![actor(0)])).await.unwrap();
        loader.load(&db).await.unwrap();

        sink.write_film(&reconciled(1, vec![actor(4)])).await.unwrap();
        tokio::fs::write(d.celebrities.join("celebrity-8.json"), b"{not json").await.unwrap();
        let doc = CreditDocument {
            film_tmdb_id: 1,
            credit: CreditDraft {
                celebrity_tmdb_id: 8,
                role: Role::Director,
                character_name: None,
                billing_order: None,
            },
        };
        write_document(&d.credits, "credit-1-8-2-0.json", &doc).await.unwrap();

        let report = loader.load(&db).await.unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(report.unresolved, 2);

        let stored = film::Entity::find()
            .filter(film::Column::TmdbId.eq(1))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        let credits = celebrity_credit::Entity::find()
            .filter(celebrity_credit::Column::FilmId.eq(stored.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].billing_order, Some(0));
        assert_eq!(count_files(&d.credits).await, 2);
        assert_eq!(count_files(&d.celebrities).await, 1);
    }

    #[tokio::test]
    async fn missing_directories_load_nothing() {
        let root = tempfile::tempdir().unwrap();
        let db = test_db().await;
        let loader = BatchLoader::new(dirs(&root.path().join("absent")), 10);
        let report = loader.load(&db).await.unwrap();
        assert_eq!(report, LoadReport::default());
    }
}
