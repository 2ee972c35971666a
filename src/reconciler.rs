use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{SkipReason, SyncError, SyncResult},
    jobs::SyncContext,
    models::{CelebrityDetail, CollectionPart, FilmDetail, Role},
};

pub const UNTITLED: &str = "Untitled";
pub const SYNOPSIS_PLACEHOLDER: &str = "No synopsis available.";
pub const UNNAMED_ROLE: &str = "Unnamed Role";
pub const UNKNOWN_NAME: &str = "Unknown";
/// Billing order for cast members the provider left unordered.
pub const DEFAULT_BILLING_ORDER: i32 = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilmDraft {
    pub tmdb_id: i32,
    pub title: String,
    pub original_title: Option<String>,
    pub synopsis: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub runtime_minutes: i32,
    pub release_year: i32,
    pub genres: Vec<String>,
    pub production_countries: Vec<String>,
    pub collection_posters: Option<Vec<CollectionPoster>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelebrityDraft {
    pub tmdb_id: i32,
    pub name: String,
    pub biography: Option<String>,
    pub picture_path: Option<String>,
}

/// A credit before internal ids exist; the writer resolves `celebrity_tmdb_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreditDraft {
    pub celebrity_tmdb_id: i32,
    pub role: Role,
    pub character_name: Option<String>,
    pub billing_order: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPoster {
    pub tmdb_id: i32,
    pub poster_path: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ReconciledFilm {
    pub film: FilmDraft,
    pub new_celebrities: Vec<CelebrityDraft>,
    pub credits: Vec<CreditDraft>,
    /// Cast/crew people that could not be resolved and were left out.
    pub dropped: Vec<(i32, SkipReason)>,
}

enum Resolution {
    Known,
    Created,
    Unavailable,
}

/// Run-local people cache: every external id is resolved at most once per
/// reconciliation call, whether it ends up known, fetched, or unavailable.
struct PeopleArena<'a> {
    known: &'a HashSet<i32>,
    resolved: HashMap<i32, Resolution>,
    created: Vec<CelebrityDraft>,
    dropped: Vec<(i32, SkipReason)>,
}

impl<'a> PeopleArena<'a> {
    fn new(known: &'a HashSet<i32>) -> Self {
        Self { known, resolved: HashMap::new(), created: Vec::new(), dropped: Vec::new() }
    }

    async fn resolve(&mut self, ctx: &SyncContext, tmdb_id: i32) -> bool {
        if let Some(resolution) = self.resolved.get(&tmdb_id) {
            return !matches!(resolution, Resolution::Unavailable);
        }

        if self.known.contains(&tmdb_id) {
            self.resolved.insert(tmdb_id, Resolution::Known);
            return true;
        }

        let fetched = ctx
            .retry
            .call("celebrity detail", || ctx.source.celebrity_detail(tmdb_id))
            .await
            .and_then(|detail| reconcile_celebrity(detail, &ctx.image_base_url));

        match fetched {
            Ok(celebrity) => {
                self.created.push(celebrity);
                self.resolved.insert(tmdb_id, Resolution::Created);
                true
            },
            Err(err) => {
                warn!(tmdb_id, error = %err, "dropping unresolvable person from credits");
                self.dropped.push((tmdb_id, err.into()));
                self.resolved.insert(tmdb_id, Resolution::Unavailable);
                false
            },
        }
    }
}

/// Turns a shaped film detail into the film, the people not yet in the
/// catalog, and the complete credit list for the film.
///
/// `known` holds the external ids of celebrities already stored; those are
/// credited without a detail fetch.
pub async fn reconcile_film(
    ctx: &SyncContext,
    detail: FilmDetail,
    known: &HashSet<i32>,
) -> SyncResult<ReconciledFilm> {
    let tmdb_id = detail.id.ok_or(SyncError::MissingExternalId { entity: "film" })?;

    let collection_posters = match detail.belongs_to_collection.as_ref() {
        Some(collection) => match collection_posters(ctx, collection.id).await {
            Ok(posters) => Some(posters),
            Err(err) => {
                warn!(tmdb_id, collection_id = collection.id, error = %err, "collection enrichment failed");
                None
            },
        },
        None => None,
    };

    let mut people = PeopleArena::new(known);
    let mut credits = Vec::new();

    for member in &detail.credits.cast {
        let Some(person_id) = member.id else { continue };
        if !people.resolve(ctx, person_id).await {
            continue;
        }
        credits.push(CreditDraft {
            celebrity_tmdb_id: person_id,
            role: Role::Actor,
            character_name: Some(
                member
                    .character
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| UNNAMED_ROLE.to_string()),
            ),
            billing_order: Some(member.order.unwrap_or(DEFAULT_BILLING_ORDER)),
        });
    }

    for member in &detail.credits.crew {
        let Some(person_id) = member.id else { continue };
        let Some(role) = Role::from_job(&member.job) else {
            debug!(tmdb_id, person_id, job = %member.job, "ignoring unmapped crew job");
            continue;
        };
        if !people.resolve(ctx, person_id).await {
            continue;
        }
        credits.push(CreditDraft {
            celebrity_tmdb_id: person_id,
            role,
            character_name: None,
            billing_order: None,
        });
    }

    let film = film_draft(tmdb_id, detail, &ctx.image_base_url, collection_posters);

    Ok(ReconciledFilm {
        film,
        new_celebrities: people.created,
        credits,
        dropped: people.dropped,
    })
}

fn film_draft(
    tmdb_id: i32,
    detail: FilmDetail,
    image_base_url: &str,
    collection_posters: Option<Vec<CollectionPoster>>,
) -> FilmDraft {
    let title = detail.title.filter(|t| !t.trim().is_empty());
    let original = detail.original_title.filter(|t| !t.trim().is_empty());
    let (title, original_title) = match (title, original) {
        (Some(title), original) => {
            let original = original.filter(|o| *o != title);
            (title, original)
        },
        (None, Some(original)) => (original, None),
        (None, None) => (UNTITLED.to_string(), None),
    };

    FilmDraft {
        tmdb_id,
        title,
        original_title,
        synopsis: detail
            .overview
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| SYNOPSIS_PLACEHOLDER.to_string()),
        poster_path: image_url(image_base_url, detail.poster_path.as_deref()),
        backdrop_path: image_url(image_base_url, detail.backdrop_path.as_deref()),
        runtime_minutes: detail.runtime.unwrap_or(0),
        release_year: release_year(detail.release_date.as_deref()),
        genres: detail.genres.into_iter().map(|g| g.name).collect(),
        production_countries: detail
            .production_countries
            .into_iter()
            .map(|c| c.iso_3166_1)
            .collect(),
        collection_posters,
    }
}

pub fn reconcile_celebrity(
    detail: CelebrityDetail,
    image_base_url: &str,
) -> SyncResult<CelebrityDraft> {
    let tmdb_id = detail.id.ok_or(SyncError::MissingExternalId { entity: "celebrity" })?;
    Ok(CelebrityDraft {
        tmdb_id,
        name: detail
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        biography: detail.biography,
        picture_path: image_url(image_base_url, detail.profile_path.as_deref()),
    })
}

/// Best-effort sibling poster list for a film's collection.
pub async fn collection_posters(
    ctx: &SyncContext,
    collection_id: i32,
) -> SyncResult<Vec<CollectionPoster>> {
    let detail = ctx
        .retry
        .call("collection detail", || ctx.source.collection_detail(collection_id))
        .await?;
    Ok(sibling_posters(detail.parts, &ctx.image_base_url))
}

/// Members with an id and a release date, oldest first. ISO dates order
/// lexicographically; the sort is stable for equal dates.
pub fn sibling_posters(parts: Vec<CollectionPart>, image_base_url: &str) -> Vec<CollectionPoster> {
    let mut members: Vec<_> = parts
        .into_iter()
        .filter_map(|part| {
            let tmdb_id = part.id?;
            let date = part.release_date.filter(|d| !d.trim().is_empty())?;
            Some((date, tmdb_id, part.poster_path))
        })
        .collect();
    members.sort_by(|a, b| a.0.cmp(&b.0));

    members
        .into_iter()
        .map(|(_, tmdb_id, poster)| CollectionPoster {
            tmdb_id,
            poster_path: image_url(image_base_url, poster.as_deref()),
        })
        .collect()
}

pub fn release_year(release_date: Option<&str>) -> i32 {
    release_date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok()).unwrap_or(0)
}

pub fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    Some(format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')))
}
