use serde::{Deserialize, Serialize};

/// Entity kind addressed by the provider change feed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    Person,
}

impl EntityKind {
    pub fn as_path(self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Person => "person",
        }
    }
}

/// Closed credit taxonomy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Role {
    Actor,
    Director,
    Producer,
    Writer,
    Composer,
}

/// Crew jobs kept by the client; anything else never leaves `tmdb`.
pub const CREW_JOB_WHITELIST: [&str; 6] =
    ["director", "producer", "screenplay", "writer", "story", "original music composer"];

impl Role {
    /// Maps a provider crew job title onto a role, case-insensitively.
    pub fn from_job(job: &str) -> Option<Self> {
        match job.trim().to_ascii_lowercase().as_str() {
            "director" => Some(Role::Director),
            "producer" => Some(Role::Producer),
            "screenplay" | "writer" | "story" => Some(Role::Writer),
            "original music composer" => Some(Role::Composer),
            _ => None,
        }
    }

    pub fn as_code(self) -> i32 {
        match self {
            Role::Actor => 1,
            Role::Director => 2,
            Role::Producer => 3,
            Role::Writer => 4,
            Role::Composer => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Role::Actor),
            2 => Some(Role::Director),
            3 => Some(Role::Producer),
            4 => Some(Role::Writer),
            5 => Some(Role::Composer),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangesPage {
    #[serde(default)]
    pub results: Vec<ChangeEntry>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangeEntry {
    pub id: i32,
    /// Tri-state: absent/null, false, true are three distinct classifications.
    #[serde(default)]
    pub adult: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FilmDetail {
    pub id: Option<i32>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub runtime: Option<i32>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_countries: Vec<ProductionCountry>,
    pub belongs_to_collection: Option<CollectionRef>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CollectionRef {
    pub id: i32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CastMember {
    pub id: Option<i32>,
    pub character: Option<String>,
    pub order: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrewMember {
    pub id: Option<i32>,
    #[serde(default)]
    pub job: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CelebrityDetail {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub biography: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CollectionDetail {
    pub id: i32,
    #[serde(default)]
    pub parts: Vec<CollectionPart>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CollectionPart {
    pub id: Option<i32>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CountryDetail {
    pub iso_3166_1: String,
    pub english_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrendingPage {
    #[serde(default)]
    pub results: Vec<TrendingEntry>,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrendingEntry {
    pub id: i32,
}
