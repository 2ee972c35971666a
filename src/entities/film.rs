use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "film")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tmdb_id: i32,
    pub title: String,
    pub original_title: Option<String>,
    pub synopsis: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub runtime_minutes: i32,
    pub release_year: i32,
    /// JSON array of genre names, provider order.
    pub genres: String,
    /// JSON array of ISO 3166-1 codes, provider order.
    pub production_countries: String,
    /// JSON array of sibling collection posters, see `reconciler::CollectionPoster`.
    pub collection_posters: Option<String>,
    pub title_locked: bool,
    pub synopsis_locked: bool,
    pub poster_locked: bool,
    pub backdrop_locked: bool,
    pub is_deleted: bool,
    pub favorites_count: i32,
    pub watch_count: i32,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
