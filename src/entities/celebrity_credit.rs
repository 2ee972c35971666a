use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "celebrity_credit")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub celebrity_id: i32,
    pub film_id: i32,
    /// `models::Role` code.
    pub role: i32,
    pub character_name: Option<String>,
    pub billing_order: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
