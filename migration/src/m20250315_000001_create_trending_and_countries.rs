use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_catalog::Film;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Trending::Table)
                    .if_not_exists()
                    .col(pk_auto(Trending::Id))
                    .col(integer(Trending::FilmId))
                    .col(integer_uniq(Trending::Rank))
                    .col(big_integer(Trending::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trending_film")
                            .from(Trending::Table, Trending::FilmId)
                            .to(Film::Table, Film::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Country::Table)
                    .if_not_exists()
                    .col(string(Country::IsoCode).primary_key())
                    .col(string(Country::Name))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Country::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Trending::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Trending {
    Table,
    Id,
    FilmId,
    Rank,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Country {
    Table,
    IsoCode,
    Name,
}
