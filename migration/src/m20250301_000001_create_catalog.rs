use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Film::Table)
                    .if_not_exists()
                    .col(pk_auto(Film::Id))
                    .col(integer_uniq(Film::TmdbId))
                    .col(string(Film::Title))
                    .col(string_null(Film::OriginalTitle))
                    .col(text(Film::Synopsis))
                    .col(string_null(Film::PosterPath))
                    .col(string_null(Film::BackdropPath))
                    .col(integer(Film::RuntimeMinutes).default(0))
                    .col(integer(Film::ReleaseYear).default(0))
                    .col(text(Film::Genres).default("[]"))
                    .col(text(Film::ProductionCountries).default("[]"))
                    .col(text_null(Film::CollectionPosters))
                    .col(boolean(Film::TitleLocked).default(false))
                    .col(boolean(Film::SynopsisLocked).default(false))
                    .col(boolean(Film::PosterLocked).default(false))
                    .col(boolean(Film::BackdropLocked).default(false))
                    .col(boolean(Film::IsDeleted).default(false))
                    .col(integer(Film::FavoritesCount).default(0))
                    .col(integer(Film::WatchCount).default(0))
                    .col(big_integer(Film::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Celebrity::Table)
                    .if_not_exists()
                    .col(pk_auto(Celebrity::Id))
                    .col(integer_uniq(Celebrity::TmdbId))
                    .col(string(Celebrity::Name))
                    .col(text_null(Celebrity::Biography))
                    .col(string_null(Celebrity::PicturePath))
                    .col(boolean(Celebrity::NameLocked).default(false))
                    .col(boolean(Celebrity::BiographyLocked).default(false))
                    .col(boolean(Celebrity::PictureLocked).default(false))
                    .col(boolean(Celebrity::IsDeleted).default(false))
                    .col(big_integer(Celebrity::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CelebrityCredit::Table)
                    .if_not_exists()
                    .col(pk_auto(CelebrityCredit::Id))
                    .col(integer(CelebrityCredit::CelebrityId))
                    .col(integer(CelebrityCredit::FilmId))
                    .col(integer(CelebrityCredit::Role))
                    .col(string_null(CelebrityCredit::CharacterName))
                    .col(integer_null(CelebrityCredit::BillingOrder))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_celebrity_credit_celebrity")
                            .from(CelebrityCredit::Table, CelebrityCredit::CelebrityId)
                            .to(Celebrity::Table, Celebrity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_celebrity_credit_film")
                            .from(CelebrityCredit::Table, CelebrityCredit::FilmId)
                            .to(Film::Table, Film::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_celebrity_credit_film")
                    .table(CelebrityCredit::Table)
                    .col(CelebrityCredit::FilmId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_celebrity_credit_celebrity")
                    .table(CelebrityCredit::Table)
                    .col(CelebrityCredit::CelebrityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(CelebrityCredit::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Celebrity::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Film::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Film {
    Table,
    Id,
    TmdbId,
    Title,
    OriginalTitle,
    Synopsis,
    PosterPath,
    BackdropPath,
    RuntimeMinutes,
    ReleaseYear,
    Genres,
    ProductionCountries,
    CollectionPosters,
    TitleLocked,
    SynopsisLocked,
    PosterLocked,
    BackdropLocked,
    IsDeleted,
    FavoritesCount,
    WatchCount,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Celebrity {
    Table,
    Id,
    TmdbId,
    Name,
    Biography,
    PicturePath,
    NameLocked,
    BiographyLocked,
    PictureLocked,
    IsDeleted,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CelebrityCredit {
    Table,
    Id,
    CelebrityId,
    FilmId,
    Role,
    CharacterName,
    BillingOrder,
}
