//! Initial migration — creates every table in the canonical schema plus the FTS5
//! virtual table backing full-text person search.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Person::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Person::PersonId).string().not_null().primary_key())
                    .col(ColumnDef::new(Person::DisplayName).string().not_null())
                    .col(ColumnDef::new(Person::BirthName).string())
                    .col(ColumnDef::new(Person::Gender).string_len(16).not_null())
                    .col(ColumnDef::new(Person::Living).boolean().not_null().default(false))
                    .col(ColumnDef::new(Person::Biography).text())
                    .col(ColumnDef::new(Person::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Person::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExternalIdentity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExternalIdentity::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExternalIdentity::PersonId).string().not_null())
                    .col(ColumnDef::new(ExternalIdentity::Source).string().not_null())
                    .col(ColumnDef::new(ExternalIdentity::ExternalId).string().not_null())
                    .col(ColumnDef::new(ExternalIdentity::Url).string())
                    .col(ColumnDef::new(ExternalIdentity::Confidence).double().not_null())
                    .col(
                        ColumnDef::new(ExternalIdentity::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ExternalIdentity::Table, ExternalIdentity::PersonId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_external_identity_source_ext")
                    .table(ExternalIdentity::Table)
                    .col(ExternalIdentity::Source)
                    .col(ExternalIdentity::ExternalId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ParentEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParentEdge::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ParentEdge::ChildId).string().not_null())
                    .col(ColumnDef::new(ParentEdge::ParentId).string().not_null())
                    .col(ColumnDef::new(ParentEdge::ParentRole).string_len(16).not_null())
                    .col(ColumnDef::new(ParentEdge::Source).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ParentEdge::Table, ParentEdge::ChildId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ParentEdge::Table, ParentEdge::ParentId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_parent_edge_unique")
                    .table(ParentEdge::Table)
                    .col(ParentEdge::ChildId)
                    .col(ParentEdge::ParentId)
                    .col(ParentEdge::Source)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SpouseEdge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SpouseEdge::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SpouseEdge::Person1Id).string().not_null())
                    .col(ColumnDef::new(SpouseEdge::Person2Id).string().not_null())
                    .col(ColumnDef::new(SpouseEdge::Source).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VitalEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VitalEvent::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VitalEvent::PersonId).string().not_null())
                    .col(ColumnDef::new(VitalEvent::EventType).string().not_null())
                    .col(ColumnDef::new(VitalEvent::DateOriginal).string())
                    .col(ColumnDef::new(VitalEvent::DateYear).integer())
                    .col(ColumnDef::new(VitalEvent::Place).string())
                    .col(ColumnDef::new(VitalEvent::PlaceId).string())
                    .col(ColumnDef::new(VitalEvent::Source).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(VitalEvent::Table, VitalEvent::PersonId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Claim::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Claim::ClaimId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Claim::PersonId).string().not_null())
                    .col(ColumnDef::new(Claim::Predicate).string().not_null())
                    .col(ColumnDef::new(Claim::ValueText).string().not_null())
                    .col(ColumnDef::new(Claim::Source).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Claim::Table, Claim::PersonId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_claim_unique")
                    .table(Claim::Table)
                    .col(Claim::PersonId)
                    .col(Claim::Predicate)
                    .col(Claim::ValueText)
                    .col(Claim::Source)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DatabaseInfo::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DatabaseInfo::DbId).string().not_null().primary_key())
                    .col(ColumnDef::new(DatabaseInfo::Name).string().not_null())
                    .col(ColumnDef::new(DatabaseInfo::RootId).string().not_null())
                    .col(ColumnDef::new(DatabaseInfo::MaxGenerations).integer())
                    .col(
                        ColumnDef::new(DatabaseInfo::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DatabaseMembership::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DatabaseMembership::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DatabaseMembership::DbId).string().not_null())
                    .col(ColumnDef::new(DatabaseMembership::PersonId).string().not_null())
                    .col(
                        ColumnDef::new(DatabaseMembership::IsRoot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DatabaseMembership::Generation).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(DatabaseMembership::Table, DatabaseMembership::DbId)
                            .to(DatabaseInfo::Table, DatabaseInfo::DbId),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_membership_unique")
                    .table(DatabaseMembership::Table)
                    .col(DatabaseMembership::DbId)
                    .col(DatabaseMembership::PersonId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Favorite::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Favorite::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Favorite::DbId).string().not_null())
                    .col(ColumnDef::new(Favorite::PersonId).string().not_null())
                    .col(ColumnDef::new(Favorite::WhyInteresting).text())
                    .col(ColumnDef::new(Favorite::Tags).json().not_null())
                    .col(ColumnDef::new(Favorite::AddedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Favorite::Table, Favorite::DbId)
                            .to(DatabaseInfo::Table, DatabaseInfo::DbId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Blob::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Blob::BlobHash).string().not_null().primary_key())
                    .col(ColumnDef::new(Blob::Path).string().not_null())
                    .col(ColumnDef::new(Blob::MimeType).string().not_null())
                    .col(ColumnDef::new(Blob::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(Blob::Width).integer())
                    .col(ColumnDef::new(Blob::Height).integer())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Media::MediaId).string().not_null().primary_key())
                    .col(ColumnDef::new(Media::PersonId).string().not_null())
                    .col(ColumnDef::new(Media::BlobHash).string().not_null())
                    .col(ColumnDef::new(Media::Source).string().not_null())
                    .col(ColumnDef::new(Media::IsPrimary).boolean().not_null().default(false))
                    .col(ColumnDef::new(Media::Caption).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Media::Table, Media::PersonId)
                            .to(Person::Table, Person::PersonId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Media::Table, Media::BlobHash)
                            .to(Blob::Table, Blob::BlobHash),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlaceGeocode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlaceGeocode::PlaceText)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlaceGeocode::Lat).double())
                    .col(ColumnDef::new(PlaceGeocode::Lng).double())
                    .col(ColumnDef::new(PlaceGeocode::DisplayName).string())
                    .col(ColumnDef::new(PlaceGeocode::GeocodeStatus).string_len(16).not_null())
                    .col(ColumnDef::new(PlaceGeocode::GeocodedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Full-text index over person fields, backed by SQLite FTS5. sea-orm has no
        // entity-level FTS5 support, so the virtual table is created with raw SQL and
        // kept in sync from Rust (see store::fts), not via triggers.
        let db = manager.get_connection();
        db.execute_unprepared(
            "CREATE VIRTUAL TABLE IF NOT EXISTS person_fts USING fts5(\
                person_id UNINDEXED, display_name, birth_name, aliases, bio, occupations)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS person_fts").await?;
        manager.drop_table(Table::drop().table(PlaceGeocode::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Media::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Blob::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Favorite::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(DatabaseMembership::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(DatabaseInfo::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Claim::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(VitalEvent::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(SpouseEdge::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ParentEdge::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(ExternalIdentity::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Person::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Person {
    Table,
    PersonId,
    DisplayName,
    BirthName,
    Gender,
    Living,
    Biography,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExternalIdentity {
    Table,
    Id,
    PersonId,
    Source,
    ExternalId,
    Url,
    Confidence,
    RegisteredAt,
}

#[derive(DeriveIden)]
enum ParentEdge {
    Table,
    Id,
    ChildId,
    ParentId,
    ParentRole,
    Source,
}

#[derive(DeriveIden)]
enum SpouseEdge {
    Table,
    Id,
    Person1Id,
    Person2Id,
    Source,
}

#[derive(DeriveIden)]
enum VitalEvent {
    Table,
    Id,
    PersonId,
    EventType,
    DateOriginal,
    DateYear,
    Place,
    PlaceId,
    Source,
}

#[derive(DeriveIden)]
enum Claim {
    Table,
    ClaimId,
    PersonId,
    Predicate,
    ValueText,
    Source,
}

#[derive(DeriveIden)]
enum DatabaseInfo {
    Table,
    DbId,
    Name,
    RootId,
    MaxGenerations,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DatabaseMembership {
    Table,
    Id,
    DbId,
    PersonId,
    IsRoot,
    Generation,
}

#[derive(DeriveIden)]
enum Favorite {
    Table,
    Id,
    DbId,
    PersonId,
    WhyInteresting,
    Tags,
    AddedAt,
}

#[derive(DeriveIden)]
enum Blob {
    Table,
    BlobHash,
    Path,
    MimeType,
    SizeBytes,
    Width,
    Height,
}

#[derive(DeriveIden)]
enum Media {
    Table,
    MediaId,
    PersonId,
    BlobHash,
    Source,
    IsPrimary,
    Caption,
}

#[derive(DeriveIden)]
enum PlaceGeocode {
    Table,
    PlaceText,
    Lat,
    Lng,
    DisplayName,
    GeocodeStatus,
    GeocodedAt,
}
