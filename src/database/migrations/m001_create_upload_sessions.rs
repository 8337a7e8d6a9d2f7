use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UploadSessions::SessionId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UploadSessions::OwnerId).string().not_null())
                    .col(ColumnDef::new(UploadSessions::OriginalFilename).text().not_null())
                    .col(ColumnDef::new(UploadSessions::ObjectKey).text().not_null())
                    .col(ColumnDef::new(UploadSessions::FileUrl).text().not_null())
                    .col(
                        ColumnDef::new(UploadSessions::ContentType)
                            .string()
                            .not_null()
                            .default("text/csv"),
                    )
                    .col(ColumnDef::new(UploadSessions::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(UploadSessions::TotalColumns).integer().not_null())
                    .col(ColumnDef::new(UploadSessions::ColumnNames).text().not_null())
                    .col(ColumnDef::new(UploadSessions::PreviewData).text().not_null())
                    .col(
                        ColumnDef::new(UploadSessions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(UploadSessions::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(UploadSessions::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_upload_sessions_owner_id")
                    .table(UploadSessions::Table)
                    .col(UploadSessions::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UploadSessions {
    Table,
    Id,
    SessionId,
    OwnerId,
    OriginalFilename,
    ObjectKey,
    FileUrl,
    ContentType,
    FileSize,
    TotalColumns,
    ColumnNames,
    PreviewData,
    Status,
    CreatedAt,
    UpdatedAt,
}
