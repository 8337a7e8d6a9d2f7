use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ErrorLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErrorLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErrorLogs::Reference).string().not_null().unique_key())
                    .col(ColumnDef::new(ErrorLogs::Location).string().not_null())
                    .col(ColumnDef::new(ErrorLogs::Message).text().not_null())
                    .col(ColumnDef::new(ErrorLogs::SessionId).string())
                    .col(ColumnDef::new(ErrorLogs::RunId).integer())
                    .col(ColumnDef::new(ErrorLogs::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Logs outlive their runs, so run_id is indexed but not a foreign key
        manager
            .create_index(
                Index::create()
                    .name("idx_error_logs_run_id")
                    .table(ErrorLogs::Table)
                    .col(ErrorLogs::RunId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ErrorLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ErrorLogs {
    Table,
    Id,
    Reference,
    Location,
    Message,
    SessionId,
    RunId,
    CreatedAt,
}
