use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisRuns::SessionId).string().not_null())
                    .col(ColumnDef::new(AnalysisRuns::OwnerId).string().not_null())
                    .col(
                        ColumnDef::new(AnalysisRuns::Status)
                            .string()
                            .not_null()
                            .default("Started"),
                    )
                    .col(ColumnDef::new(AnalysisRuns::BlobUrl).text().not_null())
                    .col(ColumnDef::new(AnalysisRuns::SandboxId).string())
                    .col(ColumnDef::new(AnalysisRuns::FilePath).text())
                    .col(ColumnDef::new(AnalysisRuns::UnitList).text())
                    .col(ColumnDef::new(AnalysisRuns::UnitStatus).text())
                    .col(ColumnDef::new(AnalysisRuns::UnitErrors).text())
                    .col(ColumnDef::new(AnalysisRuns::Summary).text())
                    .col(ColumnDef::new(AnalysisRuns::ReportUrl).text())
                    .col(ColumnDef::new(AnalysisRuns::Error).text())
                    .col(ColumnDef::new(AnalysisRuns::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(AnalysisRuns::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AnalysisUnitResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisUnitResults::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisUnitResults::RunId).integer().not_null())
                    .col(ColumnDef::new(AnalysisUnitResults::UnitName).text().not_null())
                    .col(ColumnDef::new(AnalysisUnitResults::BusinessAnalysis).text().not_null())
                    .col(ColumnDef::new(AnalysisUnitResults::Code).text())
                    .col(ColumnDef::new(AnalysisUnitResults::CodeExplanation).text())
                    .col(ColumnDef::new(AnalysisUnitResults::ChartUrl).text())
                    .col(ColumnDef::new(AnalysisUnitResults::AnalysisSteps).text().not_null())
                    .col(ColumnDef::new(AnalysisUnitResults::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(AnalysisUnitResults::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analysis_unit_results_run_id")
                            .from(AnalysisUnitResults::Table, AnalysisUnitResults::RunId)
                            .to(AnalysisRuns::Table, AnalysisRuns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_runs_session_created")
                    .table(AnalysisRuns::Table)
                    .col(AnalysisRuns::SessionId)
                    .col(AnalysisRuns::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_unit_results_run_id")
                    .table(AnalysisUnitResults::Table)
                    .col(AnalysisUnitResults::RunId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisUnitResults::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(AnalysisRuns::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum AnalysisRuns {
    Table,
    Id,
    SessionId,
    OwnerId,
    Status,
    BlobUrl,
    SandboxId,
    FilePath,
    UnitList,
    UnitStatus,
    UnitErrors,
    Summary,
    ReportUrl,
    Error,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum AnalysisUnitResults {
    Table,
    Id,
    RunId,
    UnitName,
    BusinessAnalysis,
    Code,
    CodeExplanation,
    ChartUrl,
    AnalysisSteps,
    CreatedAt,
    UpdatedAt,
}
