use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkflowRuns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WorkflowRuns::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(WorkflowRuns::Kind).string().not_null())
                    .col(ColumnDef::new(WorkflowRuns::RootPath).string().not_null())
                    .col(ColumnDef::new(WorkflowRuns::Stage).string().not_null())
                    .col(ColumnDef::new(WorkflowRuns::Error).string().null())
                    .col(ColumnDef::new(WorkflowRuns::CreatedAt).string().not_null())
                    .col(ColumnDef::new(WorkflowRuns::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DiscRuns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DiscRuns::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(DiscRuns::WorkflowId).string().not_null())
                    .col(ColumnDef::new(DiscRuns::FolderName).string().not_null())
                    .col(ColumnDef::new(DiscRuns::Status).string().not_null())
                    .col(ColumnDef::new(DiscRuns::Error).string().null())
                    .col(ColumnDef::new(DiscRuns::CreatedAt).string().not_null())
                    .col(ColumnDef::new(DiscRuns::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_disc_runs_workflow_id")
                    .table(DiscRuns::Table)
                    .col(DiscRuns::WorkflowId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkflowCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowCheckpoints::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkflowCheckpoints::WorkflowId).string().not_null())
                    .col(ColumnDef::new(WorkflowCheckpoints::CheckpointKey).string().not_null())
                    .col(ColumnDef::new(WorkflowCheckpoints::PayloadJson).text().not_null())
                    .col(ColumnDef::new(WorkflowCheckpoints::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_checkpoints_workflow_key")
                    .table(WorkflowCheckpoints::Table)
                    .col(WorkflowCheckpoints::WorkflowId)
                    .col(WorkflowCheckpoints::CheckpointKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkflowSignals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowSignals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkflowSignals::WorkflowId).string().not_null())
                    .col(ColumnDef::new(WorkflowSignals::SignalType).string().not_null())
                    .col(ColumnDef::new(WorkflowSignals::PayloadJson).text().not_null())
                    .col(ColumnDef::new(WorkflowSignals::Consumed).boolean().not_null())
                    .col(ColumnDef::new(WorkflowSignals::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_signals_workflow_type_consumed")
                    .table(WorkflowSignals::Table)
                    .col(WorkflowSignals::WorkflowId)
                    .col(WorkflowSignals::SignalType)
                    .col(WorkflowSignals::Consumed)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(WorkflowSignals::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(WorkflowCheckpoints::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(DiscRuns::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(WorkflowRuns::Table).to_owned()).await
    }
}

#[derive(Iden)]
enum WorkflowRuns {
    Table,
    Id,
    Kind,
    RootPath,
    Stage,
    Error,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum DiscRuns {
    Table,
    Id,
    WorkflowId,
    FolderName,
    Status,
    Error,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum WorkflowCheckpoints {
    Table,
    Id,
    WorkflowId,
    CheckpointKey,
    PayloadJson,
    CreatedAt,
}

#[derive(Iden)]
enum WorkflowSignals {
    Table,
    Id,
    WorkflowId,
    SignalType,
    PayloadJson,
    Consumed,
    CreatedAt,
}
