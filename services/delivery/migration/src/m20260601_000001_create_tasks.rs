use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tasks::Kind).string().not_null())
                    .col(ColumnDef::new(Tasks::Payload).json_binary().not_null())
                    .col(
                        ColumnDef::new(Tasks::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Tasks::Status).string().not_null())
                    .col(ColumnDef::new(Tasks::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::SentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Tasks::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Tasks::LastError).string())
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for dispatcher poll queries (claimable statuses ordered by due time).
        manager
            .create_index(
                Index::create()
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .col(Tasks::ScheduledAt)
                    .name("idx_tasks_status_scheduled_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Kind,
    Payload,
    IdempotencyKey,
    Status,
    ScheduledAt,
    SentAt,
    RetryCount,
    LastError,
    CreatedAt,
    UpdatedAt,
}
