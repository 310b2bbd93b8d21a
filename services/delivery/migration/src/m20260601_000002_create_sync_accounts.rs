use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncAccounts::CustomerId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncAccounts::PanelAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncAccounts::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncAccounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncAccounts {
    Table,
    CustomerId,
    PanelAccountId,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}
