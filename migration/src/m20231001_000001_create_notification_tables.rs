use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // uuid_generate_v4() backs every primary key below
        manager
            .get_connection()
            .execute_unprepared(r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp";"#)
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProposalStatuses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProposalStatuses::ProposalId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ProposalStatuses::Author)
                            .string_len(15)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProposalStatuses::Status)
                            .string_len(60)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProposalStatuses::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("uuid_generate_v4()")),
                    )
                    .col(
                        ColumnDef::new(ProposalStatuses::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProposalStatuses::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Name).string_len(160).null())
                    .col(
                        ColumnDef::new(Users::TelegramAccount)
                            .string_len(160)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::WaxAccount)
                            .string_len(15)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::ChatId)
                            .string_len(60)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("uuid_generate_v4()")),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Users::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Lookup by telegram handle, not unique
        manager
            .create_index(
                Index::create()
                    .name("ix_users_telegram_account")
                    .table(Users::Table)
                    .col(Users::TelegramAccount)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscriptions::ProposalId)
                            .integer()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::UserId)
                            .uuid()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("uuid_generate_v4()")),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_proposal_id")
                            .from(Subscriptions::Table, Subscriptions::ProposalId)
                            .to(ProposalStatuses::Table, ProposalStatuses::ProposalId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_user_id")
                            .from(Subscriptions::Table, Subscriptions::UserId)
                            .to(Users::Table, Users::Uuid),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("ix_users_telegram_account")
                    .table(Users::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ProposalStatuses::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared(r#"DROP EXTENSION IF EXISTS "uuid-ossp";"#)
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ProposalStatuses {
    Table,
    ProposalId,
    Author,
    Status,
    Uuid,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Name,
    TelegramAccount,
    WaxAccount,
    ChatId,
    Uuid,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    ProposalId,
    UserId,
    Uuid,
    CreatedAt,
    UpdatedAt,
}
