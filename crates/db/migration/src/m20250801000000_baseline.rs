use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(uuid_col(Users::Uuid))
                    .col(ColumnDef::new(Users::Username).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::ApiToken).string().not_null())
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_uuid")
                    .table(Users::Table)
                    .col(Users::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_api_token")
                    .table(Users::Table)
                    .col(Users::ApiToken)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Accounts::Table)
                    .col(pk_id_col(manager, Accounts::Id))
                    .col(uuid_col(Accounts::Uuid))
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Description).text())
                    .col(fk_id_col(manager, Accounts::UserId))
                    // No FK here: images references accounts, so the constraint
                    // would be circular. Ownership is enforced in the model layer
                    // and the pointer is cleared explicitly on image deletion.
                    .col(fk_id_nullable_col(manager, Accounts::MainImageId))
                    .col(timestamp_col(Accounts::CreatedAt))
                    .col(timestamp_col(Accounts::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_accounts_user_id")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_accounts_uuid")
                    .table(Accounts::Table)
                    .col(Accounts::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_accounts_user_id")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Images::Table)
                    .col(pk_id_col(manager, Images::Id))
                    .col(uuid_col(Images::Uuid))
                    .col(ColumnDef::new(Images::Filename).string().not_null())
                    .col(ColumnDef::new(Images::FilePath).string().not_null())
                    .col(ColumnDef::new(Images::Prompt).text().not_null())
                    .col(ColumnDef::new(Images::NegativePrompt).text())
                    .col(ColumnDef::new(Images::Width).integer().not_null())
                    .col(ColumnDef::new(Images::Height).integer().not_null())
                    .col(ColumnDef::new(Images::Steps).integer().not_null())
                    .col(ColumnDef::new(Images::Seed).big_integer())
                    .col(ColumnDef::new(Images::Description).text())
                    .col(fk_id_col(manager, Images::UserId))
                    .col(fk_id_nullable_col(manager, Images::AccountId))
                    .col(
                        ColumnDef::new(Images::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(Images::CreatedAt))
                    .col(timestamp_col(Images::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_user_id")
                            .from(Images::Table, Images::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_account_id")
                            .from(Images::Table, Images::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_images_uuid")
                    .table(Images::Table)
                    .col(Images::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_images_user_id")
                    .table(Images::Table)
                    .col(Images::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_images_account_id")
                    .table(Images::Table)
                    .col(Images::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Images::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Uuid,
    Username,
    Email,
    ApiToken,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    UserId,
    MainImageId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Images {
    Table,
    Id,
    Uuid,
    Filename,
    FilePath,
    Prompt,
    NegativePrompt,
    Width,
    Height,
    Steps,
    Seed,
    Description,
    UserId,
    AccountId,
    IsDeleted,
    CreatedAt,
    UpdatedAt,
}
