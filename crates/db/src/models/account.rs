use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{account, image},
    models::{ids, image::Image},
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Account not found")]
    AccountNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Image does not belong to this account")]
    ImageNotOwnedByAccount,
}

/// A social-media persona. `main_image_id` points at the canonical base image
/// whose seed anchors all derived generations for this account; it must always
/// reference an image owned by the same account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub main_image_id: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateAccount {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Account with its main image hydrated, as returned by the account detail
/// endpoint and consumed by the generation policy.
#[derive(Debug, Clone, Serialize, TS)]
pub struct AccountWithMainImage {
    pub account: Account,
    pub main_image: Option<Image>,
}

impl Account {
    fn from_model(model: account::Model, main_image_uuid: Option<Uuid>) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            main_image_id: main_image_uuid,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn hydrate<C: ConnectionTrait>(db: &C, model: account::Model) -> Result<Self, DbErr> {
        let main_image_uuid = match model.main_image_id {
            Some(row_id) => ids::image_uuid_by_id(db, row_id).await?,
            None => None,
        };
        Ok(Self::from_model(model, main_image_uuid))
    }

    pub async fn find_all_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };

        let records = account::Entity::find()
            .filter(account::Column::UserId.eq(user_row_id))
            .order_by_desc(account::Column::CreatedAt)
            .all(db)
            .await?;

        let mut accounts = Vec::with_capacity(records.len());
        for record in records {
            accounts.push(Self::hydrate(db, record).await?);
        }
        Ok(accounts)
    }

    pub async fn find_by_id_for_user<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let Some(record) = find_model_for_user(db, id, user_id).await? else {
            return Ok(None);
        };
        Ok(Some(Self::hydrate(db, record).await?))
    }

    /// Account plus its main image in one read, used by derived generation.
    pub async fn with_main_image<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountWithMainImage>, DbErr> {
        let Some(record) = find_model_for_user(db, id, user_id).await? else {
            return Ok(None);
        };

        let main_image = match record.main_image_id {
            Some(image_row_id) => image::Entity::find_by_id(image_row_id)
                .one(db)
                .await?
                .map(|model| Image::from_model_with_account(model, Some(record.uuid))),
            None => None,
        };

        let main_image_uuid = main_image.as_ref().map(|img| img.id);
        Ok(Some(AccountWithMainImage {
            account: Self::from_model(record, main_image_uuid),
            main_image,
        }))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateAccount,
        account_id: Uuid,
    ) -> Result<Self, AccountError> {
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let now = Utc::now();
        let active = account::ActiveModel {
            uuid: Set(account_id),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            user_id: Set(user_row_id),
            main_image_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model, None))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateAccount,
    ) -> Result<Self, AccountError> {
        let record = account::Entity::find()
            .filter(account::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        let mut active: account::ActiveModel = record.into();
        if let Some(name) = payload.name.clone() {
            active.name = Set(name);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Self::hydrate(db, updated).await.map_err(AccountError::from)
    }

    /// Deletes the account and all of its images. Returns the file paths of
    /// the deleted images so the caller can remove them from disk.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Vec<String>, DbErr> {
        let Some(record) = account::Entity::find()
            .filter(account::Column::Uuid.eq(id))
            .one(db)
            .await?
        else {
            return Ok(Vec::new());
        };

        let file_paths: Vec<String> = image::Entity::find()
            .filter(image::Column::AccountId.eq(record.id))
            .all(db)
            .await?
            .into_iter()
            .map(|img| img.file_path)
            .collect();

        image::Entity::delete_many()
            .filter(image::Column::AccountId.eq(record.id))
            .exec(db)
            .await?;
        account::Entity::delete_many()
            .filter(account::Column::Id.eq(record.id))
            .exec(db)
            .await?;

        Ok(file_paths)
    }

    /// Points the account at a new main image. The image must belong to this
    /// account; cross-account reassignment is rejected and leaves the pointer
    /// unchanged. Setting the same image again is a no-op success.
    pub async fn set_main_image<C: ConnectionTrait>(
        db: &C,
        account_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), AccountError> {
        let account_record = account::Entity::find()
            .filter(account::Column::Uuid.eq(account_id))
            .one(db)
            .await?
            .ok_or(AccountError::AccountNotFound)?;

        let image_record = image::Entity::find()
            .filter(image::Column::Uuid.eq(image_id))
            .one(db)
            .await?
            .ok_or(AccountError::ImageNotOwnedByAccount)?;

        if image_record.account_id != Some(account_record.id) {
            return Err(AccountError::ImageNotOwnedByAccount);
        }

        if account_record.main_image_id == Some(image_record.id) {
            return Ok(());
        }

        let image_row_id = image_record.id;
        let mut active: account::ActiveModel = account_record.into();
        active.main_image_id = Set(Some(image_row_id));
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    /// Clears any main-image pointers at the given image row id. Called before
    /// hard-deleting an image since sqlite does not enforce the constraint.
    pub(crate) async fn clear_main_image_refs<C: ConnectionTrait>(
        db: &C,
        image_row_id: i64,
    ) -> Result<(), DbErr> {
        let referencing = account::Entity::find()
            .filter(account::Column::MainImageId.eq(image_row_id))
            .all(db)
            .await?;
        for record in referencing {
            let mut active: account::ActiveModel = record.into();
            active.main_image_id = Set(None);
            active.updated_at = Set(Utc::now().into());
            active.update(db).await?;
        }
        Ok(())
    }
}

async fn find_model_for_user<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<account::Model>, DbErr> {
    let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
        return Ok(None);
    };
    account::Entity::find()
        .filter(account::Column::Uuid.eq(id))
        .filter(account::Column::UserId.eq(user_row_id))
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use sea_orm::{Database, DatabaseConnection};
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        image::{CreateImage, Image},
        user::{CreateUser, User},
    };

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("connect in-memory sqlite");
        db_migration::Migrator::up(&db, None)
            .await
            .expect("run migrations");
        db
    }

    async fn seed_user(db: &DatabaseConnection, token: &str) -> User {
        User::create(
            db,
            &CreateUser {
                username: format!("user-{token}"),
                email: format!("{token}@example.com"),
                api_token: token.to_string(),
            },
        )
        .await
        .expect("create user")
    }

    async fn seed_account(db: &DatabaseConnection, user: &User, name: &str) -> Account {
        Account::create(
            db,
            user.id,
            &CreateAccount {
                name: name.to_string(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create account")
    }

    async fn seed_image(db: &DatabaseConnection, user: &User, account: &Account) -> Image {
        Image::create(
            db,
            user.id,
            &CreateImage {
                filename: "base.png".to_string(),
                file_path: "/tmp/base.png".to_string(),
                prompt: "studio portrait".to_string(),
                negative_prompt: None,
                width: 512,
                height: 512,
                steps: 20,
                seed: Some(42),
                description: None,
                account_id: Some(account.id),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create image")
    }

    #[tokio::test]
    async fn accounts_are_scoped_to_their_owner() {
        let db = setup_db().await;
        let owner = seed_user(&db, "owner").await;
        let other = seed_user(&db, "other").await;
        let account = seed_account(&db, &owner, "wanderer").await;

        let mine = Account::find_by_id_for_user(&db, account.id, owner.id)
            .await
            .expect("query as owner");
        assert!(mine.is_some());

        let theirs = Account::find_by_id_for_user(&db, account.id, other.id)
            .await
            .expect("query as other user");
        assert!(theirs.is_none());

        assert_eq!(
            Account::find_all_for_user(&db, other.id)
                .await
                .expect("list for other user")
                .len(),
            0
        );
    }

    #[tokio::test]
    async fn set_main_image_accepts_owned_image_and_is_idempotent() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner").await;
        let account = seed_account(&db, &user, "wanderer").await;
        let image = seed_image(&db, &user, &account).await;

        Account::set_main_image(&db, account.id, image.id)
            .await
            .expect("set main image");
        Account::set_main_image(&db, account.id, image.id)
            .await
            .expect("setting the same image again succeeds");

        let reloaded = Account::find_by_id_for_user(&db, account.id, user.id)
            .await
            .expect("reload account")
            .expect("account exists");
        assert_eq!(reloaded.main_image_id, Some(image.id));
    }

    #[tokio::test]
    async fn set_main_image_rejects_foreign_image() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner").await;
        let account_a = seed_account(&db, &user, "first").await;
        let account_b = seed_account(&db, &user, "second").await;
        let image_b = seed_image(&db, &user, &account_b).await;

        let result = Account::set_main_image(&db, account_a.id, image_b.id).await;
        assert!(matches!(
            result,
            Err(AccountError::ImageNotOwnedByAccount)
        ));

        let reloaded = Account::find_by_id_for_user(&db, account_a.id, user.id)
            .await
            .expect("reload account")
            .expect("account exists");
        assert_eq!(reloaded.main_image_id, None);
    }

    #[tokio::test]
    async fn with_main_image_hydrates_the_seed_anchor() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner").await;
        let account = seed_account(&db, &user, "wanderer").await;
        let image = seed_image(&db, &user, &account).await;
        Account::set_main_image(&db, account.id, image.id)
            .await
            .expect("set main image");

        let detail = Account::with_main_image(&db, account.id, user.id)
            .await
            .expect("load account detail")
            .expect("account exists");
        let main = detail.main_image.expect("main image hydrated");
        assert_eq!(main.id, image.id);
        assert_eq!(main.seed, Some(42));
    }

    #[tokio::test]
    async fn delete_returns_image_paths_for_cleanup() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner").await;
        let account = seed_account(&db, &user, "wanderer").await;
        seed_image(&db, &user, &account).await;

        let paths = Account::delete(&db, account.id).await.expect("delete");
        assert_eq!(paths, vec!["/tmp/base.png".to_string()]);

        let gone = Account::find_by_id_for_user(&db, account.id, user.id)
            .await
            .expect("reload account");
        assert!(gone.is_none());
    }
}
