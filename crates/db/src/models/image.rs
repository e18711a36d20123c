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
    entities::image,
    models::{account::Account, ids},
};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Image not found")]
    ImageNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Account not found")]
    AccountNotFound,
}

/// A generated image. `seed` is the diffusion seed recovered from the
/// backend's generation info, or `None` when the backend did not report one.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Image {
    pub id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    pub steps: i32,
    pub seed: Option<i64>,
    pub description: Option<String>,
    pub account_id: Option<Uuid>,
    pub is_deleted: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateImage {
    pub filename: String,
    pub file_path: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    pub steps: i32,
    pub seed: Option<i64>,
    pub description: Option<String>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateImage {
    pub description: Option<String>,
}

/// Listing filters. Deleted images are hidden unless explicitly requested.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ImageFilter {
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl Image {
    pub(crate) fn from_model_with_account(
        model: image::Model,
        account_uuid: Option<Uuid>,
    ) -> Self {
        Self {
            id: model.uuid,
            filename: model.filename,
            file_path: model.file_path,
            prompt: model.prompt,
            negative_prompt: model.negative_prompt,
            width: model.width,
            height: model.height,
            steps: model.steps,
            seed: model.seed,
            description: model.description,
            account_id: account_uuid,
            is_deleted: model.is_deleted,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn hydrate<C: ConnectionTrait>(db: &C, model: image::Model) -> Result<Self, DbErr> {
        let account_uuid = match model.account_id {
            Some(row_id) => ids::account_uuid_by_id(db, row_id).await?,
            None => None,
        };
        Ok(Self::from_model_with_account(model, account_uuid))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        data: &CreateImage,
        image_id: Uuid,
    ) -> Result<Self, ImageError> {
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(ImageError::UserNotFound)?;
        let account_row_id = match data.account_id {
            Some(account_uuid) => Some(
                ids::account_id_by_uuid(db, account_uuid)
                    .await?
                    .ok_or(ImageError::AccountNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = image::ActiveModel {
            uuid: Set(image_id),
            filename: Set(data.filename.clone()),
            file_path: Set(data.file_path.clone()),
            prompt: Set(data.prompt.clone()),
            negative_prompt: Set(data.negative_prompt.clone()),
            width: Set(data.width),
            height: Set(data.height),
            steps: Set(data.steps),
            seed: Set(data.seed),
            description: Set(data.description.clone()),
            user_id: Set(user_row_id),
            account_id: Set(account_row_id),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model_with_account(model, data.account_id))
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

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        filter: &ImageFilter,
    ) -> Result<Vec<Self>, ImageError> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };

        let mut query = image::Entity::find().filter(image::Column::UserId.eq(user_row_id));
        if let Some(account_uuid) = filter.account_id {
            let account_row_id = ids::account_id_by_uuid(db, account_uuid)
                .await?
                .ok_or(ImageError::AccountNotFound)?;
            query = query.filter(image::Column::AccountId.eq(account_row_id));
        }
        if !filter.include_deleted {
            query = query.filter(image::Column::IsDeleted.eq(false));
        }

        let records = query
            .order_by_desc(image::Column::CreatedAt)
            .all(db)
            .await?;

        let mut images = Vec::with_capacity(records.len());
        for record in records {
            images.push(Self::hydrate(db, record).await?);
        }
        Ok(images)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateImage,
    ) -> Result<Self, ImageError> {
        let record = image::Entity::find()
            .filter(image::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ImageError::ImageNotFound)?;

        let mut active: image::ActiveModel = record.into();
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Self::hydrate(db, updated).await.map_err(ImageError::from)
    }

    /// Marks the image deleted without touching the file on disk, so it can
    /// still be restored and keeps serving as a seed anchor if it is an
    /// account's main image.
    pub async fn soft_delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Self, ImageError> {
        set_deleted_flag(db, id, true).await
    }

    pub async fn restore<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Self, ImageError> {
        set_deleted_flag(db, id, false).await
    }

    /// Permanently removes the image row, clearing any account main-image
    /// pointer that references it first. Returns the on-disk path so the
    /// caller can delete the file.
    pub async fn hard_delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<String, ImageError> {
        let record = image::Entity::find()
            .filter(image::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ImageError::ImageNotFound)?;

        Account::clear_main_image_refs(db, record.id).await?;

        let file_path = record.file_path.clone();
        image::Entity::delete_by_id(record.id).exec(db).await?;
        Ok(file_path)
    }

    pub async fn set_description<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        description: String,
    ) -> Result<Self, ImageError> {
        Self::update(
            db,
            id,
            &UpdateImage {
                description: Some(description),
            },
        )
        .await
    }
}

async fn set_deleted_flag<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    deleted: bool,
) -> Result<Image, ImageError> {
    let record = image::Entity::find()
        .filter(image::Column::Uuid.eq(id))
        .one(db)
        .await?
        .ok_or(ImageError::ImageNotFound)?;

    let mut active: image::ActiveModel = record.into();
    active.is_deleted = Set(deleted);
    active.updated_at = Set(Utc::now().into());

    let updated = active.update(db).await?;
    Image::hydrate(db, updated).await.map_err(ImageError::from)
}

async fn find_model_for_user<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<image::Model>, DbErr> {
    let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
        return Ok(None);
    };
    image::Entity::find()
        .filter(image::Column::Uuid.eq(id))
        .filter(image::Column::UserId.eq(user_row_id))
        .one(db)
        .await
}
