use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::user;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
}

/// Authenticated principal. The API token never leaves this crate through
/// serialization; it is only compared during auth resolution.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    #[ts(skip)]
    pub api_token: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub api_token: String,
}

impl User {
    fn from_model(model: user::Model) -> Self {
        Self {
            id: model.uuid,
            username: model.username,
            email: model.email,
            api_token: model.api_token,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        user::Entity::find().count(db).await
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateUser) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            username: Set(data.username.clone()),
            email: Set(data.email.clone()),
            api_token: Set(data.api_token.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_api_token<C: ConnectionTrait>(
        db: &C,
        token: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::ApiToken.eq(token))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }
}
