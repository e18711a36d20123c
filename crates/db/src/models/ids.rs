use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entities::{account, image, user};

pub async fn user_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .filter(user::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn account_id_by_uuid<C: ConnectionTrait>(
    db: &C,
    uuid: Uuid,
) -> Result<Option<i64>, DbErr> {
    account::Entity::find()
        .select_only()
        .column(account::Column::Id)
        .filter(account::Column::Uuid.eq(uuid))
        .into_tuple()
        .one(db)
        .await
}

pub async fn account_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    account::Entity::find()
        .select_only()
        .column(account::Column::Uuid)
        .filter(account::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}

pub async fn image_uuid_by_id<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<Uuid>, DbErr> {
    image::Entity::find()
        .select_only()
        .column(image::Column::Uuid)
        .filter(image::Column::Id.eq(id))
        .into_tuple()
        .one(db)
        .await
}
