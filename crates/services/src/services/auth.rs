use async_trait::async_trait;
use db::{models::user::User, DbConn, DbErr};

/// Resolves the authenticated user for a bearer token. Injected behind a
/// trait so route tests can swap in a canned principal.
#[async_trait]
pub trait CurrentUserProvider: Send + Sync {
    async fn user_for_token(&self, db: &DbConn, token: &str) -> Result<Option<User>, DbErr>;
}

/// Production provider: tokens are looked up in the users table.
#[derive(Debug, Clone, Default)]
pub struct DbTokenUserProvider;

#[async_trait]
impl CurrentUserProvider for DbTokenUserProvider {
    async fn user_for_token(&self, db: &DbConn, token: &str) -> Result<Option<User>, DbErr> {
        User::find_by_api_token(db, token).await
    }
}

/// Always resolves to the same user, regardless of token. Used by tests.
#[derive(Debug, Clone)]
pub struct FixedUserProvider {
    user: User,
}

impl FixedUserProvider {
    pub fn new(user: User) -> Self {
        Self { user }
    }
}

#[async_trait]
impl CurrentUserProvider for FixedUserProvider {
    async fn user_for_token(&self, _db: &DbConn, _token: &str) -> Result<Option<User>, DbErr> {
        Ok(Some(self.user.clone()))
    }
}
