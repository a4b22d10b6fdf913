use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    auth::store::{
        NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult,
    },
    db::entities::{prelude::RefreshToken, refresh_token},
};

use super::{DaoBase, store_err};

#[derive(Clone)]
pub struct RefreshTokenDao {
    db: DatabaseConnection,
}

impl DaoBase for RefreshTokenDao {
    type Entity = RefreshToken;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl From<refresh_token::Model> for RefreshTokenRecord {
    fn from(model: refresh_token::Model) -> Self {
        Self {
            jti: model.jti,
            user_id: model.user_id,
            secret_hash: model.secret_hash,
            user_agent: model.user_agent,
            ip: model.ip,
            expires_at: model.expires_at.with_timezone(&Utc),
            revoked: model.revoked,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<NewRefreshToken> for refresh_token::ActiveModel {
    fn from(token: NewRefreshToken) -> Self {
        Self {
            jti: Set(token.jti),
            secret_hash: Set(token.secret_hash),
            user_id: Set(token.user_id),
            user_agent: Set(token.user_agent),
            ip: Set(token.ip),
            expires_at: Set(token.expires_at.fixed_offset()),
            revoked: Set(false),
            created_at: Set(token.created_at.fixed_offset()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenDao {
    async fn create(&self, token: NewRefreshToken) -> StoreResult<()> {
        refresh_token::ActiveModel::from(token)
            .insert(self.db())
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn revoke_by_jti(&self, jti: Uuid) -> StoreResult<()> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .filter(refresh_token::Column::Jti.eq(jti))
            .exec(self.db())
            .await
            .map_err(store_err)?;
        if result.rows_affected > 0 {
            return Ok(());
        }

        // some backends only count changed rows; an already revoked record is fine
        match RefreshToken::find_by_id(jti)
            .one(self.db())
            .await
            .map_err(store_err)?
        {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn revoke_all_by_user(&self, user_id: i64) -> StoreResult<u64> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(self.db())
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected)
    }

    async fn find_by_jti(&self, jti: Uuid) -> StoreResult<RefreshTokenRecord> {
        RefreshToken::find_by_id(jti)
            .one(self.db())
            .await
            .map_err(store_err)?
            .map(RefreshTokenRecord::from)
            .ok_or(StoreError::NotFound)
    }

    async fn rotate(
        &self,
        old_jti: Uuid,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let txn = self.db().begin().await.map_err(store_err)?;

        // the conditional UPDATE holds the row lock until commit, so a
        // concurrent loser only sees zero rows once the replacement is visible
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .filter(refresh_token::Column::Jti.eq(old_jti))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now.fixed_offset()))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        if result.rows_affected != 1 {
            txn.rollback().await.map_err(store_err)?;
            return Ok(false);
        }

        refresh_token::ActiveModel::from(replacement)
            .insert(&txn)
            .await
            .map_err(store_err)?;
        txn.commit().await.map_err(store_err)?;
        Ok(true)
    }
}
