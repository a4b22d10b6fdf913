use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};

use crate::{
    auth::store::{NewUser, StoreError, StoreResult, UserRecord, UserRepository, username_key},
    db::entities::{prelude::User, user},
};

use super::{DaoBase, store_err};

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = User;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl From<user::Model> for UserRecord {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
            last_login_at: model.last_login_at.map(|at| at.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[async_trait]
impl UserRepository for UserDao {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let model = User::find()
            .filter(user::Column::UsernameKey.eq(username_key(username)))
            .one(self.db())
            .await
            .map_err(store_err)?;
        Ok(model.map(UserRecord::from))
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let model = User::find_by_id(id)
            .one(self.db())
            .await
            .map_err(store_err)?;
        Ok(model.map(UserRecord::from))
    }

    async fn add(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let now = new_user.created_at.fixed_offset();
        let model = user::ActiveModel {
            username_key: Set(username_key(&new_user.username)),
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let created = model.insert(self.db()).await.map_err(store_err)?;
        Ok(created.into())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = User::delete_by_id(id)
            .exec(self.db())
            .await
            .map_err(store_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let at = at.fixed_offset();
        let result = User::update_many()
            .col_expr(user::Column::LastLoginAt, Expr::value(at))
            .col_expr(user::Column::UpdatedAt, Expr::value(at))
            .filter(user::Column::Id.eq(id))
            .exec(self.db())
            .await
            .map_err(store_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use super::*;

    fn ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user_model(id: i64, username: &str) -> user::Model {
        user::Model {
            id,
            username: username.to_string(),
            username_key: username.to_lowercase(),
            password_hash: "$argon2id$stored".to_string(),
            last_login_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn find_by_username_maps_model_to_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(3, "Alice")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let record = dao
            .find_by_username("ALICE")
            .await
            .expect("lookup should succeed")
            .expect("user should exist");

        assert_eq!(record.id, 3);
        assert_eq!(record.username, "Alice");
        assert_eq!(record.password_hash, "$argon2id$stored");
        assert_eq!(record.created_at, ts().with_timezone(&Utc));
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_missing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let record = dao.find_by_id(42).await.expect("lookup should succeed");

        assert!(record.is_none());
    }

    #[tokio::test]
    async fn add_returns_inserted_record() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(9, "bob")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let record = dao
            .add(NewUser {
                username: "bob".to_string(),
                password_hash: "$argon2id$stored".to_string(),
                created_at: ts().with_timezone(&Utc),
            })
            .await
            .expect("insert should succeed");

        assert_eq!(record.id, 9);
        assert_eq!(record.username, "bob");
    }

    #[tokio::test]
    async fn delete_reports_missing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0)])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao.delete(5).await.expect_err("delete should fail");

        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn delete_succeeds_when_row_removed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();
        let dao = UserDao::new(&db);

        dao.delete(5).await.expect("delete should succeed");
    }

    #[tokio::test]
    async fn set_last_login_requires_existing_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(0)])
            .into_connection();
        let dao = UserDao::new(&db);
        let now = ts().with_timezone(&Utc);

        dao.set_last_login(1, now)
            .await
            .expect("update should succeed");
        let err = dao
            .set_last_login(2, now)
            .await
            .expect_err("missing user should fail");

        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn backend_failures_surface_as_backend_errors() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("boom".to_string())])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao
            .find_by_username("alice")
            .await
            .expect_err("lookup should fail");

        assert!(matches!(err, StoreError::Backend(_)));
    }
}
