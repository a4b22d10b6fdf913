use sea_orm::{DatabaseConnection, EntityTrait};

pub trait DaoBase: Clone + Send + Sync + Sized {
    type Entity: EntityTrait + Send + Sync;

    fn from_db(db: DatabaseConnection) -> Self;

    fn new(db: &DatabaseConnection) -> Self {
        Self::from_db(db.clone())
    }

    fn db(&self) -> &DatabaseConnection;
}
