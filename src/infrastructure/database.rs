use crate::entities::{
    collection_ressources, collections, comments, favorites, follows, likes, registration_keys,
    ressource_views, ressources, users,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let db_url = env::var("DATABASE_URL").unwrap_or_default();

    if db_url.starts_with("postgres://") {
        info!("🔄 Running SQLx migrations for PostgreSQL...");
        let pool = sqlx::PgPool::connect(&db_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
    } else {
        info!("🔄 Running SeaORM auto-migrations for SQLite...");
        let builder = db.get_database_backend();
        let schema = Schema::new(builder);

        let stmts = vec![
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(registration_keys::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(ressources::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(collections::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(collection_ressources::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(comments::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(likes::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(favorites::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(follows::Entity)
                .if_not_exists()
                .to_owned(),
            schema
                .create_table_from_entity(ressource_views::Entity)
                .if_not_exists()
                .to_owned(),
        ];

        for stmt in stmts {
            let stmt = builder.build(&stmt);
            let _ = db.execute(stmt).await;
        }

        // Pair/edge uniqueness lives in indexes, not entity columns
        for sql in [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_user_ressource ON likes(user_id, ressource_id);",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_user_ressource ON favorites(user_id, ressource_id);",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_follows_pair ON follows(follower_id, following_id);",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_collection_ressources_pair ON collection_ressources(collection_id, ressource_id);",
        ] {
            let _ = db
                .execute(sea_orm::Statement::from_string(builder, sql.to_string()))
                .await;
        }
    }

    Ok(())
}
