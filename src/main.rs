use dotenv::dotenv;
use foodgram_backend::{config::Config, db::DBClient, loader, tracing_config};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Dropping the guard flushes the file writer, keep it for all of main
    let _guard = tracing_config::init_tracing();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = DBClient::new(pool);

    if let Err(err) = db_client.migrate().await {
        tracing::error!("Failed to apply migrations: {}", err);
        std::process::exit(1);
    }
    tracing::info!("Schema is up to date");

    if let Some(path) = &config.ingredients_path {
        match loader::load_ingredients_file(&db_client, path).await {
            Ok(inserted) => tracing::info!(inserted, "Ingredient import finished"),
            Err(err) => {
                tracing::error!("Ingredient import failed: {}", err);
                std::process::exit(1);
            }
        }
    }
}
