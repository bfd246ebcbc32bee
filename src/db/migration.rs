use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    // Reorg-detection buffer of every observed block
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS staging (
            block INTEGER NOT NULL,
            fromaddr TEXT,
            toaddr TEXT,
            blockts INTEGER NOT NULL,
            bkhash TEXT NOT NULL,
            txhash TEXT NOT NULL,
            value TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // Canonical transfers touching tracked addresses
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transfers (
            block INTEGER NOT NULL,
            fromaddr TEXT,
            toaddr TEXT,
            blockts INTEGER NOT NULL,
            bkhash TEXT NOT NULL,
            txhash TEXT NOT NULL,
            value TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tracked_addresses (
            address TEXT PRIMARY KEY,
            checked INTEGER NOT NULL,
            registered_block INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 0
        )"
    )
    .execute(pool)
    .await?;

    // NULL addresses compare equal here so empty-block rows deduplicate too
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_staging_unique
         ON staging(IFNULL(fromaddr, ''), IFNULL(toaddr, ''), txhash, value)"
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_block ON staging(block)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_fromaddr ON staging(fromaddr)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_toaddr ON staging(toaddr)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transfers_unique
         ON transfers(IFNULL(fromaddr, ''), IFNULL(toaddr, ''), txhash, value)"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transfers_pair_time
         ON transfers(fromaddr, toaddr, blockts)"
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_block ON transfers(block)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tracked_registered
         ON tracked_addresses(registered_block)"
    )
    .execute(pool)
    .await?;

    info!("Database migrations completed successfully");
    Ok(())
}
