use anyhow::Context;
use sqlmig::{CancellationToken, MigrationConfig, Migrator, PoolConfig};

pub async fn run(database_url: &str, config: &MigrationConfig, pool: &PoolConfig) -> anyhow::Result<()> {
    let db = sqlmig::connect(database_url, pool)
        .await
        .context("error connecting to database")?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling migration run");
            on_interrupt.cancel();
        }
    });

    let report = Migrator::from_config(config)
        .migrate_with_cancellation(db.as_ref(), token)
        .await?;

    for name in &report.applied {
        println!("  applied  {}", name);
    }
    if report.is_noop() {
        println!("Database is up to date ({} migration(s) already applied)", report.skipped_count());
    } else {
        println!(
            "Applied {} migration(s), {} already applied, in {} ms",
            report.applied_count(),
            report.skipped_count(),
            report.elapsed.as_millis()
        );
    }
    Ok(())
}
