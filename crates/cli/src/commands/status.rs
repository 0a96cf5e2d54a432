use anyhow::Context;
use sqlmig::{MigrationConfig, MigrationStatus, Migrator, PoolConfig};

pub async fn run(database_url: &str, config: &MigrationConfig, pool: &PoolConfig, json: bool) -> anyhow::Result<()> {
    let db = sqlmig::connect(database_url, pool)
        .await
        .context("error connecting to database")?;

    let statuses = Migrator::from_config(config).status(db.as_ref()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        print!("{}", render(&statuses));
    }
    Ok(())
}

fn render(statuses: &[MigrationStatus]) -> String {
    if statuses.is_empty() {
        return "No migrations found\n".to_string();
    }

    let mut out = String::new();
    for status in statuses {
        let state = if status.applied { "applied" } else { "pending" };
        out.push_str(&format!("  {:<8} {}\n", state, status.name));
    }

    let pending = statuses.iter().filter(|status| !status.applied).count();
    out.push_str(&format!(
        "{} applied, {} pending\n",
        statuses.len() - pending,
        pending
    ));
    out
}
