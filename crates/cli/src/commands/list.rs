use anyhow::Context;
use sqlmig::{MigrationConfig, Migrator};

pub fn run(config: &MigrationConfig) -> anyhow::Result<()> {
    let names = Migrator::from_config(config)
        .discover()
        .context("error listing migrations")?;

    for name in names {
        println!("{}", name);
    }
    Ok(())
}
