use anyhow::Context;
use cohort_reader::config::SodiumOsmolarityConfig;
use cohort_reader::study::sodium_osmolarity;
use log::info;

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SodiumOsmolarityConfig::default();
    let pairs = sodium_osmolarity::run(&config).with_context(|| {
        format!(
            "sodium/osmolarity extraction from {}",
            config.database.display()
        )
    })?;
    info!(
        "{} pairs written to {}",
        pairs.len(),
        config.output.display()
    );
    Ok(())
}
