use anyhow::Context;
use cohort_reader::config::TransfusionStudyConfig;
use cohort_reader::study::transfusion;

fn main() -> anyhow::Result<()> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TransfusionStudyConfig::default();
    let report = transfusion::run(&config).context("transfusion mortality analysis")?;
    println!("{report}");
    Ok(())
}
