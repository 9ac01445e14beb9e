use anyhow::Context;
use chrono::Utc;

use familynet_events::TracingSink;
use familynet_sim::SimConfig;

fn main() -> anyhow::Result<()> {
    let config = SimConfig::from_env()?;
    familynet_observability::init_with(config.log_format);

    tracing::info!(policy = ?config.policy, "starting family network simulation");

    let report = familynet_sim::run(&config, Utc::now(), &mut TracingSink::new())?;

    let json = serde_json::to_string_pretty(&report).context("serializing final report")?;
    println!("{json}");
    Ok(())
}
