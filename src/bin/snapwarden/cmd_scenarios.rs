use anyhow::Result;
use std::collections::BTreeMap;

use snapwarden::retention::ScenarioSpec;
use snapwarden::Config;

use crate::util::print_json;

pub fn exec(cfg: &Config, json: bool) -> Result<()> {
    if json {
        let specs: BTreeMap<&str, ScenarioSpec> =
            cfg.scenarios.iter().map(|s| (s.name.as_str(), s.to_spec())).collect();
        return print_json(&specs);
    }

    for s in cfg.scenarios.iter() {
        let marker = if s.name == cfg.default_scenario { " (default)" } else { "" };
        println!("{}{}: grace {}h", s.name, marker, s.grace_period.num_hours());
        for t in &s.tiers {
            println!("  {:<8} [{}, {})", t.label(), t.start, t.end);
        }
    }
    Ok(())
}
