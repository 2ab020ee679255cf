use anyhow::Result;

use crate::logic::TesterAssets;

pub mod catalog;

/// Everything one scenario iteration may read.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx<'a> {
    pub seed: u64,
    pub assets: &'a TesterAssets,
    pub verbose: bool,
}

pub type ScenarioCheck = fn(&ScenarioCtx<'_>) -> Result<()>;

// Logic test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub check: ScenarioCheck,
}

impl TestScenario {
    #[must_use]
    pub const fn new(key: &'static str, name: &'static str, check: ScenarioCheck) -> Self {
        Self { key, name, check }
    }

    /// # Errors
    ///
    /// Returns the first violated expectation.
    pub fn run(&self, ctx: &ScenarioCtx<'_>) -> Result<()> {
        (self.check)(ctx)
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = name.to_lowercase();
    catalog::catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.key == key)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog::catalog_scenarios()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.name))
        .collect()
}

pub fn all_scenario_keys() -> Vec<String> {
    list_scenarios()
        .into_iter()
        .map(|(key, _)| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let scenario = get_scenario("Undo-Roundtrip").unwrap();
        assert_eq!(scenario.key, "undo-roundtrip");
        assert!(get_scenario("smoke").is_none());
    }

    #[test]
    fn every_listed_scenario_resolves() {
        let keys = all_scenario_keys();
        assert_eq!(keys.len(), 7);
        for key in keys {
            assert!(get_scenario(&key).is_some(), "{key}");
        }
    }
}
