//! Built-in feature catalog.
//!
//! Features and scenarios execute strictly in the declaration order below.
//! Scenarios tagged `@visual` depend on a stable rendering environment and
//! are the usual candidates for `--skip-tags`.

use crate::common::split_csv;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<String>,
}

impl Scenario {
    fn new(name: &str, tags: &[&str], steps: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.iter().map(ToString::to_string).collect(),
            steps: steps.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub name: String,
    pub key: String,
    pub scenarios: Vec<Scenario>,
}

pub fn builtin_features() -> Vec<Feature> {
    vec![
        Feature {
            name: "Ant population".to_string(),
            key: "population".to_string(),
            scenarios: vec![
                Scenario::new(
                    "spawning workers registers them",
                    &[],
                    &[
                        "Given the simulation page is loaded",
                        "And the entity registry is reset",
                        "When I spawn 5 ants with job worker",
                        "Then at least 3 ants should be registered",
                    ],
                ),
                Scenario::new(
                    "census is exact after mixed spawns",
                    &[],
                    &[
                        "Given the simulation page is loaded",
                        "And the entity registry is reset",
                        "When I spawn 2 ants with job worker",
                        "And I spawn 3 ants with job forager",
                        "Then exactly 5 entities of type ant should exist",
                    ],
                ),
            ],
        },
        Feature {
            name: "Render layers".to_string(),
            key: "layers".to_string(),
            scenarios: vec![Scenario::new(
                "toggling the debug overlay twice restores it",
                &[],
                &[
                    "Given the simulation page is loaded",
                    "Then the UI_DEBUG layer should be enabled",
                    "When I toggle the UI_DEBUG layer",
                    "Then the UI_DEBUG layer should be disabled",
                    "When I toggle the UI_DEBUG layer",
                    "Then the UI_DEBUG layer should be enabled",
                ],
            )],
        },
        Feature {
            name: "Action dispatch".to_string(),
            key: "actions".to_string(),
            scenarios: vec![
                Scenario::new(
                    "pausing the simulation succeeds",
                    &[],
                    &[
                        "Given the simulation page is loaded",
                        "When I execute the pause action",
                        "Then the last action should succeed",
                        "When I execute the resume action",
                        "Then the last action should succeed",
                    ],
                ),
                Scenario::new(
                    "a malformed action is rejected gracefully",
                    &[],
                    &[
                        "Given the simulation page is loaded",
                        "When I execute the bogus-action action",
                        "Then the last action should fail",
                    ],
                ),
            ],
        },
        Feature {
            name: "Visual baseline".to_string(),
            key: "visual".to_string(),
            scenarios: vec![
                Scenario::new(
                    "the settled canvas matches its baseline",
                    &["@visual"],
                    &[
                        "Given the simulation page is loaded",
                        "When I wait 500 ms for the simulation to settle",
                        "Then the canvas should match the settled baseline within 5%",
                    ],
                ),
                Scenario::new(
                    "paused canvas is pixel-stable",
                    &["@visual", "@skip"],
                    &[
                        "Given the simulation page is loaded",
                        "When I execute the pause action",
                        "Then the canvas should match the paused baseline within 0%",
                    ],
                ),
            ],
        },
    ]
}

/// Narrows the catalog to the requested feature keys; `all` (or an empty
/// request) keeps everything. Unknown keys are reported back to the caller.
pub fn select_features(requested: &str) -> (Vec<Feature>, Vec<String>) {
    let keys = split_csv(requested);
    let all = builtin_features();
    if keys.is_empty() || keys.iter().any(|k| k == "all") {
        return (all, Vec::new());
    }
    let mut selected = Vec::new();
    let mut unknown = Vec::new();
    for key in keys {
        match all.iter().find(|f| f.key == key) {
            Some(feature) => selected.push(feature.clone()),
            None => unknown.push(key),
        }
    }
    (selected, unknown)
}

pub fn list_features() -> Vec<(String, String, usize)> {
    builtin_features()
        .into_iter()
        .map(|f| (f.key.clone(), f.name.clone(), f.scenarios.len()))
        .collect()
}
