use std::{collections::BTreeMap, fmt};

use serde::Deserialize;

// region: Response
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationProperties {
    pub cluster: Option<String>,
    pub node: Option<String>,
    pub namespace: Option<String>,
    pub controller: Option<String>,
    pub controller_kind: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub properties: Option<AllocationProperties>,
    pub cpu_core_request_average: Option<f64>,
    pub cpu_core_usage_average: Option<f64>,
    pub ram_byte_request_average: Option<f64>,
    pub ram_byte_usage_average: Option<f64>,
    pub cost: Option<f64>,
    pub cost_ratio: Option<f64>,
    pub custom_cost: Option<f64>,
}

/// One map of allocations per time bucket, in bucket order.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct AllocationSetRange {
    #[serde(default)]
    pub code: i64,
    pub message: Option<String>,
    #[serde(default)]
    pub data: Vec<BTreeMap<String, Allocation>>,
}
// endregion

// region: Query
/// Query parameters of `GET /cost`. Unset parameters are left off the URL.
#[derive(Debug, Default, Clone)]
pub struct CostQuery {
    pub window: String,
    pub filter: Option<String>,
    pub step: Option<String>,
    pub aggregate: Option<String>,
    pub idle: Option<bool>,
    pub share_idle: Option<bool>,
    pub share_split: Option<String>,
    pub idle_by_node: Option<bool>,
    pub format: Option<String>,
}

impl CostQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("window", self.window.clone())];
        let mut push = |name, value: Option<String>| {
            if let Some(value) = value {
                params.push((name, value));
            }
        };
        push("filter", self.filter.clone());
        push("step", self.step.clone());
        push("aggregate", self.aggregate.clone());
        push("idle", self.idle.map(|b| b.to_string()));
        push("shareIdle", self.share_idle.map(|b| b.to_string()));
        push("shareSplit", self.share_split.clone());
        push("idleByNode", self.idle_by_node.map(|b| b.to_string()));
        push("format", self.format.clone());
        params
    }
}
// endregion

const MIB: f64 = 1024.0 * 1024.0;

/// Human readable summary of a cost response.
pub struct Summary<'a>(pub &'a AllocationSetRange);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.0;
        writeln!(out, "Number of data entries: {}", range.data.len())?;

        for (i, bucket) in range.data.iter().enumerate() {
            writeln!(out, "\nTime Range {}:", i + 1)?;

            for (pod, alloc) in bucket {
                writeln!(out, "\n  Pod: {pod}")?;
                if let Some(name) = &alloc.name {
                    writeln!(out, "    Name: {name}")?;
                }
                if let Some(start) = &alloc.start {
                    writeln!(out, "    Start: {start}")?;
                }
                if let Some(end) = &alloc.end {
                    writeln!(out, "    End: {end}")?;
                }
                if let Some(v) = alloc.cpu_core_request_average {
                    writeln!(out, "    CPU Request Average: {v:.2} cores")?;
                }
                if let Some(v) = alloc.cpu_core_usage_average {
                    writeln!(out, "    CPU Usage Average: {v:.2} cores")?;
                }
                if let Some(v) = alloc.ram_byte_request_average {
                    writeln!(out, "    RAM Request Average: {:.2} MB", v / MIB)?;
                }
                if let Some(v) = alloc.ram_byte_usage_average {
                    writeln!(out, "    RAM Usage Average: {:.2} MB", v / MIB)?;
                }
                if let Some(v) = alloc.cost {
                    writeln!(out, "    Cost: {v:.4}")?;
                }
                if let Some(v) = alloc.cost_ratio {
                    writeln!(out, "    Cost Ratio: {:.2}%", v * 100.0)?;
                }
                if let Some(v) = alloc.custom_cost {
                    writeln!(out, "    Custom Cost: {v:.4}")?;
                }
                if let Some(props) = &alloc.properties {
                    writeln!(out, "    Properties:")?;
                    let fields = [
                        ("Namespace", &props.namespace),
                        ("Node", &props.node),
                        ("Controller", &props.controller),
                        ("Controller Kind", &props.controller_kind),
                        ("Cluster", &props.cluster),
                    ];
                    for (label, value) in fields {
                        if let Some(value) = value {
                            writeln!(out, "      {label}: {value}")?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
