use crate::operations::whitelist::is_certified;
use crate::registry::RegistryClient;
use crate::scores::fetch_scores;
use crate::source::TreeSource;
use crate::tree::{FlatPackage, PackageNode, flatten};
use crate::{NscmError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A scored view of one project: the tree as resolved and its flat list.
#[derive(Debug, Clone)]
pub struct Report {
    pub tree: PackageNode,
    pub packages: Vec<FlatPackage>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.packages.len()
    }

    /// Packages at or under `threshold`, or without a score.
    pub fn failed(&self, threshold: f64) -> Vec<FlatPackage> {
        self.packages
            .iter()
            .filter(|package| !is_certified(package, threshold))
            .cloned()
            .collect()
    }
}

/// Resolve, flatten and score a manifest.
pub async fn build<S>(
    client: &RegistryClient,
    source: &S,
    manifest_json: &str,
    concurrency: usize,
) -> Result<Report>
where
    S: TreeSource,
{
    let tree = source.resolve(manifest_json).await?;
    let packages = flatten(&tree);
    tracing::debug!(packages = packages.len(), "flattened tree");

    let packages = fetch_scores(client, packages, concurrency).await?;
    Ok(Report { tree, packages })
}

pub fn to_json(packages: &[FlatPackage]) -> Result<String> {
    crate::error::to_json_pretty("report", packages)
}

fn node_color(score: Option<f64>, threshold: f64) -> &'static str {
    match score {
        Some(value) if value > threshold => "#2e7d32",
        Some(value) if value > threshold / 2.0 => "#f9a825",
        Some(_) => "#c62828",
        None => "#9e9e9e",
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Graphviz rendering of the tree. Every `name@version` is one node,
/// coloured by its score, and each parent/child pair is one edge.
pub fn to_dot(report: &Report, threshold: f64) -> String {
    let scores: HashMap<String, Option<f64>> = report
        .packages
        .iter()
        .map(|package| (package.key(), package.score))
        .collect();

    let root_label = match (&report.tree.name, &report.tree.version) {
        (Some(name), Some(version)) => format!("{name}@{version}"),
        (Some(name), None) => name.clone(),
        _ => "project".to_string(),
    };

    let mut out = String::new();
    out.push_str("digraph dependencies {\n");
    out.push_str("  node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\", fontcolor=white];\n");
    let _ = writeln!(out, "  {} [fillcolor=\"#37474f\"];", quote(&root_label));

    let mut nodes: HashSet<String> = HashSet::new();
    let mut edges: HashSet<(String, String)> = HashSet::new();
    let mut stack: Vec<(String, &PackageNode)> = vec![(root_label, &report.tree)];

    while let Some((parent, node)) = stack.pop() {
        for (name, child) in node.dependencies.iter() {
            let Some(version) = child.version.as_deref() else {
                continue;
            };
            let key = format!("{name}@{version}");

            if nodes.insert(key.clone()) {
                let score = scores.get(&key).copied().flatten();
                let _ = writeln!(
                    out,
                    "  {} [fillcolor=\"{}\"];",
                    quote(&key),
                    node_color(score, threshold)
                );
                stack.push((key.clone(), child));
            }

            if edges.insert((parent.clone(), key.clone())) {
                let _ = writeln!(out, "  {} -> {};", quote(&parent), quote(&key));
            }
        }
    }

    out.push_str("}\n");
    out
}

/// Pipe a DOT document through `dot -Tsvg`.
pub async fn render_svg(dot: &str) -> Result<String> {
    let command = "dot -Tsvg";
    let mut child = Command::new("dot")
        .arg("-Tsvg")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| NscmError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(dot.as_bytes())
            .await
            .map_err(|source| NscmError::Spawn {
                command: command.to_string(),
                source,
            })?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| NscmError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(NscmError::Resolution {
            reason: format!(
                "{command} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        let tree = PackageNode::new("app", "1.0.0")
            .with_dependency(
                "a",
                PackageNode::new("a", "1.0.0").with_dependency("x", PackageNode::new("x", "1.0.0")),
            )
            .with_dependency(
                "b",
                PackageNode::new("b", "1.0.0").with_dependency("x", PackageNode::new("x", "1.0.0")),
            );
        let mut packages = flatten(&tree);
        for package in &mut packages {
            package.score = match package.name.as_str() {
                "a" => Some(100.0),
                "b" => Some(10.0),
                _ => None,
            };
        }
        Report { tree, packages }
    }

    #[test]
    fn failed_lists_uncertified_packages() {
        let report = sample();
        let failed: Vec<_> = report.failed(85.0).into_iter().map(|p| p.name).collect();
        assert_eq!(failed, vec!["x", "b"]);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn dot_has_one_node_per_package_and_shared_edges() {
        let dot = to_dot(&sample(), 85.0);

        assert!(dot.starts_with("digraph dependencies {"));
        assert_eq!(dot.matches("\"x@1.0.0\" [fillcolor").count(), 1);
        assert!(dot.contains("\"a@1.0.0\" -> \"x@1.0.0\";"));
        assert!(dot.contains("\"b@1.0.0\" -> \"x@1.0.0\";"));
        assert!(dot.contains("\"app@1.0.0\" -> \"a@1.0.0\";"));
        assert!(dot.contains("\"a@1.0.0\" [fillcolor=\"#2e7d32\"]"));
        assert!(dot.contains("\"b@1.0.0\" [fillcolor=\"#c62828\"]"));
    }

    #[test]
    fn json_omits_missing_fields() {
        let json = to_json(&[FlatPackage::new("a", "1.0.0")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "a");
        assert!(value[0].get("score").is_none());
    }
}
