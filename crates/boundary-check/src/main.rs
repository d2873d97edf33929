use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Context, Result};
use cargo_metadata::{Metadata, MetadataCommand, PackageId};

const RULES: &[(&str, &[&str])] = &[
    ("twolane-policy", &["twolane-store", "sqlx", "axum"]),
    ("twolane-contracts", &["twolane-store", "sqlx", "axum"]),
    ("twolane-auth", &["twolane-store", "sqlx", "axum"]),
    ("twolane-store", &["twolane-policy", "axum"]),
];

type RuleOutcome = (&'static str, &'static [&'static str], Vec<String>);

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let mut failed = false;
    for (package, forbidden, violations) in check(&metadata)? {
        if violations.is_empty() {
            println!(
                "OK: `{}` has no dependency edge to {}",
                package,
                forbidden.join(", ")
            );
        } else {
            eprintln!(
                "FAIL: `{}` depends on forbidden crate(s): {}",
                package,
                violations.join(", ")
            );
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn check(metadata: &Metadata) -> Result<Vec<RuleOutcome>> {
    RULES
        .iter()
        .map(|(package, forbidden)| {
            let violations = forbidden_reachable(metadata, package, forbidden)?;
            Ok((*package, *forbidden, violations))
        })
        .collect()
}

fn forbidden_reachable(
    metadata: &Metadata,
    package: &str,
    forbidden: &[&str],
) -> Result<Vec<String>> {
    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    let root = metadata
        .packages
        .iter()
        .find(|p| p.name == package)
        .with_context(|| format!("package `{}` not found in workspace", package))?;

    let id_to_name: HashMap<&PackageId, &str> = metadata
        .packages
        .iter()
        .map(|p| (&p.id, p.name.as_str()))
        .collect();

    let adjacency: HashMap<&PackageId, Vec<&PackageId>> = resolve
        .nodes
        .iter()
        .map(|node| (&node.id, node.deps.iter().map(|dep| &dep.pkg).collect()))
        .collect();

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(&root.id);
    visited.insert(&root.id);

    let mut violations = Vec::new();
    while let Some(current) = queue.pop_front() {
        let Some(deps) = adjacency.get(current) else {
            continue;
        };

        for dep in deps.iter().copied() {
            if !visited.insert(dep) {
                continue;
            }

            if let Some(name) = id_to_name.get(dep)
                && forbidden.contains(name)
            {
                violations.push((*name).to_string());
            }

            queue.push_back(dep);
        }
    }

    violations.sort();
    violations.dedup();
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_respects_every_rule() {
        let metadata = MetadataCommand::new()
            .exec()
            .expect("cargo metadata should run");

        for (package, _, violations) in check(&metadata).expect("every package should resolve") {
            assert!(
                violations.is_empty(),
                "`{}` reaches forbidden crate(s): {}",
                package,
                violations.join(", ")
            );
        }
    }

    #[test]
    fn store_does_not_reach_guards() {
        let metadata = MetadataCommand::new()
            .exec()
            .expect("cargo metadata should run");

        let violations = forbidden_reachable(&metadata, "twolane-store", &["twolane-policy"])
            .expect("store should resolve");
        assert!(violations.is_empty(), "store reaches {:?}", violations);
    }
}
