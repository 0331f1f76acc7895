//! Plan command

use anyhow::{Result, bail};
use comfy_table::{Table, presets::UTF8_FULL};
use icepick_core::{PlanAction, Session, plan as plan_load};
use icepick_schema::{PackageName, Version};
use std::path::Path;

use super::read_artifact;
use crate::ui::theme::{action_label, format_size};

/// Parse `name@version`, allowing scoped names such as `@scope/pkg@1.0.0`.
pub fn parse_resident(spec: &str) -> Result<(PackageName, Version)> {
    match spec.rfind('@') {
        Some(at) if at > 0 && at + 1 < spec.len() => {
            let name = PackageName::new(&spec[..at]);
            if !name.is_valid() {
                bail!("Invalid package name in '{spec}'");
            }
            Ok((name, Version::new(&spec[at + 1..])))
        }
        _ => bail!("Expected NAME@VERSION, got '{spec}'"),
    }
}

/// Print what a load of `path` would do given the resident packages.
pub fn plan(path: &Path, residents: &[String]) -> Result<()> {
    let (artifact, _) = read_artifact(path)?;

    let session: Session<()> = Session::new();
    for spec in residents {
        let (name, version) = parse_resident(spec)?;
        if !session.preload(name.clone(), version, ()) {
            bail!("Package '{name}' given more than once");
        }
    }

    let plan = plan_load(&session, &artifact.manifest)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["package", "bundled", "range", "size", "action"]);
    for step in &plan.provided {
        table.add_row(vec![
            step.name.to_string(),
            step.bundled.to_string(),
            step.range.clone(),
            format_size(step.length),
            action_label(&step.action),
        ]);
    }
    println!("{table}");
    println!(
        "{} internal chunk(s) always load; {} of provided slices skipped",
        plan.internal.len(),
        format_size(plan.reused_bytes())
    );

    if !plan.is_loadable() {
        let conflicts: Vec<String> = plan
            .provided
            .iter()
            .filter_map(|s| match &s.action {
                PlanAction::Incompatible(v) => Some(format!("{}@{v} (needs {})", s.name, s.range)),
                _ => None,
            })
            .collect();
        bail!("Bundle cannot load: {}", conflicts.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resident() {
        let (name, version) = parse_resident("react@18.2.0").unwrap();
        assert_eq!(name, "react");
        assert_eq!(version, "18.2.0");

        let (name, version) = parse_resident("@emotion/css@11.11.2").unwrap();
        assert_eq!(name, "@emotion/css");
        assert_eq!(version, "11.11.2");
    }

    #[test]
    fn test_parse_resident_rejects_missing_version() {
        assert!(parse_resident("react").is_err());
        assert!(parse_resident("react@").is_err());
        assert!(parse_resident("@emotion/css").is_err());
    }
}
