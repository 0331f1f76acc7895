//! Inspect command

use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use crossterm::style::Stylize;
use icepick_schema::{Blake3Hash, FORMAT_VERSION, SliceKind};
use std::path::Path;

use super::read_artifact;
use crate::ui::theme::format_size;

/// Print the manifest and slice table of a bundle.
pub fn inspect(path: &Path) -> Result<()> {
    let (artifact, bytes) = read_artifact(path)?;
    let manifest = &artifact.manifest;

    println!();
    println!(
        "  {} {}",
        path.display().to_string().white().bold(),
        format!("v{FORMAT_VERSION}").dark_grey()
    );
    println!("  {:<10}{}", "exposes", manifest.exposes);
    println!(
        "  {:<10}{} ({} payload)",
        "size",
        format_size(bytes.len() as u64),
        format_size(artifact.payload.len() as u64)
    );
    println!("  {:<10}{}", "blake3", Blake3Hash::compute(&bytes));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "kind", "name", "version", "range", "offset", "length", "blake3",
    ]);
    for slice in manifest.layout()? {
        let data = artifact.slice(&slice)?;
        let range = match slice.kind {
            SliceKind::Provided => manifest
                .requires
                .get(slice.name)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(slice.kind),
            Cell::new(slice.name),
            Cell::new(slice.version.map(ToString::to_string).unwrap_or_default()),
            Cell::new(range),
            Cell::new(slice.offset).set_alignment(CellAlignment::Right),
            Cell::new(slice.length).set_alignment(CellAlignment::Right),
            Cell::new(Blake3Hash::compute(&data).short()),
        ]);
    }
    println!("{table}");
    Ok(())
}
