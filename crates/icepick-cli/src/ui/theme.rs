//! Shared formatting helpers.

use crossterm::style::{StyledContent, Stylize};
use icepick_core::PlanAction;
use icepick_schema::SliceKind;

/// Format bytes for human-readable display
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Colored, column-padded label for a slice kind.
pub fn kind_label(kind: SliceKind) -> StyledContent<String> {
    let label = format!("{kind:<10}");
    match kind {
        SliceKind::Entry => label.cyan(),
        SliceKind::Internal => label.dark_grey(),
        SliceKind::Provided => label.green(),
    }
}

/// Plain label for a planned action.
pub fn action_label(action: &PlanAction) -> String {
    match action {
        PlanAction::Reuse(v) => format!("reuse {v}"),
        PlanAction::Instantiate => "instantiate".to_string(),
        PlanAction::Incompatible(v) => format!("incompatible with {v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icepick_schema::Version;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 * 5), "5.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_action_label() {
        assert_eq!(
            action_label(&PlanAction::Reuse(Version::from("18.2.0"))),
            "reuse 18.2.0"
        );
        assert_eq!(action_label(&PlanAction::Instantiate), "instantiate");
    }
}
