//! Plain-text renderings of listings for the one-shot subcommands.

use core_state::{MappingListing, MappingSummary, ScriptListing};

pub fn summary_line(summary: &MappingSummary) -> String {
    format!(
        "{}: {}/{} characters typed, {} remaining",
        summary.label,
        summary.cursor,
        summary.total,
        summary.remaining()
    )
}

pub fn mapping_lines(listings: &[MappingListing]) -> Vec<String> {
    if listings.is_empty() {
        return vec!["no staged mappings".to_string()];
    }
    listings
        .iter()
        .map(|l| {
            let state = if l.summary.is_complete() {
                "done".to_string()
            } else {
                format!("{}/{}", l.summary.cursor, l.summary.total)
            };
            format!(
                "{}\t{}\t{}\t{}",
                l.summary.label, state, l.summary.document, l.preview
            )
        })
        .collect()
}

pub fn script_lines(listings: &[ScriptListing]) -> Vec<String> {
    if listings.is_empty() {
        return vec!["no terminal scripts".to_string()];
    }
    listings
        .iter()
        .map(|s| {
            let marker = if s.is_current { '>' } else { ' ' };
            format!(
                "{marker} {}\t{}\t{} chars\t{}",
                s.id, s.title, s.length, s.preview
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_state::DocumentId;
    use pretty_assertions::assert_eq;

    fn listing(cursor: usize, total: usize) -> MappingListing {
        MappingListing {
            summary: MappingSummary {
                document: DocumentId::new("/w/a.rs"),
                label: "a.rs".to_string(),
                cursor,
                total,
            },
            preview: "fn main()".to_string(),
        }
    }

    #[test]
    fn mapping_lines_show_progress_or_done() {
        let lines = mapping_lines(&[listing(3, 9), listing(9, 9)]);
        assert_eq!(lines[0], "a.rs\t3/9\t/w/a.rs\tfn main()");
        assert_eq!(lines[1], "a.rs\tdone\t/w/a.rs\tfn main()");
    }

    #[test]
    fn empty_listings_say_so() {
        assert_eq!(mapping_lines(&[]), vec!["no staged mappings".to_string()]);
        assert_eq!(script_lines(&[]), vec!["no terminal scripts".to_string()]);
    }

    #[test]
    fn current_script_is_marked() {
        let scripts = vec![
            ScriptListing {
                id: "a1".to_string(),
                title: "build".to_string(),
                length: 12,
                preview: "cargo build".to_string(),
                delay_ms: 0,
                is_current: true,
            },
            ScriptListing {
                id: "b2".to_string(),
                title: "test".to_string(),
                length: 10,
                preview: "cargo test".to_string(),
                delay_ms: 0,
                is_current: false,
            },
        ];
        let lines = script_lines(&scripts);
        assert!(lines[0].starts_with("> a1"));
        assert!(lines[1].starts_with("  b2"));
    }

    #[test]
    fn summary_line_reports_remaining() {
        let s = listing(4, 10).summary;
        assert_eq!(summary_line(&s), "a.rs: 4/10 characters typed, 6 remaining");
    }
}
