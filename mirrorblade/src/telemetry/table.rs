//! Plain-text table rendering for telemetry events.

use super::TelemetryEvent;
use std::fmt::Write;

const MIN_TIME_WIDTH: usize = 10;
const MIN_NAME_WIDTH: usize = 16;
const NUM_WIDTH: usize = 10;
const MIN_TAG_WIDTH: usize = 16;

/// Renders events as a fixed-width table with a title row. Column widths
/// grow to fit the longest name and tag.
pub fn format_table(events: &[TelemetryEvent], title: &str) -> String {
    let name_width = events
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH);
    let tag_width = events
        .iter()
        .map(|e| e.tag.len())
        .max()
        .unwrap_or(0)
        .max(MIN_TAG_WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "  {title}");
    let _ = writeln!(
        out,
        " {:<tw$} {:<nw$} {:<w$} {:<w$} {:<w$} {:<gw$}",
        "t(ms)",
        "name",
        "a",
        "b",
        "c",
        "tag",
        tw = MIN_TIME_WIDTH,
        nw = name_width,
        w = NUM_WIDTH,
        gw = tag_width,
    );
    let _ = writeln!(
        out,
        " {} {} {} {} {} {}",
        "-".repeat(MIN_TIME_WIDTH),
        "-".repeat(name_width),
        "-".repeat(NUM_WIDTH),
        "-".repeat(NUM_WIDTH),
        "-".repeat(NUM_WIDTH),
        "-".repeat(tag_width),
    );

    for event in events {
        let _ = writeln!(
            out,
            " {:<tw$} {:<nw$} {:<w$.3} {:<w$.3} {:<w$.3} {:<gw$}",
            event.t,
            event.name,
            event.a,
            event.b,
            event.c,
            event.tag,
            tw = MIN_TIME_WIDTH,
            nw = name_width,
            w = NUM_WIDTH,
            gw = tag_width,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, tag: &str) -> TelemetryEvent {
        TelemetryEvent {
            t: 1234,
            name: name.to_string(),
            a: 1.0,
            b: 2.5,
            c: -3.125,
            tag: tag.to_string(),
        }
    }

    #[test]
    fn test_table_contains_title_and_headers() {
        let text = format_table(&[event("fps", "render")], "last events");
        assert!(text.contains("last events"));
        assert!(text.contains("t(ms)"));
        assert!(text.contains("name"));
        assert!(text.contains("tag"));
    }

    #[test]
    fn test_table_rows_render_values() {
        let text = format_table(&[event("fps", "render")], "t");
        assert!(text.contains("1234"));
        assert!(text.contains("fps"));
        assert!(text.contains("2.500"));
        assert!(text.contains("-3.125"));
        assert!(text.contains("render"));
    }

    #[test]
    fn test_columns_widen_for_long_names() {
        let long = "a".repeat(40);
        let text = format_table(&[event(&long, "t")], "t");
        assert!(text.contains(&long));
        // The separator under the name column must span its width.
        assert!(text.contains(&"-".repeat(40)));
    }

    #[test]
    fn test_empty_event_list_renders_header_only() {
        let text = format_table(&[], "empty");
        assert!(text.contains("empty"));
        assert_eq!(text.lines().count(), 3);
    }
}
