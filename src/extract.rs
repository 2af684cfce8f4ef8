use std::sync::LazyLock;

use compact_str::CompactString;
use scraper::{ElementRef, Html, Selector};

use crate::{
    record::{Snapshot, Tally},
    util::parse_count,
};

/// Multi-color summary rows that are kept; every other summary row is
/// an aggregate of individual rows already present.
pub const SUMMARY_ALLOW_LIST: [&str; 3] = ["Four-color", "Four-color + Splash", "Five-color"];

static SEL_INDIVIDUAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.color-individual").unwrap());
static SEL_SUMMARY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.color-summary").unwrap());
static SEL_TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

fn parse_row(row: ElementRef) -> Option<(CompactString, Tally)> {
    let mut cells = row.select(&SEL_TD);
    let label = cells.next()?.text().map(str::trim).collect::<CompactString>();
    let wins = parse_count(&cells.next()?.text().collect::<String>())?;
    let games = parse_count(&cells.next()?.text().collect::<String>())?;

    if label.is_empty() {
        return None;
    }
    Some((label, Tally { wins, games }))
}

/// Extracts the cumulative table of one page load. `html` may be either the
/// whole table or only its inner HTML.
///
/// An empty snapshot means the page has no data for the current filter.
pub fn extract(html: &str) -> Snapshot {
    let fragment = if html.trim_start().starts_with("<table") {
        Html::parse_fragment(html)
    } else {
        Html::parse_fragment(&format!("<table>{html}</table>"))
    };

    let mut snapshot = Snapshot::new();

    for row in fragment.select(&SEL_INDIVIDUAL) {
        match parse_row(row) {
            Some((label, tally)) => snapshot.insert(label, tally),
            None => tracing::warn!(target: "extract", "malformed row: {}", row.html()),
        }
    }
    if snapshot.is_empty() {
        return snapshot;
    }

    for row in fragment.select(&SEL_SUMMARY) {
        match parse_row(row) {
            Some((label, tally)) if SUMMARY_ALLOW_LIST.contains(&label.as_str()) => {
                snapshot.insert(label, tally);
            }
            Some(_) => (),
            None => tracing::warn!(target: "extract", "malformed summary row: {}", row.html()),
        }
    }

    tracing::debug!(target: "extract", "{} archetypes extracted", snapshot.len());
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(class: &str, label: &str, wins: &str, games: &str) -> String {
        format!("<tr class=\"{class}\"><td>{label}</td><td>{wins}</td><td>{games}</td><td>55.0%</td></tr>")
    }

    fn table(rows: &[String]) -> String {
        format!("<table><tbody>{}</tbody></table>", rows.concat())
    }

    #[test]
    fn individual_and_allowed_summary_rows() {
        let html = table(&[
            row("color-summary", "Two-color", "900", "1,800"),
            row("color-individual", "Mono-Red", "40", "100"),
            row("color-individual", "Azorius (WU)", "5", "10"),
            row("color-individual", "Gruul (RG) + Splash", "1,204", "2,310"),
            row("color-summary", "Four-color", "3", "9"),
            row("color-summary", "Three-color + Splash", "30", "70"),
            row("color-summary", "Five-color", "1", "2"),
        ]);

        let snapshot = extract(&html);

        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.get("Mono-Red"), Some(Tally::new(40, 100)));
        assert_eq!(snapshot.get("Gruul (RG) + Splash"), Some(Tally::new(1204, 2310)));
        assert_eq!(snapshot.get("Four-color"), Some(Tally::new(3, 9)));
        assert_eq!(snapshot.get("Five-color"), Some(Tally::new(1, 2)));
        assert_eq!(snapshot.get("Two-color"), None);
        assert_eq!(snapshot.get("Three-color + Splash"), None);
    }

    #[test]
    fn inner_html_is_accepted() {
        let inner = format!("<tbody>{}</tbody>", row("color-individual", "Mono-Blue", "7", "12"));
        assert_eq!(extract(&inner).get("Mono-Blue"), Some(Tally::new(7, 12)));
    }

    #[test]
    fn no_matching_rows_is_empty() {
        assert!(extract("<table><tbody><tr><td>Nothing</td></tr></tbody></table>").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn summary_rows_alone_are_empty() {
        let html = table(&[row("color-summary", "Five-color", "1", "2")]);
        assert!(extract(&html).is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let html = table(&[
            row("color-individual", "Mono-Red", "n/a", "100"),
            row("color-individual", "Mono-Green", "8", "20"),
            "<tr class=\"color-individual\"><td>Mono-White</td></tr>".to_owned(),
        ]);

        let snapshot = extract(&html);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("Mono-Green"), Some(Tally::new(8, 20)));
    }
}
