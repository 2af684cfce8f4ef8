use chrono::NaiveDate;

use crate::record::{ArchetypeSet, DailyRecord, Snapshot, Tally};

/// What to do with a delta that came out negative, which only happens when
/// the source revised its counts between two loads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NegativeDelta {
    #[default]
    Keep,
    Clamp,
}

/// What to record for an archetype seen in the later snapshot only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LateAppearance {
    /// The later snapshot's raw counts.
    #[default]
    Raw,
    /// Nothing, i.e. `(0, 0)`.
    Skip,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DiffPolicy {
    pub negative: NegativeDelta,
    pub late: LateAppearance,
}

#[inline]
fn signed(tally: Tally) -> (i64, i64) {
    (tally.wins as i64, tally.games as i64)
}

fn delta(prev: Tally, cur: Tally) -> (i64, i64) {
    let (pw, pg) = signed(prev);
    let (cw, cg) = signed(cur);
    (pw - cw, pg - cg)
}

/// Differences two snapshots whose "from" dates are one day apart: `previous`
/// was captured with `from = day`, `current` with `from = day + 1`. One
/// record per archetype of `archetypes` is attributed to `day`.
pub fn diff(
    day: NaiveDate,
    expansion: &str,
    previous: &Snapshot,
    current: &Snapshot,
    archetypes: &ArchetypeSet,
    policy: DiffPolicy,
) -> Vec<DailyRecord> {
    archetypes
        .iter()
        .map(|deck| {
            let (wins, games) = match (previous.get(deck), current.get(deck)) {
                (Some(prev), Some(cur)) => {
                    let (mut wins, mut games) = delta(prev, cur);
                    if wins < 0 || games < 0 {
                        tracing::warn!(target: "differ", "\x1b[33mnegative delta\x1b[0m for {deck} on {day}: wins {wins}, games {games}");
                        if policy.negative == NegativeDelta::Clamp {
                            wins = wins.max(0);
                            games = games.max(0);
                        }
                    }
                    (wins, games)
                }
                (Some(prev), None) => signed(prev),
                (None, Some(cur)) => {
                    tracing::warn!(target: "differ", "\x1b[31m{deck} appeared on {day} without a previous count\x1b[0m");
                    match policy.late {
                        LateAppearance::Raw => signed(cur),
                        LateAppearance::Skip => (0, 0),
                    }
                }
                (None, None) => (0, 0),
            };
            DailyRecord::new(day, expansion, deck, wins, games)
        })
        .collect()
}

/// The closing batch for the last day of a window, whose snapshot covers
/// that single day only.
pub fn close(
    day: NaiveDate,
    expansion: &str,
    last: &Snapshot,
    archetypes: &ArchetypeSet,
) -> Vec<DailyRecord> {
    archetypes
        .iter()
        .map(|deck| {
            let (wins, games) = last.get(deck).map_or((0, 0), signed);
            DailyRecord::new(day, expansion, deck, wins, games)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()
    }

    fn snapshot(entries: &[(&str, u64, u64)]) -> Snapshot {
        entries
            .iter()
            .map(|&(name, wins, games)| (name, Tally::new(wins, games)))
            .collect()
    }

    fn find<'a>(records: &'a [DailyRecord], deck: &str) -> &'a DailyRecord {
        records.iter().find(|r| r.deck == deck).unwrap()
    }

    #[test]
    fn present_in_both() {
        let previous = snapshot(&[("Mono-Red", 40, 100)]);
        let current = snapshot(&[("Mono-Red", 10, 30)]);
        let set = ArchetypeSet::from(&previous);

        let records = diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default());

        assert_eq!(records, [DailyRecord::new(day(), "LTR", "Mono-Red", 30, 70)]);
    }

    #[test]
    fn present_only_in_previous() {
        let previous = snapshot(&[("Mono-Red", 40, 100), ("Azorius (WU)", 5, 10)]);
        let current = snapshot(&[("Mono-Red", 10, 30)]);
        let set: ArchetypeSet = ["Mono-Red", "Azorius (WU)"].into_iter().collect();

        let records = diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default());

        let azorius = find(&records, "Azorius (WU)");
        assert_eq!((azorius.wins, azorius.games), (5, 10));
        let red = find(&records, "Mono-Red");
        assert_eq!((red.wins, red.games), (30, 70));
    }

    #[test]
    fn present_only_in_current() {
        let previous = snapshot(&[("Mono-Red", 40, 100)]);
        let current = snapshot(&[("Mono-Red", 10, 30), ("Dimir (UB)", 2, 3)]);
        let set: ArchetypeSet = ["Mono-Red", "Dimir (UB)"].into_iter().collect();

        let raw = diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default());
        let dimir = find(&raw, "Dimir (UB)");
        assert_eq!((dimir.wins, dimir.games), (2, 3));

        let policy = DiffPolicy { late: LateAppearance::Skip, ..DiffPolicy::default() };
        let skipped = diff(day(), "LTR", &previous, &current, &set, policy);
        let dimir = find(&skipped, "Dimir (UB)");
        assert_eq!((dimir.wins, dimir.games), (0, 0));
    }

    #[test]
    fn absent_from_both_and_outside_set() {
        let previous = snapshot(&[("Mono-Red", 40, 100), ("Izzet (UR)", 9, 9)]);
        let current = snapshot(&[("Mono-Red", 40, 100), ("Izzet (UR)", 9, 9)]);
        let set: ArchetypeSet = ["Mono-Red", "Five-color"].into_iter().collect();

        let records = diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default());

        assert_eq!(records.len(), 2);
        let five = find(&records, "Five-color");
        assert_eq!((five.wins, five.games), (0, 0));
        assert!(records.iter().all(|r| r.deck != "Izzet (UR)"));
    }

    #[test]
    fn negative_delta_policies() {
        let previous = snapshot(&[("Mono-Red", 10, 30)]);
        let current = snapshot(&[("Mono-Red", 12, 29)]);
        let set = ArchetypeSet::from(&previous);

        let kept = diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default());
        assert_eq!((kept[0].wins, kept[0].games), (-2, 1));

        let policy = DiffPolicy { negative: NegativeDelta::Clamp, ..DiffPolicy::default() };
        let clamped = diff(day(), "LTR", &previous, &current, &set, policy);
        assert_eq!((clamped[0].wins, clamped[0].games), (0, 1));
    }

    #[test]
    fn differences_match_for_every_shared_archetype() {
        let previous = snapshot(&[("A", 50, 90), ("B", 7, 7), ("C", 0, 4)]);
        let current = snapshot(&[("A", 20, 41), ("B", 7, 7), ("C", 0, 1)]);
        let set = ArchetypeSet::from(&previous);

        for record in diff(day(), "LTR", &previous, &current, &set, DiffPolicy::default()) {
            let prev = previous.get(&record.deck).unwrap();
            let cur = current.get(&record.deck).unwrap();
            assert_eq!(record.wins, prev.wins as i64 - cur.wins as i64);
            assert_eq!(record.games, prev.games as i64 - cur.games as i64);
        }
    }

    #[test]
    fn closing_batch_uses_raw_totals() {
        let last = snapshot(&[("Mono-Red", 3, 8)]);
        let set: ArchetypeSet = ["Mono-Red", "Orzhov (WB)"].into_iter().collect();

        let records = close(day(), "LTR", &last, &set);

        assert_eq!(
            records,
            [
                DailyRecord::new(day(), "LTR", "Mono-Red", 3, 8),
                DailyRecord::new(day(), "LTR", "Orzhov (WB)", 0, 0),
            ]
        );
    }
}
