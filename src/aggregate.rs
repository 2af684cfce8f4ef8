use std::collections::BTreeMap;

use chrono::NaiveDate;
use compact_str::CompactString;

use crate::{groups::ColorGroups, record::DailyRecord};

/// Wide per-date tables, one column per bucket. Columns are ordered by
/// descending mean play share.
#[derive(Clone, Debug, Default)]
pub struct Aggregation {
    pub dates: Vec<NaiveDate>,
    pub buckets: Vec<CompactString>,
    pub games_per_day: Vec<i64>,
    pub wins: Vec<Vec<i64>>,
    pub games: Vec<Vec<i64>>,
    /// `100 * bucket games / games of the day`
    pub play_share: Vec<Vec<f64>>,
    /// `100 * bucket wins / bucket games`, NaN without games.
    pub win_rate: Vec<Vec<f64>>,
}

#[inline]
fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        f64::NAN
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Mean of the finite values, NaN if there is none.
pub fn finite_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

pub fn aggregate(records: &[DailyRecord], groups: &ColorGroups) -> Aggregation {
    let n_buckets = groups.buckets.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<(i64, i64)>> = BTreeMap::new();
    let mut seen = vec![false; n_buckets];

    for record in records {
        let bucket = groups.bucket_of(&record.deck);
        let Some(col) = groups.position(bucket) else {
            continue;
        };
        seen[col] = true;
        let row = by_date.entry(record.date).or_insert_with(|| vec![(0, 0); n_buckets]);
        row[col].0 += record.wins;
        row[col].1 += record.games;
    }

    // Fixed order first; the stable sort below keeps it for ties.
    let mut cols: Vec<usize> = (0..n_buckets).filter(|&c| seen[c]).collect();

    let mut agg = Aggregation::default();
    for (date, row) in by_date {
        let day_games = cols.iter().map(|&c| row[c].1).sum::<i64>();
        agg.dates.push(date);
        agg.games_per_day.push(day_games);
        agg.wins.push(row.iter().map(|x| x.0).collect());
        agg.games.push(row.iter().map(|x| x.1).collect());
    }

    let means: Vec<f64> = (0..n_buckets)
        .map(|c| {
            finite_mean(
                agg.games
                    .iter()
                    .zip(&agg.games_per_day)
                    .map(|(row, &total)| percent(row[c], total)),
            )
        })
        .collect();
    cols.sort_by(|&a, &b| match (means[a].is_nan(), means[b].is_nan()) {
        (false, false) => means[b].total_cmp(&means[a]),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });

    let pick = |row: &Vec<i64>| cols.iter().map(|&c| row[c]).collect::<Vec<_>>();
    agg.wins = agg.wins.iter().map(pick).collect();
    agg.games = agg.games.iter().map(pick).collect();
    agg.buckets = cols.iter().map(|&c| groups.buckets[c].name.clone()).collect();

    agg.play_share = agg
        .games
        .iter()
        .zip(&agg.games_per_day)
        .map(|(row, &total)| row.iter().map(|&g| percent(g, total)).collect())
        .collect();
    agg.win_rate = agg
        .wins
        .iter()
        .zip(&agg.games)
        .map(|(wins, games)| wins.iter().zip(games).map(|(&w, &g)| percent(w, g)).collect())
        .collect();

    tracing::debug!(target: "aggregate", "{} dates x {} buckets", agg.dates.len(), agg.buckets.len());
    agg
}

impl Aggregation {
    pub fn latest(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn column<'a>(&'a self, table: &'a [Vec<f64>], col: usize) -> impl Iterator<Item = f64> + 'a {
        table.iter().map(move |row| row[col])
    }

    pub fn mean_play_share(&self, col: usize) -> f64 {
        finite_mean(self.column(&self.play_share, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, d).unwrap()
    }

    fn sample() -> Vec<DailyRecord> {
        vec![
            DailyRecord::new(date(1), "LTR", "Mono-Red", 30, 70),
            DailyRecord::new(date(1), "LTR", "Mono-Blue + Splash", 5, 10),
            DailyRecord::new(date(1), "LTR", "Azorius (WU)", 12, 20),
            DailyRecord::new(date(1), "LTR", "Five-color", 0, 0),
            DailyRecord::new(date(2), "LTR", "Mono-Red", 10, 30),
            DailyRecord::new(date(2), "LTR", "Mono-Blue + Splash", 0, 0),
            DailyRecord::new(date(2), "LTR", "Azorius (WU)", 40, 60),
            DailyRecord::new(date(2), "LTR", "Five-color", 1, 10),
        ]
    }

    #[test]
    fn buckets_partition_each_day() {
        let agg = aggregate(&sample(), &ColorGroups::default());

        assert_eq!(agg.dates, [date(1), date(2)]);
        assert_eq!(agg.games_per_day, [100, 100]);
        for (row, &total) in agg.games.iter().zip(&agg.games_per_day) {
            assert_eq!(row.iter().sum::<i64>(), total);
        }
    }

    #[test]
    fn shares_sum_to_hundred_when_every_bucket_played() {
        let agg = aggregate(&sample(), &ColorGroups::default());

        for row in &agg.play_share {
            assert!((row.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn columns_sorted_by_mean_share() {
        let agg = aggregate(&sample(), &ColorGroups::default());

        // Mono 80% then 30%, WU 20% then 60%, Other 0% then 10%.
        assert_eq!(agg.buckets, ["Mono", "WU", "Other"]);
        assert!((agg.mean_play_share(0) - 55.0).abs() < 1e-9);
        assert!((agg.mean_play_share(1) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_the_fixed_order() {
        let records = [
            DailyRecord::new(date(1), "LTR", "Gruul (RG)", 5, 10),
            DailyRecord::new(date(1), "LTR", "Rakdos (BR)", 5, 10),
            DailyRecord::new(date(1), "LTR", "Dimir (UB)", 5, 10),
        ];
        let agg = aggregate(&records, &ColorGroups::default());

        assert_eq!(agg.buckets, ["BR", "UB", "RG"]);
    }

    #[test]
    fn win_rate_without_games_is_nan() {
        let agg = aggregate(&sample(), &ColorGroups::default());
        let other = agg.buckets.iter().position(|b| b == "Other").unwrap();
        let mono = agg.buckets.iter().position(|b| b == "Mono").unwrap();

        assert!(agg.win_rate[0][other].is_nan());
        assert!((agg.win_rate[1][other] - 10.0).abs() < 1e-9);
        assert!((agg.win_rate[0][mono] - 43.75).abs() < 1e-9);
    }

    #[test]
    fn empty_day_has_nan_shares() {
        let records = [
            DailyRecord::new(date(1), "LTR", "Mono-Red", 0, 0),
            DailyRecord::new(date(2), "LTR", "Mono-Red", 1, 2),
        ];
        let agg = aggregate(&records, &ColorGroups::default());

        assert!(agg.play_share[0][0].is_nan());
        assert!((agg.mean_play_share(0) - 100.0).abs() < 1e-9);
        assert_eq!(agg.latest(), Some(date(2)));
    }
}
