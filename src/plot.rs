use std::path::{Path, PathBuf};

use plotters::{
    data::Quartiles,
    element::DashedPathElement,
    prelude::*,
};

use crate::{aggregate::Aggregation, groups::ColorGroups};

const SIZE: (u32, u32) = (1100, 800);
const BAR: RGBColor = RGBColor(0xad, 0xd8, 0xe6);

/// Line patterns cycled over the share series as (dash, gap) in pixels,
/// `None` for a solid line.
const DASHES: [Option<(u32, u32)>; 4] = [None, Some((10, 6)), Some((18, 4)), Some((2, 4))];

const fn dash_of(col: usize) -> Option<(u32, u32)> {
    DASHES[col % DASHES.len()]
}

fn bucket_color(groups: &ColorGroups, bucket: &str) -> RGBColor {
    let (r, g, b) = groups.color_of(bucket).unwrap_or((0x80, 0x80, 0x80));
    RGBColor(r, g, b)
}

/// Output files of one run.
#[derive(Clone, Debug)]
pub struct Charts {
    pub share: PathBuf,
    pub win_rate: PathBuf,
}

impl Charts {
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            share: dir.join(format!("{stem}_share.svg")),
            win_rate: dir.join(format!("{stem}_winrate.svg")),
        }
    }
}

/// Play share per bucket over time, with the games of each day as bars on a
/// secondary axis.
pub fn draw_share(path: &Path, title: &str, agg: &Aggregation, groups: &ColorGroups) -> anyhow::Result<()> {
    if agg.dates.is_empty() {
        anyhow::bail!("nothing to plot");
    }

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let n = agg.dates.len() as f64;
    let max_share = agg
        .play_share
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f64, f64::max)
        .max(1.0);
    let max_games = agg.games_per_day.iter().copied().max().unwrap_or(0).max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .right_y_label_area_size(70)
        .build_cartesian_2d(-0.5..n - 0.5, 0.0..max_share * 1.05)?
        .set_secondary_coord(-0.5..n - 0.5, 0.0..max_games * 1.05);

    let dates = &agg.dates;
    let label = |x: &f64| {
        let i = x.round();
        if i < 0.0 || (x - i).abs() > 1e-6 {
            return String::new();
        }
        dates.get(i as usize).map(|d| d.format("%m-%d").to_string()).unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(agg.dates.len().min(16))
        .x_label_formatter(&label)
        .y_desc("% of games played")
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("Games Played")
        .draw()?;

    chart
        .draw_secondary_series(agg.games_per_day.iter().enumerate().map(|(i, &games)| {
            let x = i as f64;
            Rectangle::new([(x - 0.3, 0.0), (x + 0.3, games as f64)], BAR.filled())
        }))?
        .label("Games Played")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 16, y + 5)], BAR.filled()));

    for (col, bucket) in agg.buckets.iter().enumerate() {
        let style = bucket_color(groups, bucket).stroke_width(2);
        let points: Vec<(f64, f64)> = agg
            .column(&agg.play_share, col)
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (i as f64, v))
            .collect();

        let label = bucket.as_str();
        match dash_of(col) {
            None => {
                chart
                    .draw_series(LineSeries::new(points, style))?
                    .label(label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }
            Some((dash, gap)) => {
                chart
                    .draw_series(DashedLineSeries::new(points, dash, gap, style))?
                    .label(label)
                    .legend(move |(x, y)| DashedPathElement::new(vec![(x, y), (x + 20, y)], dash, gap, style));
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    tracing::info!(target: "plot", "wrote {}", path.display());
    Ok(())
}

/// Distribution of the daily win rate of each bucket.
pub fn draw_win_rate(path: &Path, title: &str, agg: &Aggregation, groups: &ColorGroups) -> anyhow::Result<()> {
    let boxes: Vec<(&str, Quartiles)> = agg
        .buckets
        .iter()
        .enumerate()
        .filter_map(|(col, bucket)| {
            let rates: Vec<f64> = agg.column(&agg.win_rate, col).filter(|v| v.is_finite()).collect();
            (!rates.is_empty()).then(|| (bucket.as_str(), Quartiles::new(&rates)))
        })
        .collect();
    if boxes.is_empty() {
        anyhow::bail!("no win rates to plot");
    }

    let names: Vec<&str> = boxes.iter().map(|(name, _)| *name).collect();
    let (lo, hi) = boxes.iter().fold((100.0f32, 0.0f32), |(lo, hi), (_, q)| {
        let [min, .., max] = q.values();
        (lo.min(min), hi.max(max))
    });

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(names[..].into_segmented(), (lo - 2.0).max(0.0)..(hi + 2.0).min(100.0))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Deck")
        .y_desc("Win Percentage")
        .draw()?;

    chart.draw_series(boxes.iter().zip(&names).map(|((name, quartiles), key)| {
        let color = bucket_color(groups, name);
        Boxplot::new_vertical(SegmentValue::CenterOf(key), quartiles)
            .width(24)
            .whisker_width(0.5)
            .style(color)
    }))?;

    root.present()?;
    tracing::info!(target: "plot", "wrote {}", path.display());
    Ok(())
}

/// Both charts of a run. `title` names the filters; the win-rate chart adds
/// the latest date.
pub fn draw(charts: &Charts, title: &str, agg: &Aggregation, groups: &ColorGroups) -> anyhow::Result<()> {
    draw_share(&charts.share, title, agg, groups)?;
    let latest = agg
        .latest()
        .map(|d| d.format(crate::util::CACHE_DATE).to_string())
        .unwrap_or_default();
    draw_win_rate(&charts.win_rate, &format!("{title} as of {latest}"), agg, groups)
}
