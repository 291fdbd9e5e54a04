//! Line chart of yearly keyword frequencies.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, instrument};

use crate::trends::KeywordTrends;

use super::{PALETTE, RenderError};

/// Chart size in pixels.
pub const CHART_SIZE: (u32, u32) = (1200, 600);

const CHART_FONT: &str = "sans-serif";

/// Title shown above the trend chart.
#[must_use]
pub fn chart_title(company: &str) -> String {
    format!("{company} - Top 10 Keyword Trends Over Time")
}

/// Points of one keyword's series, ascending by year.
fn series_points(trends: &KeywordTrends, keyword: &str) -> Vec<(i32, usize)> {
    let mut points: Vec<(i32, usize)> = trends
        .trend_table
        .iter()
        .filter(|row| row.keyword == keyword)
        .map(|row| (row.year, row.count))
        .collect();
    points.sort_by_key(|(year, _)| *year);
    points
}

/// Draws the trend chart onto any plotters drawing area.
///
/// Expects a non-empty trend table; callers skip empty data.
///
/// # Errors
///
/// Propagates backend drawing failures.
pub fn draw_trend_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    company: &str,
    trends: &KeywordTrends,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let years = trends.years();
    let first_year = years.first().copied().unwrap_or_default();
    let last_year = years.last().copied().unwrap_or(first_year).max(first_year + 1);
    let max_count = trends
        .trend_table
        .iter()
        .map(|row| row.count)
        .max()
        .unwrap_or(0);

    let mut chart = ChartBuilder::on(root)
        .caption(chart_title(company), (CHART_FONT, 24))
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(first_year..last_year, 0..max_count + 1)?;

    let year_labels = usize::try_from(last_year - first_year + 1).unwrap_or(1);
    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Frequency")
        .x_labels(year_labels)
        .x_label_formatter(&|year| year.to_string())
        .label_style((CHART_FONT, 14))
        .draw()?;

    for (index, keyword) in trends.top_keywords.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let points = series_points(trends, keyword);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(keyword.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, 3, color.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font((CHART_FONT, 13))
        .draw()?;

    Ok(())
}

/// Writes the trend chart SVG to `path`.
///
/// # Errors
///
/// Returns [`RenderError::Draw`] when the SVG cannot be produced or written.
#[instrument(skip(trends), fields(path = %path.display(), keywords = trends.top_keywords.len()))]
pub fn write_trend_chart(path: &Path, company: &str, trends: &KeywordTrends) -> Result<(), RenderError> {
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw_trend_chart(&root, company, trends).map_err(|error| RenderError::draw(path, error))?;
    root.present().map_err(|error| RenderError::draw(path, error))?;
    debug!("trend chart written");
    Ok(())
}
