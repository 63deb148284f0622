//! ASCII line charts for the terminal.

use crate::PriceDay;

/// Time axis printed below a chart of one day at quarter hour resolution.
pub const TIME_AXIS_LEGEND: &str = "\t00:00\t\t\t06:00\t\t\t12:00\t\t\t18:00\t\t\t24:00";

/// Rows of the price chart.
pub const CHART_HEIGHT: usize = 20;

/// Decimals shown on the price axis.
pub const CHART_PRECISION: usize = 3;

const DEFAULT_OFFSET: usize = 3;

/// Terminal color of the plotted line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeriesColor {
    #[default]
    Default,
    Green,
    Red,
}

impl SeriesColor {
    /// ANSI escape sequence selecting this color.
    pub const fn ansi(self) -> &'static str {
        match self {
            SeriesColor::Default => "\x1b[0m",
            SeriesColor::Green => "\x1b[32m",
            SeriesColor::Red => "\x1b[31m",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Rows between minimum and maximum. `None` picks a height from the value range.
    pub height: Option<usize>,
    /// Columns reserved left of the first data point for the axis.
    pub offset: usize,
    /// Decimals on the axis labels, before adjusting for very small or large values.
    pub precision: usize,
    pub color: SeriesColor,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            height: None,
            offset: DEFAULT_OFFSET,
            precision: 2,
            color: SeriesColor::Default,
        }
    }
}

impl PlotConfig {
    pub fn with_height(mut self, height: usize) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_color(mut self, color: SeriesColor) -> Self {
        self.color = color;
        self
    }
}

#[derive(Clone)]
struct Cell {
    text: String,
    color: SeriesColor,
}

impl Cell {
    fn blank() -> Self {
        Self::plain(" ")
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: SeriesColor::Default,
        }
    }

    fn colored(text: &str, color: SeriesColor) -> Self {
        Self {
            text: text.to_owned(),
            color,
        }
    }

    fn is_blank(&self) -> bool {
        self.text == " "
    }
}

/// Renders the quarter hour series of `day` with the fixed chart settings.
pub fn render_day(series: &[f64], day: PriceDay) -> String {
    let config = PlotConfig::default()
        .with_height(CHART_HEIGHT)
        .with_precision(CHART_PRECISION)
        .with_color(day.color());
    plot(series, &config)
}

/// Plots `series` as a line chart with a labelled value axis.
///
/// NaN values leave a gap in the line. An empty series, or one with only NaN
/// values, renders as an empty string.
pub fn plot(series: &[f64], config: &PlotConfig) -> String {
    let (minimum, maximum) = series
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if minimum > maximum {
        return String::new();
    }

    let interval = maximum - minimum;
    let height = config
        .height
        .filter(|h| *h > 0)
        .unwrap_or_else(|| auto_height(interval));
    let offset = if config.offset == 0 {
        DEFAULT_OFFSET
    } else {
        config.offset
    };

    let ratio = if interval == 0.0 {
        1.0
    } else {
        height as f64 / interval
    };
    let min2 = (minimum * ratio).round();
    let max2 = (maximum * ratio).round();
    let rows = (max2 - min2) as usize;
    let width = series.len() + offset;

    // Row index of a value, 0 at the bottom.
    let level = |value: f64| ((value * ratio).round() - min2) as usize;

    let mut grid = vec![vec![Cell::blank(); width]; rows + 1];

    let precision = label_precision(config.precision, minimum, maximum);
    let label_width = format!("{maximum:.precision$}")
        .len()
        .max(format!("{minimum:.precision$}").len())
        + 1;

    for (row, line) in grid.iter_mut().enumerate() {
        let magnitude = if rows > 0 {
            maximum - row as f64 * interval / rows as f64
        } else {
            maximum
        };
        let label = format!("{magnitude:>label_width$.precision$}");
        let column = offset.saturating_sub(label.len());
        line[column] = Cell::plain(label);
        line[offset - 1] = Cell::plain("┤");
    }

    if let Some(&first) = series.first().filter(|v| !v.is_nan()) {
        grid[rows - level(first)][offset - 1] = Cell::plain("┼");
    }

    let color = config.color;
    for (x, pair) in series.windows(2).enumerate() {
        let column = x + offset;
        let (d0, d1) = (pair[0], pair[1]);

        match (d0.is_nan(), d1.is_nan()) {
            (true, true) => {}
            (false, true) => grid[rows - level(d0)][column] = Cell::colored("╴", color),
            (true, false) => grid[rows - level(d1)][column] = Cell::colored("╶", color),
            (false, false) => {
                let (y0, y1) = (level(d0), level(d1));
                if y0 == y1 {
                    grid[rows - y0][column] = Cell::colored("─", color);
                    continue;
                }

                let (end, start) = if y0 > y1 { ("╰", "╮") } else { ("╭", "╯") };
                grid[rows - y1][column] = Cell::colored(end, color);
                grid[rows - y0][column] = Cell::colored(start, color);

                for y in y0.min(y1) + 1..y0.max(y1) {
                    grid[rows - y][column] = Cell::colored("│", color);
                }
            }
        }
    }

    let mut out = String::new();
    for (i, line) in grid.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_line(&mut out, line);
    }
    out
}

fn write_line(out: &mut String, line: &[Cell]) {
    let used = line
        .iter()
        .rposition(|cell| !cell.is_blank())
        .map_or(0, |last| last + 1);

    let mut current = SeriesColor::Default;
    for cell in &line[..used] {
        if cell.color != current {
            current = cell.color;
            out.push_str(current.ansi());
        }
        out.push_str(&cell.text);
    }
    if current != SeriesColor::Default {
        out.push_str(SeriesColor::Default.ansi());
    }
}

/// Height for charts without a configured one, based on the value range.
fn auto_height(interval: f64) -> usize {
    if interval >= 1.0 {
        return interval as usize;
    }
    if interval <= 0.0 {
        return 1;
    }

    let scaled = interval / 10f64.powf(interval.log10().floor());
    if scaled < 2.0 {
        scaled.ceil() as usize
    } else {
        scaled.floor() as usize
    }
}

/// Adds decimals for values below 1 and drops them for values above 100.
fn label_precision(precision: usize, minimum: f64, maximum: f64) -> usize {
    let log_max = if minimum == 0.0 && maximum == 0.0 {
        -1.0
    } else {
        maximum.abs().max(minimum.abs()).log10()
    };

    if log_max < 0.0 {
        if log_max.fract() == 0.0 {
            precision + (log_max.abs() - 1.0) as usize
        } else {
            precision + log_max.abs() as usize
        }
    } else if log_max > 2.0 {
        0
    } else {
        precision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(height: usize, precision: usize) -> PlotConfig {
        PlotConfig::default()
            .with_height(height)
            .with_precision(precision)
    }

    #[test]
    fn test_plot_rising_line() {
        let chart = plot(&[1.0, 2.0], &plain(2, 1));

        assert_eq!(chart, " 2.0 ┤╭\n 1.5 ┤│\n 1.0 ┼╯");
    }

    #[test]
    fn test_plot_falling_line() {
        let chart = plot(&[2.0, 1.0], &plain(2, 1));

        assert_eq!(chart, " 2.0 ┼╮\n 1.5 ┤│\n 1.0 ┤╰");
    }

    #[test]
    fn test_plot_flat_steps() {
        let chart = plot(&[1.0, 1.0, 2.0, 2.0], &plain(1, 1));

        assert_eq!(chart, " 2.0 ┤ ╭─\n 1.0 ┼─╯");
    }

    #[test]
    fn test_plot_constant_series() {
        let chart = plot(&[0.5; 8], &plain(20, 3));

        assert_eq!(chart.lines().count(), 1);
        assert!(chart.starts_with(" 0.500 ┼───────"));
    }

    #[test]
    fn test_plot_empty_series() {
        assert_eq!(plot(&[], &PlotConfig::default()), "");
        assert_eq!(plot(&[f64::NAN, f64::NAN], &PlotConfig::default()), "");
    }

    #[test]
    fn test_plot_gap() {
        let chart = plot(&[1.0, f64::NAN, 1.0], &plain(1, 1));

        assert_eq!(chart, " 1.0 ┼╴╶");
    }

    #[test]
    fn test_plot_height() {
        let series: Vec<f64> = (0..96).map(|i| f64::from(i % 24) / 10.0 + 0.4).collect();

        let chart = plot(&series, &plain(CHART_HEIGHT, CHART_PRECISION));

        assert_eq!(chart.lines().count(), CHART_HEIGHT + 1);
    }

    #[test]
    fn test_plot_color() {
        let config = plain(2, 1).with_color(SeriesColor::Green);

        let chart = plot(&[1.0, 2.0], &config);

        assert_eq!(chart.lines().next(), Some(" 2.0 ┤\x1b[32m╭\x1b[0m"));
    }

    #[test]
    fn test_render_day_colors() {
        let series = [0.25, 0.25, 0.5, 0.5];

        let today = render_day(&series, PriceDay::Today);
        let tomorrow = render_day(&series, PriceDay::Tomorrow);

        assert!(today.contains(SeriesColor::Green.ansi()));
        assert!(!today.contains(SeriesColor::Red.ansi()));
        assert!(tomorrow.contains(SeriesColor::Red.ansi()));
        assert!(!tomorrow.contains(SeriesColor::Green.ansi()));
    }

    #[test]
    fn test_render_day_empty() {
        assert_eq!(render_day(&[], PriceDay::Tomorrow), "");
    }

    #[test]
    fn test_label_precision() {
        assert_eq!(label_precision(3, 0.2, 0.9), 3);
        assert_eq!(label_precision(3, 0.01, 0.02), 4);
        assert_eq!(label_precision(3, 100.0, 500.0), 0);
        assert_eq!(label_precision(2, 0.0, 0.0), 2);
    }

    #[test]
    fn test_auto_height() {
        assert_eq!(auto_height(12.7), 12);
        assert_eq!(auto_height(0.0), 1);
        assert_eq!(auto_height(0.15), 2);
        assert_eq!(auto_height(0.35), 3);
    }

    #[test]
    fn test_legend() {
        assert_eq!(TIME_AXIS_LEGEND.matches('\t').count(), 13);
        assert!(TIME_AXIS_LEGEND.ends_with("24:00"));
    }
}
