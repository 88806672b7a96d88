//! PNG figures drawn from the merged results table
//!
//! Each figure has a data step, which pulls and checks the columns it needs out
//! of the [`ResultsTable`], and a drawing step done with plotters.
use std::error::Error;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::{info, warn};

use crate::dose::{Scfa, REQUIRED_COLUMNS};
use crate::results::{RenderError, ResultsTable, PATHWAY_PREFIX};

pub const SCFA_INPUTS_FIG: &str = "fig_scfa_inputs.png";
pub const SCFA_RATIOS_FIG: &str = "fig_scfa_ratios.png";
pub const OBJECTIVE_FIG: &str = "fig_host_objective.png";
pub const OBJECTIVE_DELTA_FIG: &str = "fig_objective_delta_pct.png";
pub const EXCHANGE_FIG: &str = "fig_host_exchange_fluxes.png";
pub const HEATMAP_FIG: &str = "fig_pathway_heatmap.png";

/// Exchange flux columns and their legend labels
pub const EXCHANGE_COLUMNS: [(&str, &str); 6] = [
    ("glucose_flux", "glucose"),
    ("oxygen_flux", "O2"),
    ("co2_flux", "CO2"),
    ("acetate_flux", "acetate"),
    ("propionate_flux", "propionate"),
    ("butyrate_flux", "butyrate"),
];

const SIZE: (u32, u32) = (900, 600);
const FONT: &str = "sans-serif";

/// A named series over the conditions
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Conditions on the x axis and the series plotted against them
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub conditions: Vec<String>,
    pub series: Vec<Series>,
}

/// Pathway fluxes, one row per reaction and one column per condition
#[derive(Clone, Debug, PartialEq)]
pub struct Heatmap {
    pub conditions: Vec<String>,
    pub reactions: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

// region Data
/// Dose of each SCFA per condition
pub fn dose_panel(table: &ResultsTable) -> Result<Panel, RenderError> {
    let conditions = table.text_column("condition")?;
    let series = Scfa::ALL
        .iter()
        .map(|scfa| {
            Ok(Series {
                name: scfa.name().to_string(),
                values: table.column(scfa.column())?,
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(Panel { conditions, series })
}

/// Molar fraction of each SCFA in the total dose; a zero total gives zero fractions
pub fn ratio_panel(table: &ResultsTable) -> Result<Panel, RenderError> {
    let mut panel = dose_panel(table)?;
    for i in 0..panel.conditions.len() {
        let total: f64 = panel
            .series
            .iter()
            .filter_map(|s| s.values[i])
            .sum();
        for series in panel.series.iter_mut() {
            series.values[i] = Some(match series.values[i] {
                Some(v) if total > 0. => v / total,
                _ => 0.,
            });
        }
    }
    Ok(panel)
}

/// Objective per condition, with the baseline objective when the column has one
pub fn objective_panel(table: &ResultsTable) -> Result<(Panel, Option<f64>), RenderError> {
    let conditions = table.text_column("condition")?;
    let values = table.column("objective_value")?;
    let baseline = if table.has_column("baseline_objective") {
        table.column("baseline_objective")?.into_iter().flatten().next()
    } else {
        None
    };
    Ok((
        Panel {
            conditions,
            series: vec![Series {
                name: "objective".to_string(),
                values,
            }],
        },
        baseline,
    ))
}

/// Percent change of the objective, `None` without the column
pub fn delta_panel(table: &ResultsTable) -> Result<Option<Panel>, RenderError> {
    if !table.has_column("objective_pct_change") {
        return Ok(None);
    }
    Ok(Some(Panel {
        conditions: table.text_column("condition")?,
        series: vec![Series {
            name: "objective change (%)".to_string(),
            values: table.column("objective_pct_change")?,
        }],
    }))
}

/// Exchange fluxes for the exchange columns present, `None` when there are none
pub fn exchange_panel(table: &ResultsTable) -> Result<Option<Panel>, RenderError> {
    let series = EXCHANGE_COLUMNS
        .iter()
        .filter(|(column, _)| table.has_column(column))
        .map(|(column, label)| {
            Ok(Series {
                name: label.to_string(),
                values: table.column(column)?,
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;
    if series.is_empty() {
        return Ok(None);
    }
    Ok(Some(Panel {
        conditions: table.text_column("condition")?,
        series,
    }))
}

/// Pathway columns, dropping those all zero or all missing; `None` when none remain
pub fn pathway_heatmap(table: &ResultsTable) -> Result<Option<Heatmap>, RenderError> {
    let mut reactions = Vec::new();
    let mut values = Vec::new();
    for header in table.headers() {
        let Some(reaction) = header.strip_prefix(PATHWAY_PREFIX) else {
            continue;
        };
        let column = table.column(header)?;
        if column.iter().all(|v| v.map_or(true, |v| v == 0.)) {
            continue;
        }
        reactions.push(reaction.to_string());
        values.push(column);
    }
    if reactions.is_empty() {
        return Ok(None);
    }
    Ok(Some(Heatmap {
        conditions: table.text_column("condition")?,
        reactions,
        values,
    }))
}
// endregion Data

// region Drawing
fn draw_error(path: &Path, err: Box<dyn Error>) -> RenderError {
    RenderError::Draw {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Axis label of a category index, blank between categories
fn category_label(labels: &[String], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0. {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

/// y range covering every value and zero, padded by 10%
fn value_range<'a>(values: impl Iterator<Item = &'a Option<f64>>) -> (f64, f64) {
    let (mut low, mut high) = (0f64, 0f64);
    for v in values.flatten() {
        low = low.min(*v);
        high = high.max(*v);
    }
    let pad = ((high - low) * 0.1).max(1e-3);
    (if low < 0. { low - pad } else { 0. }, high + pad)
}

fn draw_lines(path: &Path, title: &str, y_desc: &str, panel: &Panel) -> Result<(), Box<dyn Error>> {
    let n = panel.conditions.len();
    let (y_low, y_high) = value_range(panel.series.iter().flat_map(|s| s.values.iter()));
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_low..y_high)?;
    chart
        .configure_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|x| category_label(&panel.conditions, *x))
        .x_desc("condition")
        .y_desc(y_desc)
        .draw()?;
    for (i, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(f64, f64)> = series
            .values
            .iter()
            .enumerate()
            .filter_map(|(x, v)| v.map(|v| (x as f64, v)))
            .collect();
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(series.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_bars(
    path: &Path,
    title: &str,
    y_desc: &str,
    panel: &Panel,
    baseline: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let n = panel.conditions.len();
    let values = &panel.series[0].values;
    let (y_low, y_high) = value_range(values.iter().chain(std::iter::once(&baseline)));
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_low..y_high)?;
    chart
        .configure_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|x| category_label(&panel.conditions, *x))
        .x_desc("condition")
        .y_desc(y_desc)
        .draw()?;
    chart.draw_series(values.iter().enumerate().filter_map(|(x, v)| {
        v.map(|v| {
            let x = x as f64;
            Rectangle::new([(x - 0.35, 0.), (x + 0.35, v)], BLUE.mix(0.7).filled())
        })
    }))?;
    if let Some(base) = baseline {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(-0.5, base), (n as f64 - 0.5, base)],
                10,
                6,
                BLACK.stroke_width(2),
            ))?
            .label(format!("baseline ({base:.2})"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

fn draw_stacked(path: &Path, title: &str, panel: &Panel) -> Result<(), Box<dyn Error>> {
    let n = panel.conditions.len();
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..1.05f64)?;
    chart
        .configure_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&|x| category_label(&panel.conditions, *x))
        .x_desc("condition")
        .y_desc("molar fraction")
        .draw()?;
    let mut bottoms = vec![0f64; n];
    for (i, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let bars: Vec<Rectangle<(f64, f64)>> = series
            .values
            .iter()
            .enumerate()
            .map(|(x, v)| {
                let height = v.unwrap_or(0.);
                let bottom = bottoms[x];
                bottoms[x] += height;
                let x = x as f64;
                Rectangle::new([(x - 0.35, bottom), (x + 0.35, bottom + height)], color.filled())
            })
            .collect();
        chart
            .draw_series(bars)?
            .label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Blue for negative, white for zero, red for positive flux
fn heat_color(value: Option<f64>, max_abs: f64) -> RGBColor {
    let Some(value) = value else {
        return RGBColor(220, 220, 220);
    };
    let t = if max_abs > 0. {
        (value / max_abs).clamp(-1., 1.)
    } else {
        0.
    };
    let fade = (255. * (1. - t.abs())) as u8;
    if t >= 0. {
        RGBColor(255, fade, fade)
    } else {
        RGBColor(fade, fade, 255)
    }
}

fn draw_heatmap(path: &Path, title: &str, heatmap: &Heatmap) -> Result<(), Box<dyn Error>> {
    let columns = heatmap.conditions.len();
    let rows = heatmap.reactions.len();
    let max_abs = heatmap
        .values
        .iter()
        .flatten()
        .flatten()
        .fold(0f64, |acc, v| acc.max(v.abs()));
    let height = (120 + 40 * rows as u32).max(SIZE.1 / 2);
    let root = BitMapBackend::new(path, (SIZE.0, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(110)
        .build_cartesian_2d(0f64..columns as f64, 0f64..rows as f64)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(columns * 2 + 1)
        .y_labels(rows * 2 + 1)
        .x_label_formatter(&|x| category_label(&heatmap.conditions, *x - 0.5))
        .y_label_formatter(&|y| category_label(&heatmap.reactions, *y - 0.5))
        .draw()?;
    for (row, values) in heatmap.values.iter().enumerate() {
        chart.draw_series(values.iter().enumerate().map(|(column, v)| {
            let (x, y) = (column as f64, row as f64);
            Rectangle::new([(x, y), (x + 1., y + 1.)], heat_color(*v, max_abs).filled())
        }))?;
        chart.draw_series(values.iter().enumerate().filter_map(|(column, v)| {
            v.map(|v| {
                Text::new(
                    format!("{v:.2}"),
                    (column as f64 + 0.4, row as f64 + 0.55),
                    (FONT, 14).into_font(),
                )
            })
        }))?;
    }
    root.present()?;
    Ok(())
}
// endregion Drawing

/// Draw every figure into `figs_dir`, returning the files written
///
/// `conditions` gives the x axis order. The dose columns and `objective_value` are
/// required; the other figures are skipped when their columns are absent.
pub fn make_figures(
    merged: &Path,
    figs_dir: &Path,
    conditions: &[String],
) -> Result<Vec<PathBuf>, RenderError> {
    let mut table = ResultsTable::read(merged)?;
    table.sort_by_conditions(conditions)?;
    for column in REQUIRED_COLUMNS.iter().chain(std::iter::once(&"objective_value")) {
        if !table.has_column(column) {
            return Err(RenderError::MissingColumn {
                column: column.to_string(),
                path: merged.to_path_buf(),
            });
        }
    }

    let mut written = Vec::new();
    let mut write = |name: &str,
                     draw: &dyn Fn(&Path) -> Result<(), Box<dyn Error>>|
     -> Result<(), RenderError> {
        let path = figs_dir.join(name);
        draw(&path).map_err(|err| draw_error(&path, err))?;
        info!(path = %path.display(), "wrote figure");
        written.push(path);
        Ok(())
    };

    let doses = dose_panel(&table)?;
    write(SCFA_INPUTS_FIG, &|p| {
        draw_lines(p, "SCFA dose by condition", "mmol/gDW/hr", &doses)
    })?;
    let ratios = ratio_panel(&table)?;
    write(SCFA_RATIOS_FIG, &|p| draw_stacked(p, "SCFA molar ratios", &ratios))?;
    let (objective, baseline) = objective_panel(&table)?;
    write(OBJECTIVE_FIG, &|p| {
        draw_bars(p, "Host ATP maintenance flux", "mmol/gDW/hr", &objective, baseline)
    })?;
    match delta_panel(&table)? {
        Some(delta) => write(OBJECTIVE_DELTA_FIG, &|p| {
            draw_bars(p, "Objective change vs baseline", "%", &delta, None)
        })?,
        None => warn!("no objective_pct_change column, skipping {OBJECTIVE_DELTA_FIG}"),
    }
    match exchange_panel(&table)? {
        Some(exchanges) => write(EXCHANGE_FIG, &|p| {
            draw_lines(p, "Host exchange fluxes", "mmol/gDW/hr", &exchanges)
        })?,
        None => warn!("no exchange flux columns, skipping {EXCHANGE_FIG}"),
    }
    match pathway_heatmap(&table)? {
        Some(heatmap) => write(HEATMAP_FIG, &|p| {
            draw_heatmap(p, "Pathway fluxes (mmol/gDW/hr)", &heatmap)
        })?,
        None => warn!("no non-zero pathway fluxes, skipping {HEATMAP_FIG}"),
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERGED: &str = "\
condition,acetate_mmol_gDW_hr,propionate_mmol_gDW_hr,butyrate_mmol_gDW_hr,objective_value,baseline_objective,objective_pct_change,oxygen_flux,acetate_flux,pathway_PYK,pathway_CSm,pathway_FBA
High,8,2.8,1.6,95.6,22,334.5,-20,-4.8,0,10,
Low,2,0.7,0.4,47.6,22,116.4,-20,-2,0,,
Mid,4,1.4,0.8,73.2,22,232.7,-20,-4,0,5,
";

    fn table() -> ResultsTable {
        let mut table = ResultsTable::from_reader(MERGED.as_bytes(), Path::new("merged.csv")).unwrap();
        table
            .sort_by_conditions(&["Low".to_string(), "Mid".to_string(), "High".to_string()])
            .unwrap();
        table
    }

    #[test]
    fn doses_in_condition_order() {
        let panel = dose_panel(&table()).unwrap();
        assert_eq!(panel.conditions, vec!["Low", "Mid", "High"]);
        assert_eq!(panel.series[0].name, "acetate");
        assert_eq!(panel.series[0].values, vec![Some(2.), Some(4.), Some(8.)]);
    }

    #[test]
    fn ratios_sum_to_one() {
        let panel = ratio_panel(&table()).unwrap();
        for i in 0..3 {
            let total: f64 = panel.series.iter().map(|s| s.values[i].unwrap()).sum();
            assert!((total - 1.).abs() < 1e-12);
        }
        // every condition has the same 2 : 0.7 : 0.4 composition
        assert!((panel.series[0].values[0].unwrap() - 2. / 3.1).abs() < 1e-12);
    }

    #[test]
    fn objective_and_baseline() {
        let (panel, baseline) = objective_panel(&table()).unwrap();
        assert_eq!(baseline, Some(22.));
        assert_eq!(panel.series[0].values[2], Some(95.6));
        assert!(delta_panel(&table()).unwrap().is_some());
    }

    #[test]
    fn exchange_columns_present_only() {
        let panel = exchange_panel(&table()).unwrap().unwrap();
        let names: Vec<&str> = panel.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["O2", "acetate"]);
    }

    #[test]
    fn heatmap_drops_empty_columns() {
        let heatmap = pathway_heatmap(&table()).unwrap().unwrap();
        // PYK is all zero and FBA all missing
        assert_eq!(heatmap.reactions, vec!["CSm"]);
        assert_eq!(heatmap.values[0], vec![None, Some(5.), Some(10.)]);
    }

    #[test]
    fn helpers() {
        let labels = vec!["Low".to_string(), "Mid".to_string()];
        assert_eq!(category_label(&labels, 1.0), "Mid");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, -1.0), "");
        assert_eq!(heat_color(None, 1.), RGBColor(220, 220, 220));
        assert_eq!(heat_color(Some(1.), 1.), RGBColor(255, 0, 0));
        assert_eq!(heat_color(Some(-1.), 1.), RGBColor(0, 0, 255));
        assert_eq!(heat_color(Some(0.), 0.), RGBColor(255, 255, 255));
    }

    #[test]
    fn missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged.csv");
        std::fs::write(&merged, "condition,acetate_mmol_gDW_hr\nLow,2\n").unwrap();
        let err = make_figures(&merged, dir.path(), &["Low".to_string()]).unwrap_err();
        match err {
            RenderError::MissingColumn { column, path } => {
                assert_eq!(column, "propionate_mmol_gDW_hr");
                assert_eq!(path, merged);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
