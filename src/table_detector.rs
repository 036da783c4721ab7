//! Geometric table detection over positioned text runs.
//!
//! No table markup exists in page content; rows and columns are
//! inferred by clustering run positions. The heuristic is tuned for
//! precision: it must stay quiet on ordinary multi-column prose.

use log::debug;

use crate::model::{Table, TableCell, TableRow, TextRun};

/// Clustering tolerances. These are heuristics, not constants of
/// nature; tests pin specific values rather than assuming a correct
/// default exists.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Row band half-width as a fraction of the dominant font size.
    pub row_tolerance_factor: f32,

    /// Absolute half-width for clustering column x-origins, in page
    /// units.
    pub column_tolerance: f32,

    /// Minimum rows for a candidate region to become a table.
    pub min_rows: usize,

    /// Minimum columns for a candidate region to become a table.
    pub min_columns: usize,

    /// Fraction of rows that must populate a shared column for the
    /// region to count as aligned rather than accidental.
    pub majority_fraction: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            row_tolerance_factor: 0.5,
            column_tolerance: 5.0,
            min_rows: 2,
            min_columns: 2,
            majority_fraction: 0.5,
        }
    }
}

/// A detected table plus the indices (into the input slice) of the
/// runs that became its cells.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    pub table: Table,
    pub consumed: Vec<usize>,
}

pub struct TableDetector {
    config: TableDetectorConfig,
}

impl Default for TableDetector {
    fn default() -> Self {
        Self::new(TableDetectorConfig::default())
    }
}

impl TableDetector {
    pub fn new(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables among one page's runs. Returned tables carry
    /// sorted `consumed` index lists; indices never overlap between
    /// tables.
    pub fn detect(&self, runs: &[TextRun]) -> Vec<DetectedTable> {
        let candidates: Vec<usize> = runs
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.text.trim().is_empty())
            .map(|(i, _)| i)
            .collect();
        if candidates.len() < self.config.min_rows * self.config.min_columns {
            return Vec::new();
        }

        let row_tol = dominant_font_size(runs, &candidates) * self.config.row_tolerance_factor;
        let rows = self.cluster_rows(runs, &candidates, row_tol.max(0.1));

        let mut out = Vec::new();
        // maximal stretches of consecutive multi-run rows
        let mut region: Vec<&RowBand> = Vec::new();
        for band in &rows {
            if band.members.len() >= self.config.min_columns {
                region.push(band);
            } else {
                if let Some(t) = self.promote(runs, &region) {
                    out.push(t);
                }
                region.clear();
            }
        }
        if let Some(t) = self.promote(runs, &region) {
            out.push(t);
        }
        out
    }

    /// Cluster run vertical centers into horizontal bands, top of the
    /// page first. A run equidistant between two bands joins the one
    /// with the smaller index.
    fn cluster_rows(&self, runs: &[TextRun], candidates: &[usize], tol: f32) -> Vec<RowBand> {
        let mut bands: Vec<RowBand> = Vec::new();
        let mut order: Vec<usize> = candidates.to_vec();
        order.sort_by(|&a, &b| {
            runs[b]
                .center_y()
                .partial_cmp(&runs[a].center_y())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for idx in order {
            let y = runs[idx].center_y();
            let mut best: Option<(usize, f32)> = None;
            for (bi, band) in bands.iter().enumerate() {
                let d = (band.center - y).abs();
                if d <= tol {
                    let better = match best {
                        Some((_, bd)) => d < bd,
                        None => true,
                    };
                    if better {
                        best = Some((bi, d));
                    }
                }
            }
            match best {
                Some((bi, _)) => {
                    let band = &mut bands[bi];
                    band.members.push(idx);
                    let n = band.members.len() as f32;
                    band.center += (y - band.center) / n;
                }
                None => bands.push(RowBand {
                    center: y,
                    members: vec![idx],
                }),
            }
        }
        bands.sort_by(|a, b| {
            b.center
                .partial_cmp(&a.center)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        bands
    }

    /// Decide whether a region of aligned rows is a table, and build
    /// it if so.
    fn promote(&self, runs: &[TextRun], region: &[&RowBand]) -> Option<DetectedTable> {
        if region.len() < self.config.min_rows {
            return None;
        }
        let member_indices: Vec<usize> = region
            .iter()
            .flat_map(|b| b.members.iter().copied())
            .collect();

        let columns = self.cluster_columns(runs, &member_indices);
        if columns.len() < self.config.min_columns {
            return None;
        }

        // majority test: some column beyond the first must be hit by
        // most rows, otherwise this is coincidental alignment
        let needed = (region.len() as f32 * self.config.majority_fraction).floor() as usize + 1;
        let shared = columns.iter().skip(1).any(|col| {
            let hit = region
                .iter()
                .filter(|band| {
                    band.members
                        .iter()
                        .any(|&i| (runs[i].x - col.center).abs() <= self.config.column_tolerance)
                })
                .count();
            hit >= needed
        });
        if !shared {
            debug!("candidate region rejected: no column shared by a row majority");
            return None;
        }

        if self.looks_like_list(runs, region, &columns) {
            debug!("candidate region rejected: list markers, not a table");
            return None;
        }

        let mut table = Table::new();
        for band in region {
            let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
            let mut members = band.members.clone();
            members.sort_by(|&a, &b| {
                runs[a]
                    .x
                    .partial_cmp(&runs[b].x)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &i in &members {
                let col = nearest_column(&columns, runs[i].x);
                cells[col].push(runs[i].text.trim());
            }
            table.add_row(TableRow::new(
                cells
                    .into_iter()
                    .map(|parts| TableCell::text(parts.join(" ")))
                    .collect(),
            ));
        }
        table.normalize();

        let mut consumed = member_indices;
        consumed.sort_unstable();
        Some(DetectedTable { table, consumed })
    }

    /// Cluster x-origins across the whole region, so columns line up
    /// between rows instead of per-row.
    fn cluster_columns(&self, runs: &[TextRun], members: &[usize]) -> Vec<ColumnBand> {
        let mut columns: Vec<ColumnBand> = Vec::new();
        let mut order: Vec<usize> = members.to_vec();
        order.sort_by(|&a, &b| {
            runs[a]
                .x
                .partial_cmp(&runs[b].x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for idx in order {
            let x = runs[idx].x;
            let mut best: Option<(usize, f32)> = None;
            for (ci, col) in columns.iter().enumerate() {
                let d = (col.center - x).abs();
                if d <= self.config.column_tolerance {
                    let better = match best {
                        Some((_, bd)) => d < bd,
                        None => true,
                    };
                    if better {
                        best = Some((ci, d));
                    }
                }
            }
            match best {
                Some((ci, _)) => {
                    let col = &mut columns[ci];
                    col.count += 1;
                    col.center += (x - col.center) / col.count as f32;
                }
                None => columns.push(ColumnBand { center: x, count: 1 }),
            }
        }
        columns.sort_by(|a, b| {
            a.center
                .partial_cmp(&b.center)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        columns
    }

    /// Bulleted and numbered lists align exactly like a 2-column
    /// table. When every first-column cell is a marker, this is a
    /// list.
    fn looks_like_list(&self, runs: &[TextRun], region: &[&RowBand], columns: &[ColumnBand]) -> bool {
        if columns.len() != 2 {
            return false;
        }
        region.iter().all(|band| {
            band.members
                .iter()
                .filter(|&&i| nearest_column(columns, runs[i].x) == 0)
                .all(|&i| is_list_marker(runs[i].text.trim()))
        })
    }
}

#[derive(Debug, Clone)]
struct RowBand {
    center: f32,
    members: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ColumnBand {
    center: f32,
    count: usize,
}

fn nearest_column(columns: &[ColumnBand], x: f32) -> usize {
    let mut best = 0usize;
    let mut best_d = f32::INFINITY;
    for (ci, col) in columns.iter().enumerate() {
        let d = (col.center - x).abs();
        if d < best_d {
            best = ci;
            best_d = d;
        }
    }
    best
}

fn dominant_font_size(runs: &[TextRun], candidates: &[usize]) -> f32 {
    let mut sizes: Vec<f32> = candidates
        .iter()
        .map(|&i| runs[i].font_size)
        .filter(|s| *s > 0.0)
        .collect();
    if sizes.is_empty() {
        return 10.0;
    }
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sizes[sizes.len() / 2]
}

fn is_list_marker(text: &str) -> bool {
    if matches!(text, "\u{2022}" | "\u{25e6}" | "\u{25aa}" | "-" | "*" | "\u{2013}") {
        return true;
    }
    // "1." / "12)" / "a." style markers
    let trimmed = text.trim_end_matches(['.', ')']);
    if trimmed.len() < text.len() && !trimmed.is_empty() && trimmed.len() <= 3 {
        return trimmed.chars().all(|c| c.is_ascii_alphanumeric());
    }
    false
}
