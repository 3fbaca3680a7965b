//! Squarified treemap layout of a palette.
//!
//! Colours are laid out on a 1000x1000 canvas with inner padding between
//! siblings and integer-rounded edges; tiles are reported as percentages of
//! the canvas.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::palette::{extract_palette, round_to, PaletteColor, PaletteConfig};

const CANVAS_SIZE: f64 = 1000.0;
const PADDING_INNER: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreemapTile {
    pub hex: String,
    pub percentage: f64,
    pub population: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Rect {
    value: f64,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

/// Lay out `colors` (expected sorted by share, largest first).
pub fn layout_treemap(colors: &[PaletteColor]) -> Vec<TreemapTile> {
    let total: f64 = colors.iter().map(|c| c.population as f64).sum();
    if colors.is_empty() || total <= 0.0 {
        return Vec::new();
    }

    let mut nodes: Vec<Rect> = colors
        .iter()
        .map(|c| Rect {
            value: c.population as f64,
            ..Default::default()
        })
        .collect();

    // Children are tiled into the root grown by half the padding, then each
    // child is shrunk by the same amount, leaving the full padding between them.
    let half = PADDING_INNER / 2.0;
    squarify(&mut nodes, -half, -half, CANVAS_SIZE + half, CANVAS_SIZE + half, total);

    let mut tiles: Vec<TreemapTile> = colors
        .iter()
        .zip(nodes)
        .map(|(color, node)| {
            let node = round_rect(shrink(node, half));
            TreemapTile {
                hex: color.hex.clone(),
                percentage: color.percentage,
                population: color.population,
                x: round_to(node.x0 / 10.0, 2),
                y: round_to(node.y0 / 10.0, 2),
                width: round_to((node.x1 - node.x0) / 10.0, 2),
                height: round_to((node.y1 - node.y0) / 10.0, 2),
            }
        })
        .collect();

    tiles.sort_by(|a, b| b.population.cmp(&a.population));
    tiles
}

/// Extract the palette of `path` and lay it out; empty when nothing was sampled.
pub fn color_treemap(path: &Path, config: &PaletteConfig) -> Result<Vec<TreemapTile>> {
    Ok(extract_palette(path, config)?
        .map(|colors| layout_treemap(&colors))
        .unwrap_or_default())
}

fn squarify(nodes: &mut [Rect], mut x0: f64, mut y0: f64, x1: f64, y1: f64, mut value: f64) {
    let ratio = (1.0 + 5f64.sqrt()) / 2.0;
    let n = nodes.len();
    let (mut i0, mut i1) = (0, 0);

    while i0 < n {
        let dx = x1 - x0;
        let dy = y1 - y0;

        // next non-empty node starts the row
        let mut sum_value;
        loop {
            sum_value = nodes[i1].value;
            i1 += 1;
            if sum_value != 0.0 || i1 >= n {
                break;
            }
        }

        let mut min_value = sum_value;
        let mut max_value = sum_value;
        let alpha = (dy / dx).max(dx / dy) / (value * ratio);
        let mut beta = sum_value * sum_value * alpha;
        let mut min_ratio = (max_value / beta).max(beta / min_value);

        // grow the row while the worst aspect ratio does not get worse
        while i1 < n {
            let node_value = nodes[i1].value;
            sum_value += node_value;
            min_value = min_value.min(node_value);
            max_value = max_value.max(node_value);
            beta = sum_value * sum_value * alpha;
            let new_ratio = (max_value / beta).max(beta / min_value);
            if new_ratio > min_ratio {
                sum_value -= node_value;
                break;
            }
            min_ratio = new_ratio;
            i1 += 1;
        }

        let row = &mut nodes[i0..i1];
        if dx < dy {
            let row_y1 = if value != 0.0 { y0 + dy * sum_value / value } else { y1 };
            dice(row, sum_value, x0, y0, x1, row_y1);
            if value != 0.0 {
                y0 = row_y1;
            }
        } else {
            let row_x1 = if value != 0.0 { x0 + dx * sum_value / value } else { x1 };
            slice(row, sum_value, x0, y0, row_x1, y1);
            if value != 0.0 {
                x0 = row_x1;
            }
        }

        value -= sum_value;
        i0 = i1;
    }
}

/// Split a row horizontally.
fn dice(row: &mut [Rect], row_value: f64, mut x0: f64, y0: f64, x1: f64, y1: f64) {
    let k = if row_value != 0.0 { (x1 - x0) / row_value } else { 0.0 };
    for node in row {
        node.y0 = y0;
        node.y1 = y1;
        node.x0 = x0;
        x0 += node.value * k;
        node.x1 = x0;
    }
}

/// Split a row vertically.
fn slice(row: &mut [Rect], row_value: f64, x0: f64, mut y0: f64, x1: f64, y1: f64) {
    let k = if row_value != 0.0 { (y1 - y0) / row_value } else { 0.0 };
    for node in row {
        node.x0 = x0;
        node.x1 = x1;
        node.y0 = y0;
        y0 += node.value * k;
        node.y1 = y0;
    }
}

fn shrink(mut node: Rect, by: f64) -> Rect {
    node.x0 += by;
    node.y0 += by;
    node.x1 -= by;
    node.y1 -= by;
    if node.x1 < node.x0 {
        let mid = (node.x0 + node.x1) / 2.0;
        node.x0 = mid;
        node.x1 = mid;
    }
    if node.y1 < node.y0 {
        let mid = (node.y0 + node.y1) / 2.0;
        node.y0 = mid;
        node.y1 = mid;
    }
    node
}

fn round_rect(mut node: Rect) -> Rect {
    // half-up, so -0.5 rounds to 0
    let round = |v: f64| (v + 0.5).floor();
    node.x0 = round(node.x0);
    node.y0 = round(node.y0);
    node.x1 = round(node.x1);
    node.y1 = round(node.y1);
    node
}
