use std::collections::HashMap;
use std::path::Path;

use petgraph::stable_graph::{NodeIndex, StableUnGraph};
use plotters::prelude::*;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{Result, SabiaError};

pub const DEFAULT_RELATION_WEIGHT: f64 = 1.0;

const LAYOUT_ITERATIONS: usize = 50;
const LAYOUT_K: f64 = 0.5;
const CANVAS_SIZE: (u32, u32) = (800, 600);
const CANVAS_MARGIN: f64 = 70.0;
const NODE_RADIUS: i32 = 14;

/// Undirected weighted concept graph. Stable indices keep the label map
/// valid across removals.
pub struct MindMap {
    graph: StableUnGraph<String, f64>,
    indices: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapStats {
    pub concepts: usize,
    pub relations: usize,
}

impl Default for MindMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MindMap {
    pub fn new() -> Self {
        MindMap {
            graph: StableUnGraph::default(),
            indices: HashMap::new(),
        }
    }

    /// Adds `label` (idempotent for the node) and one default-weight edge to
    /// each entry of `related`, creating missing endpoints. Existing edges
    /// keep their weight; only missing ones are created.
    pub fn add_concept(&mut self, label: &str, related: &[String]) -> Result<()> {
        validate_label(label)?;
        for other in related {
            validate_label(other)?;
        }

        let node = self.ensure_node(label);
        for other in related {
            let other_node = self.ensure_node(other);
            if self.graph.find_edge(node, other_node).is_none() {
                self.graph.add_edge(node, other_node, DEFAULT_RELATION_WEIGHT);
            }
        }

        debug!(concept = label, related = related.len(), "concept added");
        Ok(())
    }

    /// Creates or overwrites the `(a, b)` relation; last write wins on
    /// weight. Missing endpoints are created.
    pub fn add_relation(&mut self, a: &str, b: &str, weight: f64) -> Result<()> {
        validate_label(a)?;
        validate_label(b)?;

        let na = self.ensure_node(a);
        let nb = self.ensure_node(b);
        self.graph.update_edge(na, nb, weight);
        Ok(())
    }

    /// Changes the weight of an existing relation only.
    pub fn update_weight(&mut self, a: &str, b: &str, weight: f64) -> Result<()> {
        let na = self.index_of(a)?;
        let nb = self.index_of(b)?;
        let edge = self.graph.find_edge(na, nb).ok_or_else(|| {
            SabiaError::NotFound(format!("no relation between '{}' and '{}'", a, b))
        })?;

        if let Some(w) = self.graph.edge_weight_mut(edge) {
            *w = weight;
        }
        Ok(())
    }

    /// Removes the concept and every incident relation.
    pub fn remove_concept(&mut self, label: &str) -> Result<()> {
        let node = self
            .indices
            .remove(label)
            .ok_or_else(|| SabiaError::NotFound(format!("unknown concept '{}'", label)))?;
        self.graph.remove_node(node);
        Ok(())
    }

    /// Adjacent concept labels, iteration order unspecified.
    pub fn neighbors(&self, label: &str) -> Result<Vec<String>> {
        let node = self.index_of(label)?;
        Ok(self
            .graph
            .neighbors(node)
            .map(|ix| self.graph[ix].clone())
            .collect())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.indices.contains_key(label)
    }

    pub fn concepts(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|ix| self.graph[ix].clone())
            .collect()
    }

    pub fn relations(&self) -> Vec<(String, String, f64)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let weight = *self.graph.edge_weight(e)?;
                Some((self.graph[a].clone(), self.graph[b].clone(), weight))
            })
            .collect()
    }

    pub fn stats(&self) -> MapStats {
        MapStats {
            concepts: self.graph.node_count(),
            relations: self.graph.edge_count(),
        }
    }

    /// Runs the spring layout and draws the graph to an SVG file at
    /// `output_path`. The in-memory graph is never touched by a failure here.
    pub fn render(&self, output_path: &Path) -> Result<()> {
        let extension = output_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if extension.as_deref() != Some("svg") {
            return Err(SabiaError::Render(format!(
                "unsupported image format for {} (only .svg output is supported)",
                output_path.display()
            )));
        }

        let (nodes, positions) = self.spring_layout();

        let (width, height) = CANVAS_SIZE;
        let scale_x = |x: f64| (CANVAS_MARGIN + x * (width as f64 - 2.0 * CANVAS_MARGIN)) as i32;
        let scale_y = |y: f64| (CANVAS_MARGIN + y * (height as f64 - 2.0 * CANVAS_MARGIN)) as i32;

        let root = SVGBackend::new(output_path, CANVAS_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        root.draw(&Text::new(
            "Mapa Mental Sabiá",
            (16, 12),
            ("sans-serif", 22).into_font().color(&BLACK),
        ))
        .map_err(render_err)?;

        let placed: HashMap<NodeIndex, (i32, i32)> = nodes
            .iter()
            .zip(positions.iter())
            .map(|(&ix, &(x, y))| (ix, (scale_x(x), scale_y(y))))
            .collect();

        for (a, b, weight) in self.indexed_relations() {
            let (Some(&(x1, y1)), Some(&(x2, y2))) = (placed.get(&a), placed.get(&b)) else {
                continue;
            };
            let stroke = ((weight * 1.5).clamp(1.0, 5.0)) as u32;
            root.draw(&PathElement::new(
                vec![(x1, y1), (x2, y2)],
                BLACK.mix(0.4).stroke_width(stroke),
            ))
            .map_err(render_err)?;

            root.draw(&Text::new(
                format!("{:.1}", weight),
                ((x1 + x2) / 2 + 4, (y1 + y2) / 2 - 6),
                ("sans-serif", 12).into_font().color(&BLACK.mix(0.6)),
            ))
            .map_err(render_err)?;
        }

        for (&ix, &(x, y)) in &placed {
            root.draw(&Circle::new(
                (x, y),
                NODE_RADIUS,
                RGBColor(96, 165, 250).filled(),
            ))
            .map_err(render_err)?;
            root.draw(&Circle::new(
                (x, y),
                NODE_RADIUS,
                RGBColor(30, 64, 175).stroke_width(2),
            ))
            .map_err(render_err)?;
            root.draw(&Text::new(
                self.graph[ix].clone(),
                (x + NODE_RADIUS + 4, y - 7),
                ("sans-serif", 14).into_font().color(&BLACK),
            ))
            .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
        info!(
            file = %output_path.display(),
            concepts = self.graph.node_count(),
            relations = self.graph.edge_count(),
            "mental map rendered"
        );
        Ok(())
    }

    fn indexed_relations(&self) -> Vec<(NodeIndex, NodeIndex, f64)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let weight = *self.graph.edge_weight(e)?;
                Some((a, b, weight))
            })
            .collect()
    }

    /// Fruchterman-Reingold in the unit square: repulsion between every
    /// pair, attraction along edges, displacement capped by a temperature
    /// that cools linearly to zero over `LAYOUT_ITERATIONS` rounds. Initial
    /// placement is random, so positions differ between runs.
    fn spring_layout(&self) -> (Vec<NodeIndex>, Vec<(f64, f64)>) {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut rng = rand::thread_rng();
        let mut positions: Vec<(f64, f64)> = nodes
            .iter()
            .map(|_| (rng.gen::<f64>(), rng.gen::<f64>()))
            .collect();

        if nodes.len() == 1 {
            positions[0] = (0.5, 0.5);
        }
        if nodes.len() < 2 {
            return (nodes, positions);
        }

        let slot_of: HashMap<NodeIndex, usize> = nodes
            .iter()
            .copied()
            .enumerate()
            .map(|(slot, ix)| (ix, slot))
            .collect();

        let k = LAYOUT_K;
        let mut temperature = 0.1;
        let cooling = temperature / (LAYOUT_ITERATIONS as f64 + 1.0);

        for _ in 0..LAYOUT_ITERATIONS {
            let mut disp = vec![(0.0f64, 0.0f64); nodes.len()];

            for i in 0..nodes.len() {
                for j in (i + 1)..nodes.len() {
                    let dx = positions[i].0 - positions[j].0;
                    let dy = positions[i].1 - positions[j].1;
                    let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                    let force = k * k / dist;
                    let (fx, fy) = (dx / dist * force, dy / dist * force);
                    disp[i].0 += fx;
                    disp[i].1 += fy;
                    disp[j].0 -= fx;
                    disp[j].1 -= fy;
                }
            }

            for (a, b, _) in self.indexed_relations() {
                let (Some(&i), Some(&j)) = (slot_of.get(&a), slot_of.get(&b)) else {
                    continue;
                };
                let dx = positions[i].0 - positions[j].0;
                let dy = positions[i].1 - positions[j].1;
                let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                let force = dist * dist / k;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[i].0 -= fx;
                disp[i].1 -= fy;
                disp[j].0 += fx;
                disp[j].1 += fy;
            }

            for i in 0..nodes.len() {
                let (dx, dy) = disp[i];
                let len = (dx * dx + dy * dy).sqrt();
                if len > 0.0 {
                    let step = len.min(temperature);
                    positions[i].0 = (positions[i].0 + dx / len * step).clamp(0.0, 1.0);
                    positions[i].1 = (positions[i].1 + dy / len * step).clamp(0.0, 1.0);
                }
            }

            temperature -= cooling;
        }

        (nodes, positions)
    }

    fn index_of(&self, label: &str) -> Result<NodeIndex> {
        self.indices
            .get(label)
            .copied()
            .ok_or_else(|| SabiaError::NotFound(format!("unknown concept '{}'", label)))
    }

    fn ensure_node(&mut self, label: &str) -> NodeIndex {
        if let Some(&ix) = self.indices.get(label) {
            return ix;
        }
        let ix = self.graph.add_node(label.to_string());
        self.indices.insert(label.to_string(), ix);
        ix
    }
}

fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(SabiaError::Validation("empty concept label".to_string()));
    }
    Ok(())
}

fn render_err<E: std::fmt::Display>(e: E) -> SabiaError {
    SabiaError::Render(e.to_string())
}
