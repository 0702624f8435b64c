//! Chart, line and point models for cross-build trend views.
//!
//! A chart owns a set of lines sharing one x-index domain. Lines hold a
//! bounded window of points: inserting beyond the history depth evicts the
//! oldest point first.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// One measured value within a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Per-chart x-index; one per contributing build, monotonic.
    pub x: u64,
    pub y: f64,
    /// Display label for the x position.
    pub label: String,
    /// Physical build number this point came from.
    pub build_number: u32,
    /// Caller-supplied formatted timestamp.
    pub timestamp: String,
}

/// One metric's bounded history of points within a chart.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: String,
    pub name: String,
    pub show_no_values: bool,
    capacity: usize,
    points: VecDeque<Point>,
}

impl Line {
    /// `capacity` must already be clamped to at least 1 by the caller.
    pub fn new(id: impl Into<String>, name: impl Into<String>, show_no_values: bool, capacity: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            show_no_values,
            capacity: capacity.max(1),
            points: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append a point, evicting the oldest one first when full.
    pub fn push(&mut self, point: Point) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A named collection of lines sharing an x-index domain.
#[derive(Debug, Clone)]
pub struct Chart {
    pub id: String,
    pub title: String,
    lines: Vec<Line>,
    x_index: u64,
}

impl Chart {
    pub fn new(id: impl Into<String>, title: impl Into<String>, lines: Vec<Line>) -> Self {
        Self { id: id.into(), title: title.into(), lines, x_index: 0 }
    }

    /// The x-index the next contributing build will be plotted at.
    pub fn x_index(&self) -> u64 {
        self.x_index
    }

    /// Advance the x-index after a build contributed at least one point.
    pub fn advance(&mut self) {
        self.x_index += 1;
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [Line] {
        &mut self.lines
    }

    /// Renderer-agnostic serialization: per line the ordered (x, y) pairs,
    /// plus a chart-wide x-index to label map keeping the first-seen label
    /// per index across all points of all lines.
    pub fn to_data(&self) -> ChartData {
        let mut x_labels = BTreeMap::new();
        for line in &self.lines {
            for point in line.points() {
                x_labels.entry(point.x).or_insert_with(|| point.label.clone());
            }
        }

        ChartData {
            id: self.id.clone(),
            title: self.title.clone(),
            lines: self
                .lines
                .iter()
                .map(|line| LineData {
                    id: line.id.clone(),
                    name: line.name.clone(),
                    points: line.points().map(|p| (p.x, p.y)).collect(),
                })
                .collect(),
            x_labels,
        }
    }
}

/// Serialized chart, independent of any renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub id: String,
    pub title: String,
    pub lines: Vec<LineData>,
    pub x_labels: BTreeMap<u64, String>,
}

/// Serialized line: ordered (x, y) pairs plus a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    pub id: String,
    pub name: String,
    pub points: Vec<(u64, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point(x: u64, y: f64) -> Point {
        Point {
            x,
            y,
            label: format!("#{x}"),
            build_number: u32::try_from(x).unwrap_or(0),
            timestamp: String::new(),
        }
    }

    #[test]
    fn push_evicts_oldest_first() {
        let mut line = Line::new("v1", "Errors", false, 3);
        for i in 0..5 {
            line.push(point(i, f64::from(u32::try_from(i).unwrap())));
        }
        let xs: Vec<u64> = line.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut line = Line::new("v1", "Errors", false, 0);
        line.push(point(0, 1.0));
        line.push(point(1, 2.0));
        assert_eq!(line.len(), 1);
        assert_eq!(line.points().next().unwrap().x, 1);
    }

    #[test]
    fn label_map_keeps_first_seen_label_per_index() {
        let mut a = Line::new("a", "A", false, 10);
        let mut b = Line::new("b", "B", false, 10);
        a.push(Point { x: 0, y: 1.0, label: "#1".into(), build_number: 1, timestamp: String::new() });
        b.push(Point { x: 0, y: 2.0, label: "other".into(), build_number: 1, timestamp: String::new() });
        b.push(Point { x: 1, y: 3.0, label: "#2".into(), build_number: 2, timestamp: String::new() });

        let data = Chart::new("p1", "T", vec![a, b]).to_data();
        assert_eq!(data.x_labels[&0], "#1");
        assert_eq!(data.x_labels[&1], "#2");
    }

    proptest! {
        // For depth d >= 1 and n > d insertions, the stored points are the
        // last d inserted, in order.
        #[test]
        fn fifo_law(d in 1usize..20, extra in 1usize..40) {
            let n = d + extra;
            let mut line = Line::new("v", "V", false, d);
            for i in 0..n {
                line.push(point(i as u64, i as f64));
            }
            let xs: Vec<u64> = line.points().map(|p| p.x).collect();
            let expected: Vec<u64> = ((n - d)..n).map(|i| i as u64).collect();
            prop_assert_eq!(xs, expected);
        }
    }
}
