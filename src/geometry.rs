//! Grid-relative screen geometry for drag selection.
//!
//! All coordinates are relative to the top-left corner of the grid, so the
//! selection logic never needs to know where the grid sits on the page.

use crate::data::{hours, TimeCell};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }
}

/// Axis-aligned rectangle, edges included
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Rect {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The rectangle spanned by two opposite corners, in any order
    pub fn from_corners(a: Point, b: Point) -> Rect {
        Rect {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn contains(&self, point: Point) -> bool {
        self.left <= point.x && point.x <= self.right && self.top <= point.y && point.y <= self.bottom
    }

    /// Two rectangles intersect unless one lies entirely to the left, right,
    /// above or below the other. Touching edges intersect.
    ///
    /// # Examples
    /// ```
    /// use zeitraster_libs::geometry::Rect;
    ///
    /// let cell = Rect::new(10.0, 10.0, 20.0, 20.0);
    ///
    /// assert!(Rect::new(0.0, 0.0, 30.0, 30.0).intersects(&cell));
    /// assert!(Rect::new(15.0, 15.0, 30.0, 30.0).intersects(&cell));
    /// assert!(Rect::new(20.0, 0.0, 30.0, 10.0).intersects(&cell));
    /// assert!(!Rect::new(21.0, 0.0, 30.0, 30.0).intersects(&cell));
    /// ```
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }
}

/// Where the cells of the grid are drawn.
///
/// Implemented by the presentation layer; `cells` yields cells in
/// presentation order (row by row), which is the order of a selection's
/// swept cells.
pub trait GridGeometry {
    fn cells(&self) -> Vec<(TimeCell, Rect)>;

    fn cell_at(&self, point: Point) -> Option<TimeCell> {
        self.cells()
            .into_iter()
            .find(|(_, bounds)| bounds.contains(point))
            .map(|(cell, _)| cell)
    }
}

/// Hours as rows, dates as columns, every cell the same size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UniformGrid {
    pub dates: Vec<NaiveDate>,
    /// Top-left corner of the first cell, past the hour labels and date headers
    pub origin: Point,
    pub cell_width: f64,
    pub cell_height: f64,
    #[serde(default)]
    pub gap: f64,
}

impl UniformGrid {
    pub fn new(dates: Vec<NaiveDate>, origin: Point, cell_width: f64, cell_height: f64) -> UniformGrid {
        UniformGrid {
            dates,
            origin,
            cell_width,
            cell_height,
            gap: 0.0,
        }
    }

    pub fn bounds(&self, column: usize, row: usize) -> Rect {
        let left = self.origin.x + column as f64 * (self.cell_width + self.gap);
        let top = self.origin.y + row as f64 * (self.cell_height + self.gap);
        Rect::new(left, top, left + self.cell_width, top + self.cell_height)
    }
}

impl GridGeometry for UniformGrid {
    fn cells(&self) -> Vec<(TimeCell, Rect)> {
        hours()
            .enumerate()
            .flat_map(|(row, hour)| {
                self.dates.iter().enumerate().map(move |(column, &date)| {
                    (TimeCell { date, hour }, self.bounds(column, row))
                })
            })
            .collect()
    }
}
