//! config.rs
//! Editor geometry used when the store has to place floating endpoints.

use crate::error::GraphResult;
use crate::store::{Direction, Point};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Node bounds, measured from the node's position (its top-left corner).
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between a node's bounds and the floating endpoint of a new connection.
    pub connection_offset: f64,
    /// Offset of the floating endpoint created together with a new node.
    pub new_node_offset: f64,
    /// How far a rejected endpoint is pushed away from the node it was dropped on.
    pub cycle_displacement: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            node_width: 160.0,
            node_height: 60.0,
            connection_offset: 80.0,
            new_node_offset: 120.0,
            cycle_displacement: 40.0,
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(s: &str) -> GraphResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn center_of(&self, position: Point) -> Point {
        Point::new(position.x + self.node_width / 2.0, position.y + self.node_height / 2.0)
    }

    /// Point just outside the node's bounds on the given side.
    pub fn anchor_outside(&self, position: Point, direction: Direction) -> Point {
        let c = self.center_of(position);
        match direction {
            Direction::Up => Point::new(c.x, position.y - self.connection_offset),
            Direction::Down => Point::new(c.x, position.y + self.node_height + self.connection_offset),
            Direction::Left => Point::new(position.x - self.connection_offset, c.y),
            Direction::Right => Point::new(position.x + self.node_width + self.connection_offset, c.y),
        }
    }

    pub fn contains(&self, position: Point, p: Point) -> bool {
        p.x >= position.x
            && p.x <= position.x + self.node_width
            && p.y >= position.y
            && p.y <= position.y + self.node_height
    }

    /// Moves `p` away from the centre of the node at `position` until it clears the bounds
    /// by `cycle_displacement`.
    pub fn displace_from(&self, position: Point, p: Point) -> Point {
        let c = self.center_of(position);
        let (mut dx, mut dy) = (p.x - c.x, p.y - c.y);
        let len = (dx * dx + dy * dy).sqrt();
        if len < f64::EPSILON {
            // Dropped dead centre: push straight down.
            dx = 0.0;
            dy = 1.0;
        } else {
            dx /= len;
            dy /= len;
        }
        let reach = (self.node_width.max(self.node_height) / 2.0) + self.cycle_displacement;
        Point::new(c.x + dx * reach, c.y + dy * reach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = EditorConfig::from_toml_str("node_width = 200.0\ncycle_displacement = 10.0").unwrap();
        assert_eq!(cfg.node_width, 200.0);
        assert_eq!(cfg.cycle_displacement, 10.0);
        assert_eq!(cfg.node_height, EditorConfig::default().node_height);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EditorConfig::from_toml_str("node_width = \"wide\"").unwrap_err();
        assert!(matches!(err, crate::error::GraphError::Config(_)));
    }

    #[test]
    fn test_displaced_point_leaves_bounds() {
        let cfg = EditorConfig::default();
        let origin = Point::new(0.0, 0.0);
        let dropped = Point::new(100.0, 35.0);
        assert!(cfg.contains(origin, dropped));
        assert!(!cfg.contains(origin, cfg.displace_from(origin, dropped)));
        assert!(!cfg.contains(origin, cfg.displace_from(origin, cfg.center_of(origin))));
    }
}
