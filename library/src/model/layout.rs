//! Block geometry used to place port anchors.

use serde::{Deserialize, Serialize};

use super::port::PortDirection;

pub const BLOCK_WIDTH: f64 = 200.0;
pub const HEADER_HEIGHT: f64 = 30.0;
pub const PORT_ROW_HEIGHT: f64 = 20.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Screen coordinate of the `row`-th port of the given direction.
///
/// Input ports sit on the left edge, outputs on the right, one row each below the header.
pub fn port_anchor(block: Position, direction: PortDirection, row: usize) -> Position {
    let x = match direction {
        PortDirection::In => block.x,
        PortDirection::Out => block.x + BLOCK_WIDTH,
    };
    let y = block.y + HEADER_HEIGHT + PORT_ROW_HEIGHT * (row as f64 + 0.5);
    Position::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_anchor_sides() {
        let origin = Position::new(10.0, 20.0);
        let a = port_anchor(origin, PortDirection::In, 0);
        let b = port_anchor(origin, PortDirection::Out, 1);
        assert_eq!(a.x, 10.0);
        assert_eq!(b.x, 10.0 + BLOCK_WIDTH);
        assert!(b.y > a.y);
    }
}
