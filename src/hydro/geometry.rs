/**
 * Enum to hold a unit vector along one of the grid axes
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction { X, Y, Z }




// ============================================================================
impl Direction {

    pub fn from_axis(axis: usize) -> Self {
        match axis {
            0 => Direction::X,
            1 => Direction::Y,
            2 => Direction::Z,
            _ => panic!("no such axis: {}", axis),
        }
    }

    pub fn axis(&self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }

    pub fn along(&self, other: Direction) -> f64 {
        if *self == other { 1.0 } else { 0.0 }
    }
}
