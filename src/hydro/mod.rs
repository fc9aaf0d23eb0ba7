pub mod error;
pub mod euler;
pub mod geometry;
pub mod limiter;
pub mod riemann;
