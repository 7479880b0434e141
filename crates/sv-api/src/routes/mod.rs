pub mod alerts;
pub mod matrix;
pub mod signals;
