pub mod math;
pub mod text;
