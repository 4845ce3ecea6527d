pub mod analyze;
pub mod enumerate;
