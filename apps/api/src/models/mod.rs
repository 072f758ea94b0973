pub mod lesson;
pub mod resolution;
