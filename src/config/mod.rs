//! JSON configuration for the offline tools, one file per binary.

pub mod camera;
pub mod perspective;
pub mod tracking;
