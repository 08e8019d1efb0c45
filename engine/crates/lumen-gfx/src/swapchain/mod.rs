pub mod surface_image;
pub mod surface_support;
