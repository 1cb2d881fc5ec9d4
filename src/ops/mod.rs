pub mod compositor;
pub mod hit_test;
pub mod paint;
pub mod raster;
pub mod shapes;
pub mod submit;
