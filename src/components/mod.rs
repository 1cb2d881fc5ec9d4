pub mod editor;
pub mod references;
pub mod tools;
