pub mod app;
pub mod config;
pub mod display;
pub mod engine;
pub mod modulator;
pub mod raster;
pub mod render;
pub mod warp;
