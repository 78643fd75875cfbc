//! `wgpu` side of the renderer.
//!
//! - `context` owns instance/device/surface wiring and picks the MSAA sample
//!   count for the HDR scene target.
//! - `points` draws the particle cloud as instanced billboards with one
//!   pipeline per blend mode.
//! - `bloom` owns the offscreen targets and the threshold, blur and composite
//!   stages that produce the presented frame.
//! - `uniforms` mirrors the WGSL uniform blocks.
//! - `backend` glues everything together behind [`crate::SceneBackend`].

mod backend;
mod bloom;
mod context;
mod points;
mod shaders;
mod uniforms;

pub use backend::GpuBackend;
