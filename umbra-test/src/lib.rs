//! Testing utilities for umbra.
//!
//! [`SoftwareDevice`] rasterizes on the CPU with real depth and stencil
//! buffers, so the stencil counts the shadow renderer produces can be checked
//! pixel by pixel. [`TestRunner`] does the same frames on a GPU through
//! umbra-routine, when one is available.

mod helpers;
mod raster;
mod runner;

pub use tokio::test as test_attr;

pub use helpers::*;
pub use raster::SoftwareDevice;
pub use runner::{FrameRenderSettings, TestRunner};
