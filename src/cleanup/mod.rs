/// Image cleanup module
///
/// This module handles:
/// - Cutting the subject out of a photo (matte.rs)
/// - Compositing the cut-out onto a solid background (composite.rs)
/// - Running both over a folder of photos (batch.rs)

pub mod batch;
pub mod composite;
pub mod matte;
