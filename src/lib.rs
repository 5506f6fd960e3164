// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `neural-style` is a light API for neural style transfer, an
//! optimization-based algorithm that recombines the content of one image
//! with the style of another.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the
//! builder pattern. Calling `build` on the `SessionBuilder` loads both input
//! images, checks for various errors and splices loss probes into a copy of
//! a convolutional feature-extraction stack.
//!
//! `Session` has a `run()` method that optimizes an output pixel grid
//! against the captured content and style targets for a fixed iteration
//! budget, and returns the result as a `GeneratedImage`.
//!
//! You can save, stream, or inspect the image from `GeneratedImage`.
//!
//! ## Usage
//! Session follows a "builder pattern" for defining parameters, meaning you
//! chain functions together.
//!
//! ```no_run
//! // Create a new session with default parameters
//! let session = neural_style::Session::builder()
//!     // the image whose layout is kept
//!     .content(&"imgs/dancing.jpg")
//!     // the image whose look is transferred
//!     .style(&"imgs/picasso.jpg")
//!     // work at a manageable resolution
//!     .resize_input(neural_style::Dims::square(256))
//!     // Build the session
//!     .build().expect("failed to build session");
//!
//! // Optimize the output image
//! let generated_img = session.run(None);
//!
//! // Save the generated image to disk
//! generated_img.save("my_styled_img.jpg").expect("failed to save generated image");
//! ```
mod errors;
pub mod loss;
pub mod net;
mod optimizer;
pub mod session;
mod transfer;
mod utils;
use utils::*;

pub use image;
use std::path::Path;

pub use errors::Error;
pub use loss::{gram_matrix, ProbeKind};
pub use net::Layer;
pub use session::{GeneratorProgress, ProgressStat, ProgressUpdate, Session, SessionBuilder};
pub use transfer::{LossReadout, ProbeReading};
pub use utils::{load_dynamic_image, ImageSource};

use burn::backend::{ndarray::NdArray, Autodiff};

/// The tensor backend every session runs on: reverse-mode autodiff layered
/// over the CPU ndarray backend.
pub type DefaultBackend = Autodiff<NdArray>;

/// Simple dimensions struct
#[derive(Copy, Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Starting point of the output pixel grid
#[derive(Copy, Clone)]
pub enum Init {
    /// Start from a copy of the content image; converges quickly and keeps
    /// the content layout from the first iteration
    FromContent,
    /// Start from seeded uniform noise in `[0, 1]`
    Noise,
}

pub(crate) struct Parameters {
    pub(crate) iterations: u32,
    pub(crate) content_weight: f32,
    pub(crate) style_weight: f32,
    pub(crate) content_depths: Vec<usize>,
    pub(crate) style_depths: Vec<usize>,
    pub(crate) resize_input: Option<Dims>,
    pub(crate) init: Init,
    pub(crate) average_pooling: bool,
    pub(crate) progress_interval: u32,
    pub(crate) seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            iterations: 300,
            content_weight: 1.0,
            style_weight: 1000.0,
            content_depths: net::DEFAULT_CONTENT_DEPTHS.to_vec(),
            style_depths: net::DEFAULT_STYLE_DEPTHS.to_vec(),
            resize_input: None,
            init: Init::FromContent,
            average_pooling: false,
            progress_interval: 10,
            seed: 0,
        }
    }
}

/// An image generated by a `Session::run()`
pub struct GeneratedImage {
    inner: transfer::Generator<DefaultBackend>,
}

impl GeneratedImage {
    /// Saves the generated image to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(&parent_path)?;
        }

        self.inner.to_image().save(&path)?;
        Ok(())
    }

    /// Writes the generated image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        let dyn_img = self.into_image();
        Ok(dyn_img.write_to(writer, fmt)?)
    }

    /// The raw output pixel grid, channel-major `[3, H, W]` with every value
    /// in `[0, 1]`
    pub fn pixels(&self) -> &[f32] {
        self.inner.pixels()
    }

    /// The loss readout of the returned pixel grid, with one entry per probe
    pub fn final_losses(&self) -> Option<&LossReadout> {
        self.inner.last_readout()
    }

    /// Returns the generated output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgba8(self.inner.to_image())
    }
}
