//! Audio-host side of patchbay: hot-swapping compiled patches into live
//! processing nodes.
//!
//! Each target the host owns has a [`HotSwap`]: a processing node whose
//! ports follow the loaded module's channel counts, and an atomically
//! published instance the audio thread reads through an [`AudioPath`].
//! The [`Host`] maps target ids to these, talks to the editor process, and
//! persists saved states.
//!
//! # Threads
//!
//! - **Control thread**: everything on [`Host`] and [`HotSwap`]. Loading,
//!   port reconciliation and dropping old instances all happen here.
//! - **Audio thread**: [`AudioPath::process`] only. It loads the published
//!   pointer and `try_lock`s the processor; it never waits.
//!
//! # Example
//!
//! ```rust
//! use patchbay_host::{HotSwap, LoadedModule, Processor};
//!
//! struct Dc(f32);
//! impl Processor for Dc {
//!     fn input_channels(&self) -> usize { 0 }
//!     fn output_channels(&self) -> usize { 1 }
//!     fn process(&mut self, _: &[&[f32]], out: &mut [&mut [f32]], frames: usize) {
//!         out[0][..frames].fill(self.0);
//!     }
//! }
//!
//! let mut swap = HotSwap::new();
//! let audio = swap.audio_path();
//! swap.publish(LoadedModule::new("dc.so", Box::new(Dc(0.5))));
//!
//! let mut block = [0.0f32; 64];
//! audio.process(&[], &mut [&mut block[..]], 64);
//! assert_eq!(block[0], 0.5);
//! ```

mod error;
mod host;
mod module;
mod native;
mod ports;
mod swap;

pub use error::HostError;
pub use host::{EditorLink, Host, Target, TickReport};
pub use module::{LoadedModule, ModuleLoader, Processor, module_stem};
pub use native::NativeLoader;
pub use ports::{Port, PortChanges, PortDelta, PortSide, ProcessingNode, Wire};
pub use swap::{AudioPath, HotSwap};
