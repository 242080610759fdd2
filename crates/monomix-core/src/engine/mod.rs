//! Mixing engine - effect channels and the render loop
//!
//! - [`ChannelPool`]: fixed bank of sample channels, one lock per channel
//! - [`Mixer`]: render thread combining music and channels once per period

mod channel;
mod error;
mod mixer;

pub use channel::*;
pub use error::*;
pub use mixer::*;
