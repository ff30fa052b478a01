//! Playback of assistant audio
//!
//! - `scheduler`: gapless ordering and interruption
//! - `mixer`: sample timeline shared by the output devices
//! - `virtual_output`: clock without speakers, optional WAV recording
//! - `speaker`: default output device (feature `audio-io`)

pub mod mixer;
pub mod output;
pub mod scheduler;
pub mod virtual_output;

#[cfg(feature = "audio-io")]
pub mod speaker;

pub use mixer::{MixerConfig, OutputMixer};
pub use output::{EndedCallback, OutputDevice, PlayableBuffer, SourceId};
pub use scheduler::{PlaybackScheduler, ScheduledSource};
pub use virtual_output::VirtualOutput;

#[cfg(feature = "audio-io")]
pub use speaker::SpeakerOutput;
