pub mod audio_channel;
pub mod loopback_delegate;
