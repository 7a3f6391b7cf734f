pub mod frame_buffer;
pub mod level_meter;
