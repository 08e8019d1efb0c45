pub mod bindless_table;
pub mod frame_counter;
pub mod pipeline_settings;
