pub mod forward_stage;
pub mod overlay_stage;
