pub mod render_present;
