pub mod depth_image;
