pub mod batch_warp;
pub mod config;
pub mod parse_xml;
