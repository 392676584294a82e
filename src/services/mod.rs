pub mod auto_haste;
pub mod config;
pub mod dispatcher;
pub mod monitor_loop;
pub mod ocr;
pub mod ocr_server;
pub mod region_store;
pub mod screen_capture;
pub mod threshold_monitor;
