#![allow(dead_code)]
pub mod fake_feed;
pub mod prepare_env;
