pub mod run_multi;
