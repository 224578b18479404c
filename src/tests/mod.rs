mod test_utils;

mod monitor_test;

#[cfg(feature = "yaml_config")]
mod loader_test;
