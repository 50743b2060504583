use std::collections::HashMap;
use std::path::Path;

use test_case::test_case;

use crate::config::{DEFAULT_TILE_SIZE, SchedulerConfig};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_builder_defaults() {
    let config = SchedulerConfig::builder().build();
    assert_eq!(config, SchedulerConfig::default());
    assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
    assert!(config.tiling_dir().is_none());
    assert!(!config.nofuse);
}

#[test]
fn test_from_lookup() {
    let config = SchedulerConfig::from_lookup(lookup(&[
        ("TESSEL_TILING_DIR", "/opt/slope"),
        ("TESSEL_TILE_SIZE", "64"),
        ("TESSEL_NOFUSE", "1"),
    ]));
    assert_eq!(config.tiling_dir(), Some(Path::new("/opt/slope")));
    assert_eq!(config.tile_size, 64);
    assert!(config.nofuse);
}

#[test_case(&[] => None; "unset")]
#[test_case(&[("TESSEL_TILING_DIR", "")] => None; "empty")]
#[test_case(&[("TESSEL_TILING_DIR", "/st")] => Some("/st".to_string()); "set")]
fn test_tiling_dir_lookup(vars: &[(&str, &str)]) -> Option<String> {
    SchedulerConfig::from_lookup(lookup(vars)).tiling_dir().map(|dir| dir.display().to_string())
}

#[test]
fn test_unparsable_tile_size_uses_default() {
    let config = SchedulerConfig::from_lookup(lookup(&[("TESSEL_TILE_SIZE", "large")]));
    assert_eq!(config.tile_size, DEFAULT_TILE_SIZE);
}

#[test_case(0 => 128; "zero takes default")]
#[test_case(32 => 32; "explicit wins")]
fn test_tile_size_for(requested: usize) -> usize {
    SchedulerConfig::builder().tile_size(128).build().tile_size_for(requested)
}

#[test]
fn test_engine_build_options() {
    assert!(SchedulerConfig::default().engine_build_options("st").is_none());

    let options = SchedulerConfig::builder().tiling_dir("/opt/slope").build().engine_build_options("st").unwrap();
    assert_eq!(options.cppargs, vec!["-I/opt/slope/sparsetiling/include".to_string()]);
    assert_eq!(options.ldargs, vec!["-L/opt/slope/lib".to_string(), "-lst".to_string()]);
}
