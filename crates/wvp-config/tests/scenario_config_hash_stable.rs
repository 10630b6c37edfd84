//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same documents twice yields the same `config_hash`.
//! - Reordering keys within a document does not change the hash.
//! - An overlay changes both the effective value and the hash.

use wvp_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
ledger:
  contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
  gas_limit: 1000000
paper:
  cooldown_secs: 900
  auto_mine: true
"#;

const BASE_YAML_REORDERED: &str = r#"
paper:
  auto_mine: true
  cooldown_secs: 900
ledger:
  gas_limit: 1000000
  contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#;

const OVERLAY_YAML: &str = r#"
paper:
  cooldown_secs: 0
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "key order in the source must not change the hash"
    );
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);
    let cfg = merged.client().unwrap();
    assert_eq!(cfg.paper.cooldown_secs, 0);
    assert_eq!(cfg.gas_limit, Some(1_000_000), "base value must survive the overlay");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
