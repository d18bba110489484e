use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;

#[test]
fn test_mode_accepts_valid_config() {
    let cfg_content = r#"
egress:
  - type: direct
    name: DIRECT
rule:
  - "DEFAULT,DIRECT,none"
"#;
    let cfg_path = "tests/tmp_valid_config.yaml";
    fs::write(cfg_path, cfg_content).expect("write config");

    let mut cmd = cargo_bin_cmd!("rdcross");
    cmd.arg("--config").arg(cfg_path).arg("--test");
    cmd.assert().success();

    let _ = fs::remove_file(cfg_path);
}

#[test]
fn test_mode_rejects_invalid_config() {
    let cfg_content = r#"
egress:
  - type: direct
    name: DIRECT
  - type: direct
    name: DIRECT
rule:
  - "DEFAULT,DIRECT,none"
"#;
    let cfg_path = "tests/tmp_invalid_config.yaml";
    fs::write(cfg_path, cfg_content).expect("write config");

    let mut cmd = cargo_bin_cmd!("rdcross");
    cmd.arg("--config").arg(cfg_path).arg("--test");
    cmd.assert().failure();

    let _ = fs::remove_file(cfg_path);
}
