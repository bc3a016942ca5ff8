//! End-to-end checks of commands that run without cloud access

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stackforge(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackforge").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("AWS_DEFAULT_REGION", "us-east-1")
        .env("AWS_ACCESS_KEY_ID", "test")
        .env("AWS_SECRET_ACCESS_KEY", "test")
        .env("AWS_EC2_METADATA_DISABLED", "true")
        .env_remove("AWS_PROFILE")
        .env_remove("AWS_DEFAULT_PROFILE")
        .env_remove("STACKFORGE_CONFIG")
        .current_dir(home);
    cmd
}

fn write_template(dir: &Path) {
    fs::write(
        dir.join("template.yaml"),
        r#"
AWSTemplateFormatVersion: "2010-09-09"
Parameters:
  Env:
    Type: String
    Default: prod
  Size:
    Type: Number
Resources:
  Bucket:
    Type: AWS::S3::Bucket
"#,
    )
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    stackforge(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("invalidate"));
}

#[test]
fn test_parameters_prints_defaults() {
    let home = TempDir::new().unwrap();
    let project = home.path().join("web");
    fs::create_dir(&project).unwrap();
    write_template(&project);

    stackforge(home.path())
        .arg("parameters")
        .arg(&project)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("---\n"))
        .stdout(predicate::str::contains("Env: prod\n"))
        .stdout(predicate::str::contains("Size: \n"));
}

#[test]
fn test_compile_template_without_includes() {
    let home = TempDir::new().unwrap();
    write_template(home.path());

    stackforge(home.path())
        .arg("compile")
        .arg(home.path().join("template.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Bucket:"))
        .stdout(predicate::str::contains("AWS::S3::Bucket"));
}

#[test]
fn test_compile_cloud_init_embeds_files() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("motd"), "hello\n").unwrap();
    fs::write(
        home.path().join("server.init"),
        "write_files:\n  - path: /etc/motd\n    file: motd\n",
    )
    .unwrap();

    stackforge(home.path())
        .arg("compile")
        .arg(home.path().join("server.init"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#cloud-config\n"))
        .stdout(predicate::str::contains("/etc/motd"));
}

#[test]
fn test_missing_template_fails() {
    let home = TempDir::new().unwrap();
    stackforge(home.path())
        .arg("compile")
        .arg(home.path().join("nothing-here.yaml"))
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_malformed_param_fails_before_deploying() {
    let home = TempDir::new().unwrap();
    write_template(home.path());

    stackforge(home.path())
        .arg("create")
        .arg(home.path().join("template.yaml"))
        .arg("web")
        .args(["-p", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be KEY=VALUE"));
}

#[test]
fn test_compile_reads_param_import() {
    let home = TempDir::new().unwrap();
    write_template(home.path());
    fs::write(home.path().join("params.yaml"), "prod:\n  Size: 3\n").unwrap();

    stackforge(home.path())
        .arg("compile")
        .arg(home.path().join("template.yaml"))
        .args(["-i", "params.yaml", "-k", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing parameter section 'staging'"));

    stackforge(home.path())
        .arg("compile")
        .arg(home.path().join("template.yaml"))
        .args(["-i", "params.yaml", "-k", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AWS::S3::Bucket"));
}

#[test]
fn test_import_key_requires_import() {
    let home = TempDir::new().unwrap();
    stackforge(home.path())
        .args(["create", "template.yaml", "-k", "prod"])
        .assert()
        .failure();
}
