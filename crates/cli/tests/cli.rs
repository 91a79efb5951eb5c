use assert_cmd::Command;
use predicates::prelude::*;

fn cli(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cosmos-probe-cli").unwrap();
    cmd.current_dir(config_dir)
        .env("PROBE_CONFIG_DIR", config_dir)
        .env_remove("PROBE_ENV")
        .env_remove("RUST_LOG")
        .env_remove("AZURE_COSMOSDB_ACCOUNT")
        .env_remove("AZURE_COSMOSDB_ACCOUNT_KEY")
        .env_remove("AZURE_COSMOSDB_DATABASE")
        .env_remove("AZURE_COSMOSDB_CONVERSATIONS_CONTAINER");
    cmd
}

#[test]
fn help_lists_flags() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--validate"))
        .stdout(predicate::str::contains("--show-config"));
}

#[test]
fn show_config_prints_defaults_with_redacted_key() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "endpoint: https://db-architectcopilot.documents.azure.com:443/",
        ))
        .stdout(predicate::str::contains("database: db_conversation_history"))
        .stdout(predicate::str::contains("container: conversations"))
        .stdout(predicate::str::contains("key: ***"))
        .stdout(predicate::str::contains("your_primary_key_here").not());
}

#[test]
fn show_config_applies_environment_and_flags() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .env("AZURE_COSMOSDB_DATABASE", "from_env")
        .args(["--show-config", "--container", "from_flag"])
        .assert()
        .success()
        .stdout(predicate::str::contains("database: from_env"))
        .stdout(predicate::str::contains("container: from_flag"));
}

#[test]
fn unknown_environment_fails() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .env("PROBE_ENV", "qa")
        .arg("--show-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported environment 'qa'"));
}
