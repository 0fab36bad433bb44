use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.xdg_config.join("tally/config.toml");
        fs::create_dir_all(path.parent().expect("missing config parent"))
            .expect("failed to create config dir");
        fs::write(&path, contents).expect("failed to write config");
        path
    }
}

fn run_tally(env: &CliTestEnv, args: &[&str]) -> Output {
    let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("tally")));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("TALLY_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute tally: {e}"))
}

#[test]
fn status_reports_missing_api_key() {
    let env = CliTestEnv::new();

    let output = run_tally(&env, &["status"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("API Key:         <not set>"));
    assert!(stdout.contains("No API key configured"));
}

#[test]
fn status_reports_log_file_under_state_dir() {
    let env = CliTestEnv::new();

    let output = run_tally(&env, &["status"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = env.xdg_state.join("tally/tally.log");
    assert!(stdout.contains(&format!("Log File:        {}", expected.display())));
}

#[test]
fn status_masks_configured_api_key() {
    let env = CliTestEnv::new();
    env.write_config("[tracker]\napi_key = \"secret-key\"\n");

    let output = run_tally(&env, &["status"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("secr****"));
    assert!(!stdout.contains("secret-key"));
}

#[test]
fn explicit_config_path_is_used() {
    let env = CliTestEnv::new();
    let path = env.home.join("custom.toml");
    fs::write(&path, "[tracker]\napi_key = \"custom-key\"\ntimeout_secs = 7\n")
        .expect("failed to write config");
    let path = path.to_string_lossy().to_string();

    let output = run_tally(&env, &["--config", &path, "status"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cust****"));
    assert!(stdout.contains("Timeout:         7s"));
}

#[test]
fn track_without_api_key_fails() {
    let env = CliTestEnv::new();

    let output = run_tally(&env, &["track", "alice", "login"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("credential not initialized"));
}

#[test]
fn track_rejects_malformed_property() {
    let env = CliTestEnv::new();

    let output = run_tally(&env, &["track", "alice", "login", "--prop", "oops"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected key=value"));
}
