//! Integration tests for docstash

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// The binary with config and cache isolated under `temp`
    fn docstash(temp: &TempDir) -> Command {
        let config = temp.path().join("config.toml");
        if !config.exists() {
            let cache = temp.path().join("cache");
            std::fs::write(
                &config,
                format!("[cache]\ndir = {:?}\ndebounce_ms = 10\n", cache.display().to_string()),
            )
            .unwrap();
        }
        let mut cmd = cargo_bin_cmd!("docstash");
        cmd.env("DOCSTASH_CONFIG", &config).env_remove("RUST_LOG");
        cmd
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("docstash"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[documents.watch]"));
    }

    #[test]
    fn config_set_persists() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["config", "set", "cache.ttl_secs", "60"])
            .assert()
            .success();
        docstash(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ttl_secs = 60"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["config", "set", "cache.nope", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn json_set_then_get() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.json");
        std::fs::write(&file, r#"{"list": [1, 2, 3]}"#).unwrap();

        docstash(&temp)
            .args(["get", file.to_str().unwrap(), "list[-1]"])
            .assert()
            .success()
            .stdout("3\n");

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "list[-1]", "9"])
            .assert()
            .success();

        let saved: serde_json::Value = serde_json::from_str(&read(&file)).unwrap();
        assert_eq!(saved, serde_json::json!({"list": [1, 2, 9]}));
    }

    #[test]
    fn properties_keep_comments() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.properties");
        std::fs::write(&file, "#hello\na=1\n").unwrap();

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "a", "2"])
            .assert()
            .success();

        assert_eq!(read(&file), "#hello\na=2\n");
    }

    #[test]
    fn yaml_set_creates_missing_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("nested").join("app.yaml");

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "server.hosts[0]", "alpha"])
            .assert()
            .success();

        docstash(&temp)
            .args(["get", file.to_str().unwrap(), "server.hosts[0]"])
            .assert()
            .success()
            .stdout("alpha\n");
    }

    #[test]
    fn set_remove_drops_node() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.json");
        std::fs::write(&file, r#"{"a": 1, "b": 2}"#).unwrap();

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "a", "--remove"])
            .assert()
            .success();

        docstash(&temp)
            .args(["show", file.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"b\": 2").and(predicate::str::contains("\"a\"").not()));
    }

    #[test]
    fn get_missing_node_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.json");
        std::fs::write(&file, "{}").unwrap();

        docstash(&temp)
            .args(["get", file.to_str().unwrap(), "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No value at nope"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.json");

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "a[x]", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
        assert!(!file.exists());
    }

    #[test]
    fn descriptor_defaults_fill_on_save() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.json");
        let descriptor = temp.path().join("descriptor.json");
        std::fs::write(
            &descriptor,
            r#"{"nodes": [{"path": "server.port", "default": 8080}]}"#,
        )
        .unwrap();

        docstash(&temp)
            .args(["set", file.to_str().unwrap(), "name", "demo", "--descriptor"])
            .arg(&descriptor)
            .assert()
            .success();

        let saved: serde_json::Value = serde_json::from_str(&read(&file)).unwrap();
        assert_eq!(saved["server"]["port"], 8080);
        assert_eq!(saved["name"], "demo");
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached entries"));
    }

    #[test]
    fn cache_purge_and_clear_on_empty() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["cache", "purge"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Purged 0"));
        docstash(&temp)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared 0"));
    }

    #[test]
    fn fetch_unreachable_without_cache_fails() {
        let temp = TempDir::new().unwrap();
        docstash(&temp)
            .args(["fetch", "http://127.0.0.1:9/nothing", "--timeout", "2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No cached content"));
    }

    #[test]
    fn fetch_serves_stale_cache_when_offline() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let url = "http://127.0.0.1:9/doc";
        let escaped = "http%3A%2F%2F127.0.0.1%3A9%2Fdoc";

        std::fs::create_dir_all(cache.join("blobs")).unwrap();
        std::fs::write(cache.join("blobs").join("b1"), "cached body").unwrap();
        std::fs::write(
            cache.join("manifest.json"),
            format!(r#"{{"{}": {{"expiredTime": 0, "value": "b1"}}}}"#, escaped),
        )
        .unwrap();

        docstash(&temp)
            .args(["fetch", url, "--timeout", "2"])
            .assert()
            .success()
            .stdout("cached body")
            .stderr(predicate::str::contains("stale"));
    }
}
