use clap::Parser;
use ironform::cli::Cli;
use ironform::config::{Config, DEFAULT_MAX_BODY_SIZE, ENV_TEMP_PREFIX, ini_parser::IniConfig};
use ironform::form::{FormParser, NulPolicy};
use ironform::upload::DEFAULT_TEMP_PREFIX;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_ini_parser_sections() {
    let ini_content = r#"
# This is a comment
[upload]
directory = /srv/uploads
prefix = post_

[parser]
nul_policy = preserve
max_body_size = 512KB

[logging]
verbose = off
detailed = on
"#;

    let ini = IniConfig::parse(ini_content).expect("Failed to parse INI");

    assert_eq!(
        ini.get_string("upload", "directory"),
        Some("/srv/uploads".to_string())
    );
    assert_eq!(ini.get_string("upload", "prefix"), Some("post_".to_string()));
    assert_eq!(ini.get_file_size("parser", "max_body_size"), Some(512 * 1024));
    assert_eq!(ini.get_bool("logging", "verbose"), Some(false));
    assert_eq!(ini.get_bool("logging", "detailed"), Some(true));
}

#[test]
fn test_ini_parser_file_sizes() {
    let ini_content = r#"
[parser]
size_bytes = 1024
size_kb = 500KB
size_mb = 100MB
size_gb = 5GB
size_tb = 2TB
bogus = 12XB
"#;

    let ini = IniConfig::parse(ini_content).expect("Failed to parse INI");

    assert_eq!(ini.get_file_size("parser", "size_bytes"), Some(1024));
    assert_eq!(ini.get_file_size("parser", "size_kb"), Some(500 * 1024));
    assert_eq!(
        ini.get_file_size("parser", "size_mb"),
        Some(100 * 1024 * 1024)
    );
    assert_eq!(
        ini.get_file_size("parser", "size_gb"),
        Some(5 * 1024 * 1024 * 1024)
    );
    assert_eq!(
        ini.get_file_size("parser", "size_tb"),
        Some(2 * 1024 * 1024 * 1024 * 1024)
    );
    assert_eq!(ini.get_file_size("parser", "bogus"), None);
}

#[test]
fn test_ini_load_file_errors() {
    assert!(IniConfig::load_file("/nonexistent/ironform.ini").is_err());

    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("broken.ini");
    fs::write(&config_file, "[upload\ndirectory = /tmp\n").unwrap();
    assert!(IniConfig::load_file(&config_file).is_err());
}

#[test]
fn test_config_from_cli_arguments() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("ironform.ini");
    fs::write(&config_file, "[upload]\nprefix = from_ini_\n").unwrap();

    let cli = Cli::try_parse_from([
        "ironform".to_string(),
        "--upload-dir".to_string(),
        temp_dir.path().to_string_lossy().to_string(),
        "--nul-policy".to_string(),
        "preserve".to_string(),
        "--config-file".to_string(),
        config_file.to_string_lossy().to_string(),
    ])
    .unwrap();
    cli.validate().unwrap();

    let config = Config::load_with_env(&cli, no_env).unwrap();

    assert_eq!(config.upload_dir, temp_dir.path());
    assert_eq!(config.temp_prefix, "from_ini_");
    assert_eq!(config.nul_policy, NulPolicy::Preserve);
    assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
}

#[test]
fn test_env_prefix_between_cli_and_ini() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("ironform.ini");
    fs::write(&config_file, "[upload]\nprefix = from_ini_\n").unwrap();

    let cli = Cli {
        config_file: Some(config_file.to_string_lossy().to_string()),
        ..Default::default()
    };
    let env = |key: &str| (key == ENV_TEMP_PREFIX).then(|| "from_env_".to_string());

    let config = Config::load_with_env(&cli, env).unwrap();
    assert_eq!(config.temp_prefix, "from_env_");

    let cli = Cli {
        temp_prefix: Some("from_cli_".to_string()),
        ..cli
    };
    let config = Config::load_with_env(&cli, env).unwrap();
    assert_eq!(config.temp_prefix, "from_cli_");
}

#[test]
fn test_config_drives_uploads() {
    let temp_dir = TempDir::new().unwrap();
    let upload_dir = temp_dir.path().join("spool");
    fs::create_dir_all(&upload_dir).unwrap();

    let config_file = temp_dir.path().join("ironform.ini");
    fs::write(
        &config_file,
        format!(
            "[upload]\ndirectory = {}\nprefix = cfg_\n[parser]\nmax_body_size = 1KB\n",
            upload_dir.display()
        ),
    )
    .unwrap();

    let cli = Cli {
        config_file: Some(config_file.to_string_lossy().to_string()),
        ..Default::default()
    };
    let config = Config::load_with_env(&cli, no_env).unwrap();
    assert_eq!(config.max_body_size, 1024);

    let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\nabc\r\n--B--\r\n";
    let result = FormParser::new(&config)
        .parse(Some("multipart/form-data; boundary=B"), body.to_vec());

    let files = result.files().unwrap();
    let tmp_name = files
        .split('&')
        .find_map(|pair| pair.strip_prefix("tmp_name="))
        .unwrap();
    let tmp_path = PathBuf::from(tmp_name);
    assert!(tmp_path.starts_with(&upload_dir));
    assert!(
        tmp_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("cfg_")
    );
}

#[test]
fn test_default_prefix_and_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("empty.ini");
    fs::write(&config_file, "").unwrap();

    let cli = Cli {
        config_file: Some(config_file.to_string_lossy().to_string()),
        ..Default::default()
    };
    let config = Config::load_with_env(&cli, no_env).unwrap();
    assert_eq!(config.temp_prefix, DEFAULT_TEMP_PREFIX);

    let cli = Cli {
        config_file: Some(temp_dir.path().join("nope.ini").to_string_lossy().to_string()),
        ..Default::default()
    };
    assert!(Config::load_with_env(&cli, no_env).is_err());
}

#[test]
fn test_cli_rejects_invalid_arguments() {
    assert!(Cli::try_parse_from(["ironform", "--max-body-size", "0"]).is_err());
    assert!(Cli::try_parse_from(["ironform", "--temp-prefix", "a/b"]).is_err());
    assert!(Cli::try_parse_from(["ironform", "--config-file", "/nonexistent.ini"]).is_err());
    assert!(Cli::try_parse_from(["ironform", "--nul-policy", "keep"]).is_err());
}
