use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn mrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mrag");
    path
}

fn run_mrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(mrag_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("PINECONE_API_KEY")
        .env_remove("GROQ_API_KEY")
        .env("MRAG_LOG", "warn")
        .output()
        .expect("failed to run mrag binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_models_for_dimension() {
    let (stdout, _, ok) = run_mrag(Path::new("./config/absent.toml"), &["models", "--dimension", "768"]);
    assert!(ok);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("MODEL"));
    assert!(lines[1].starts_with("bge-base-en-v1.5"));
    assert!(lines[1].trim_end().ends_with("yes"));
    assert!(stdout.contains("ollama/nomic-embed-text"));
    assert!(!stdout.contains("bge-small-en-v1.5"));
}

#[test]
fn test_models_unknown_dimension() {
    let (stdout, _, ok) = run_mrag(Path::new("./config/absent.toml"), &["models", "--dimension", "512"]);
    assert!(ok);
    assert!(stdout.contains("No known models"));
    assert!(stdout.contains("Default fallback: bge-base-en-v1.5"));
}

#[test]
fn test_models_does_not_read_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("broken.toml");
    fs::write(&config, "this is not toml [").unwrap();
    let (stdout, _, ok) = run_mrag(&config, &["models"]);
    assert!(ok);
    assert!(stdout.contains("text-embedding-3-large"));
}

#[test]
fn test_missing_api_key_reported() {
    let (_, stderr, ok) = run_mrag(Path::new("./config/absent.toml"), &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("PINECONE_API_KEY environment variable not set"));
}

#[test]
fn test_forced_mode_requires_model() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("mrag.toml");
    fs::write(&config, "[embedding]\nmode = \"forced\"\n").unwrap();
    let (_, stderr, ok) = run_mrag(&config, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("embedding.model must be specified"));
}

#[test]
fn test_unknown_forced_model_rejected() {
    let (_, stderr, ok) = run_mrag(
        Path::new("./config/absent.toml"),
        &["--model", "not-a-model", "ask", "What is SDLC?"],
    );
    assert!(!ok);
    assert!(stderr.contains("Unknown embedding model: 'not-a-model'"));
}
