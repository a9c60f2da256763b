use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a config file plus an asset tree under a fresh temp dir and
/// returns (dir, config_path).
fn write_tree_config(
    assets: &[(&str, &str, &[u8])],
) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let assets_dir = dir.path().join("assets");
    for (folder, file, bytes) in assets {
        let folder_path = assets_dir.join(folder);
        fs::create_dir_all(&folder_path).expect("Creating asset folder failed");
        fs::write(folder_path.join(file), bytes).expect("Writing asset failed");
    }
    let config_path = dir.path().join("imgsync.yaml");
    fs::write(
        &config_path,
        format!("bucket: app-assets\nassets_dir: {}\n", assets_dir.display()),
    )
    .expect("Writing temp config failed");
    (dir, config_path)
}

/// Mock for one media upload of `key`, expected to be hit exactly once.
fn upload_mock(key: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/app-assets/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", key))
        .and(query_param("predefinedAcl", "publicRead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": key })))
        .expect(1)
}

#[test]
fn sync_cli_fails_clearly_without_a_readable_config() {
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");

    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg("definitely-missing.yaml")
        .env("STORAGE_TOKEN", "test-token");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn sync_cli_requires_storage_credentials() {
    let (dir, config_path) = write_tree_config(&[("backgrounds", "login_bg.png", b"bg")]);
    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");

    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg(&config_path)
        .env_remove("STORAGE_TOKEN");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("STORAGE_TOKEN"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_cli_uploads_a_tree_and_writes_the_manifest() {
    let server = MockServer::start().await;
    let (dir, config_path) = write_tree_config(&[
        ("backgrounds", "login_bg.png", b"bg-bytes"),
        ("icons", "profile.png", b"icon-bytes"),
    ]);

    // login_bg is already stored, so the run counts it as an update.
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/app-assets/o"))
        .and(query_param("prefix", "images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "images/backgrounds/login_bg.png"}]
        })))
        .mount(&server)
        .await;
    upload_mock("images/backgrounds/login_bg.png")
        .mount(&server)
        .await;
    upload_mock("images/icons/profile.png")
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg(&config_path)
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "static const Map<String, String> _imageUrls = {",
        ))
        .stdout(predicate::str::contains("  // backgrounds"))
        .stdout(predicate::str::contains("getBackgroundsImageUrl"))
        .stdout(predicate::str::contains("getIconsImageUrl"))
        .stdout(predicate::str::contains("2 (1 new, 1 updated)"));

    let manifest_raw = fs::read_to_string(dir.path().join("structured_image_urls.json"))
        .expect("manifest written next to the working dir");
    let manifest: serde_json::Value = serde_json::from_str(&manifest_raw).expect("valid json");
    assert_eq!(
        manifest["backgrounds"]["login_bg"],
        json!(format!(
            "{}/app-assets/images/backgrounds/login_bg.png",
            server.uri()
        ))
    );
    assert_eq!(
        manifest["icons"]["profile"],
        json!(format!(
            "{}/app-assets/images/icons/profile.png",
            server.uri()
        ))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_cli_exits_nonzero_when_an_upload_fails() {
    let server = MockServer::start().await;
    let (dir, config_path) = write_tree_config(&[
        ("backgrounds", "login_bg.png", b"bg-bytes"),
        ("icons", "broken.png", b"icon-bytes"),
    ]);

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/app-assets/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    upload_mock("images/backgrounds/login_bg.png")
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/app-assets/o"))
        .and(query_param("name", "images/icons/broken.png"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg(&config_path)
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Failed uploads:"))
        .stderr(predicate::str::contains("1 uploads failed"));

    // The manifest still carries the successful upload.
    let manifest_raw = fs::read_to_string(dir.path().join("structured_image_urls.json"))
        .expect("manifest written despite the failure");
    let manifest: serde_json::Value = serde_json::from_str(&manifest_raw).expect("valid json");
    assert!(manifest["backgrounds"]["login_bg"].is_string());
    assert!(manifest.get("icons").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_cli_prints_the_summary_even_when_the_manifest_write_fails() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let assets_dir = dir.path().join("assets");
    fs::create_dir_all(assets_dir.join("icons")).expect("Creating assets dir failed");
    fs::write(assets_dir.join("icons/star.png"), b"star-bytes").expect("Writing asset failed");
    let config_path = dir.path().join("imgsync.yaml");
    // The manifest path points into a directory that does not exist.
    fs::write(
        &config_path,
        format!(
            "bucket: app-assets\nassets_dir: {}\nmanifest_path: {}\n",
            assets_dir.display(),
            dir.path().join("no-such-dir/manifest.json").display()
        ),
    )
    .expect("Writing temp config failed");

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/app-assets/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    upload_mock("images/icons/star.png").mount(&server).await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg(&config_path)
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    // The upload went through (the mock insists on it), so the fragment and
    // summary must reach stdout even though persisting the manifest fails.
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("_imageUrls"))
        .stdout(predicate::str::contains("'star':"))
        .stdout(predicate::str::contains("SYNC SUMMARY"))
        .stderr(predicate::str::contains("failed to write manifest"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_cli_flat_mode_uses_single_level_keys() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let assets_dir = dir.path().join("assets");
    fs::create_dir_all(&assets_dir).expect("Creating assets dir failed");
    fs::write(assets_dir.join("logo.png"), b"logo-bytes").expect("Writing asset failed");
    let config_path = dir.path().join("imgsync.yaml");
    fs::write(
        &config_path,
        format!("bucket: app-assets\nassets_dir: {}\n", assets_dir.display()),
    )
    .expect("Writing temp config failed");

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/app-assets/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    upload_mock("images/logo.png")
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("sync")
        .arg("--config")
        .arg(&config_path)
        .arg("--flat")
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("'logo':"))
        .stdout(predicate::str::contains("  // ").not())
        .stdout(predicate::str::contains("static Future<String>").not());

    let manifest_raw = fs::read_to_string(dir.path().join("image_urls.json"))
        .expect("flat manifest written next to the working dir");
    let manifest: serde_json::Value = serde_json::from_str(&manifest_raw).expect("valid json");
    assert_eq!(
        manifest["logo"],
        json!(format!("{}/app-assets/images/logo.png", server.uri()))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn check_cli_lists_bucket_contents_with_urls() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/app-assets/o"))
        .and(query_param("prefix", "images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"name": "images/backgrounds/login_bg.png"},
                {"name": "images/icons/profile.png"}
            ]
        })))
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.arg("check")
        .arg("--urls")
        .env("STORAGE_BUCKET", "app-assets")
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "images/backgrounds/login_bg.png  {}/app-assets/images/backgrounds/login_bg.png",
            server.uri()
        )))
        .stdout(predicate::str::contains("2 objects under \"images\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_cli_prints_the_public_url() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let file = dir.path().join("logo.png");
    fs::write(&file, b"logo-bytes").expect("Writing asset failed");

    // Without --dest a single upload lands under images/backgrounds/.
    upload_mock("images/backgrounds/logo.png")
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("upload")
        .arg(&file)
        .env("STORAGE_BUCKET", "app-assets")
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert().success().stdout(predicate::str::contains(
        format!(
            "Public URL: {}/app-assets/images/backgrounds/logo.png",
            server.uri()
        ),
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_cli_honours_an_explicit_destination() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Creating temp dir failed");
    let file = dir.path().join("logo.png");
    fs::write(&file, b"logo-bytes").expect("Writing asset failed");

    upload_mock("images/custom/logo_v2.png")
        .mount(&server)
        .await;

    let mut cmd = Command::cargo_bin("imgsync").expect("Binary exists");
    cmd.current_dir(dir.path())
        .arg("upload")
        .arg(&file)
        .arg("--dest")
        .arg("images/custom/logo_v2.png")
        .env("STORAGE_BUCKET", "app-assets")
        .env("STORAGE_TOKEN", "test-token")
        .env("STORAGE_API_BASE", server.uri());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("images/custom/logo_v2.png"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use imgsync::cli::{run, Cli, Commands};

    // A dummy config path is enough: the event fires before loading.
    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
            flat: false,
            concurrency: 1,
        },
    };

    let _ = run(cli, CancellationToken::new()).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs
            .iter()
            .any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
