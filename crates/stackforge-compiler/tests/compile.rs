//! End-to-end compilation over on-disk fixtures

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_yaml::Value;
use stackforge_compiler::{CompileError, CompileOptions, Compiler, FetchError, Fetched, Fetcher};
use stackforge_store::{content_digest, ArtifactStore, MemoryBackend, StoreConfig};
use stackforge_types::ParameterBindings;
use tempfile::TempDir;

/// Serves one fixed payload for every URL.
struct StaticFetcher {
    etag: Option<String>,
    fetches: AtomicUsize,
}

impl StaticFetcher {
    fn new(etag: Option<&str>) -> Self {
        Self {
            etag: etag.map(str::to_string),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn validator(&self, _url: &str) -> Result<Option<String>, FetchError> {
        Ok(self.etag.clone())
    }

    async fn fetch(&self, _url: &str) -> Result<Fetched, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Fetched {
            body: Bytes::from_static(b"PK\x03\x04code"),
            content_type: Some("application/zip".to_string()),
            etag: self.etag.clone(),
        })
    }
}

struct Fixture {
    dir: TempDir,
    backend: Arc<MemoryBackend>,
    fetcher: Arc<StaticFetcher>,
    compiler: Compiler,
}

impl Fixture {
    fn new() -> Self {
        Self::with_fetcher(StaticFetcher::new(None))
    }

    fn with_fetcher(fetcher: StaticFetcher) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let fetcher = Arc::new(fetcher);
        let store = ArtifactStore::new(backend.clone(), StoreConfig::default());
        let compiler = Compiler::new(store, fetcher.clone(), CompileOptions::default());
        Self {
            dir: TempDir::new().unwrap(),
            backend,
            fetcher,
            compiler,
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }
}

fn empty() -> ParameterBindings {
    ParameterBindings::new()
}

#[tokio::test]
async fn test_conflicting_include_parameters_are_renamed_deterministically() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        "Includes:\n  - db/template.yaml\n  - web/template.yaml\nResources: {}\n",
    );
    fx.write(
        "db/template.yaml",
        "Parameters:\n  Size:\n    Type: String\n    Default: small\nResources:\n  Db:\n    Type: AWS::RDS::DBInstance\n    Properties:\n      Class: !Ref Size\n",
    );
    fx.write(
        "web/template.yaml",
        "Parameters:\n  Size:\n    Type: String\n    Default: large\nResources:\n  Web:\n    Type: AWS::EC2::Instance\n    Properties:\n      InstanceType: !Ref Size\n",
    );

    let first = fx
        .compiler
        .compile_to_yaml(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let second = fx
        .compiler
        .compile_to_yaml(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    assert_eq!(first, second);

    let doc: Value = serde_yaml::from_str(&first).unwrap();
    let key = stackforge_compiler::merge::include_key(fx.dir.path(), "web/template.yaml");
    let renamed = format!("{key}zSize");
    assert!(key.ends_with("Web"));
    assert_eq!(doc["Parameters"]["Size"]["Default"].as_str(), Some("small"));
    assert_eq!(doc["Parameters"][renamed.as_str()]["Default"].as_str(), Some("large"));
    assert_eq!(
        doc["Resources"]["Web"]["Properties"]["InstanceType"]["Ref"].as_str(),
        Some(renamed.as_str())
    );
    assert_eq!(
        doc["Resources"]["Db"]["Properties"]["Class"]["Ref"].as_str(),
        Some("Size")
    );
    assert!(doc.get("Includes").is_none());
}

#[tokio::test]
async fn test_duplicate_resources_fail_before_any_upload() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        r#"
Includes:
  - a/template.yaml
  - b/template.yaml
Resources:
  Handler:
    Type: AWS::Lambda::Function
    Properties:
      Runtime: nodejs20.x
      Code:
        Path: src
"#,
    );
    fx.write("src/index.js", "exports.handler = async () => 1;\n");
    fx.write("a/template.yaml", "Resources:\n  WebServer:\n    Type: AWS::EC2::Instance\n");
    fx.write("b/template.yaml", "Resources:\n  WebServer:\n    Type: AWS::EC2::Instance\n");

    let err = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CompileError::DuplicateItem { ref key, .. } if key == "WebServer"),
        "unexpected error: {err}"
    );
    assert_eq!(fx.backend.write_count(), 0);
}

#[tokio::test]
async fn test_unresolved_reference_is_deferred_without_bindings() {
    let fx = Fixture::new();
    fx.write(
        "fn.yaml",
        r#"
Parameters:
  CodeUrl:
    Type: String
Resources:
  Handler:
    Type: AWS::Lambda::Function
    Properties:
      Code:
        URL: !Ref CodeUrl
"#,
    );

    let deferred = fx.compiler.compile(&fx.path("fn"), None).await.unwrap();
    let code = &deferred.get("Resources").unwrap()["Handler"]["Properties"]["Code"];
    assert_eq!(code["URL"]["Ref"].as_str(), Some("CodeUrl"));
    assert_eq!(fx.fetcher.fetch_count(), 0);

    let bindings: ParameterBindings = [("CodeUrl", "https://example.com/code.zip")]
        .into_iter()
        .collect();
    let resolved = fx
        .compiler
        .compile(&fx.path("fn"), Some(&bindings))
        .await
        .unwrap();
    let code = &resolved.get("Resources").unwrap()["Handler"]["Properties"]["Code"];
    assert!(code.get("URL").is_none());
    assert!(code["S3Key"].as_str().unwrap().ends_with(".zip"));
    assert_eq!(fx.fetcher.fetch_count(), 1);

    let err = fx
        .compiler
        .compile(&fx.path("fn"), Some(&empty()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("CodeUrl"));
}

#[tokio::test]
async fn test_shorthand_and_canonical_compile_identically() {
    let fx = Fixture::new();
    fx.write(
        "short.yaml",
        "Outputs:\n  Name:\n    Value: !Sub \"foo-${Bar}\"\n",
    );
    fx.write(
        "long.yaml",
        "Outputs:\n  Name:\n    Value:\n      \"Fn::Sub\": \"foo-${Bar}\"\n",
    );

    let short = fx
        .compiler
        .compile_to_yaml(&fx.path("short.yaml"), Some(&empty()))
        .await
        .unwrap();
    let long = fx
        .compiler
        .compile_to_yaml(&fx.path("long.yaml"), Some(&empty()))
        .await
        .unwrap();
    assert_eq!(short, long);
}

#[tokio::test]
async fn test_include_cycle_is_detected() {
    let fx = Fixture::new();
    fx.write("a/template.yaml", "Includes:\n  - ../b/template.yaml\n");
    fx.write("b/template.yaml", "Includes:\n  - ../a/template.yaml\n");

    let err = fx
        .compiler
        .compile(&fx.path("a/template.yaml"), Some(&empty()))
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::IncludeCycle { .. }), "{err}");
}

#[tokio::test]
async fn test_nested_template_is_uploaded() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        r#"
Resources:
  Network:
    Type: AWS::CloudFormation::Stack
    Properties:
      Template: network/template.yaml
      Parameters:
        Cidr: 10.0.0.0/16
"#,
    );
    fx.write(
        "network/template.yaml",
        "Parameters:\n  Cidr:\n    Type: String\nResources:\n  Vpc:\n    Type: AWS::EC2::VPC\n",
    );

    let doc = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let props = &doc.get("Resources").unwrap()["Network"]["Properties"];
    assert!(props.get("Template").is_none());
    assert_eq!(props["Parameters"]["Cidr"].as_str(), Some("10.0.0.0/16"));

    let url = props["TemplateURL"].as_str().unwrap();
    let key = fx
        .backend
        .keys()
        .into_iter()
        .find(|k| url.ends_with(k.as_str()))
        .unwrap();
    let stored = fx.backend.object(&key).unwrap();
    assert_eq!(stored.content_type, "text/yaml");
    assert!(stored.content_encoding.is_none());
    assert!(String::from_utf8_lossy(&stored.body).contains("AWS::EC2::VPC"));
}

#[tokio::test]
async fn test_nested_template_cycle_is_detected() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        "Resources:\n  Self:\n    Type: AWS::CloudFormation::Stack\n    Properties:\n      Template: cloud-formation.yaml\n",
    );

    let err = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap_err();
    let CompileError::Payload { source, .. } = err else {
        panic!("unexpected error: {err}");
    };
    assert!(matches!(*source, CompileError::IncludeCycle { .. }));
}

#[tokio::test]
async fn test_user_data_file_is_base64_cloud_config() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        r#"
Resources:
  Launch:
    Type: AWS::EC2::LaunchTemplate
    Properties:
      LaunchTemplateData:
        UserData:
          File: boot.init
  Legacy:
    Type: AWS::AutoScaling::LaunchConfiguration
    Properties:
      UserData:
        FileTemplate: boot.init
"#,
    );
    fx.write("boot.init", "runcmd:\n  - echo ${AWS::Region}\n");

    let doc = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let resources = doc.get("Resources").unwrap();

    let encoded = resources["Launch"]["Properties"]["LaunchTemplateData"]["UserData"]
        .as_str()
        .unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert!(decoded.starts_with("#cloud-config\n"));
    assert!(decoded.contains("echo ${AWS::Region}"));

    let templated = &resources["Legacy"]["Properties"]["UserData"];
    let sub = templated["Fn::Base64"]["Fn::Sub"].as_str().unwrap();
    assert!(sub.starts_with("#cloud-config\n"));
    assert_eq!(fx.backend.write_count(), 0);
}

#[tokio::test]
async fn test_included_function_code_path_is_relative_to_include() {
    let fx = Fixture::new();
    fx.write("cloud-formation.yaml", "Includes:\n  - fn/template.yaml\n");
    fx.write(
        "fn/template.yaml",
        "Resources:\n  Handler:\n    Type: AWS::Lambda::Function\n    Properties:\n      Runtime: python3.12\n      Code:\n        Path: src\n",
    );
    fx.write("fn/src/main.py", "def handler(event, context):\n    return 1\n");

    let doc = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let code = &doc.get("Resources").unwrap()["Handler"]["Properties"]["Code"];
    assert_eq!(code["S3Bucket"].as_str(), Some("cf-templates-memory"));
    assert!(code["S3Key"].as_str().unwrap().ends_with(".zip"));
    assert_eq!(fx.backend.write_count(), 1);

    // Same sources, same artifact.
    fx.compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    assert_eq!(fx.backend.write_count(), 1);
}

#[tokio::test]
async fn test_inline_function_file_for_supported_runtime() {
    let backend = Arc::new(MemoryBackend::new());
    let store = ArtifactStore::new(backend.clone(), StoreConfig::default());
    let options = CompileOptions {
        inline_function_files: true,
        ..CompileOptions::default()
    };
    let compiler = Compiler::new(store, Arc::new(StaticFetcher::new(None)), options);

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.js"), "exports.handler = 1;\n").unwrap();
    fs::write(
        dir.path().join("cloud-formation.yaml"),
        "Resources:\n  Handler:\n    Type: AWS::Lambda::Function\n    Properties:\n      Runtime: nodejs20.x\n      Code:\n        Path: index.js\n",
    )
    .unwrap();

    let doc = compiler
        .compile(dir.path(), Some(&ParameterBindings::new()))
        .await
        .unwrap();
    let code = &doc.get("Resources").unwrap()["Handler"]["Properties"]["Code"];
    assert_eq!(code["ZipFile"].as_str(), Some("exports.handler = 1;\n"));
    assert_eq!(backend.write_count(), 0);
}

/// Keys of stored artifacts, leaving out validator markers.
fn content_keys(backend: &MemoryBackend) -> Vec<String> {
    backend
        .keys()
        .into_iter()
        .filter(|k| !k.contains("/validated/"))
        .collect()
}

#[tokio::test]
async fn test_downloaded_code_is_cached_by_etag() {
    let fx = Fixture::with_fetcher(StaticFetcher::new(Some("\"v1\"")));
    fx.write(
        "cloud-formation.yaml",
        "Resources:\n  Handler:\n    Type: AWS::Lambda::Function\n    Properties:\n      Code:\n        URL: https://example.com/releases/handler.zip\n",
    );

    fx.compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let writes = fx.backend.write_count();
    fx.compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();

    assert_eq!(fx.fetcher.fetch_count(), 1);
    assert_eq!(fx.backend.write_count(), writes);
    assert_eq!(content_keys(&fx.backend).len(), 1);
}

#[tokio::test]
async fn test_downloaded_code_is_addressed_by_content() {
    let fx = Fixture::with_fetcher(StaticFetcher::new(Some("\"v1\"")));
    fx.write(
        "cloud-formation.yaml",
        r#"
Resources:
  One:
    Type: AWS::Lambda::Function
    Properties:
      Code:
        URL: https://one.example/handler.zip
  Two:
    Type: AWS::Lambda::Function
    Properties:
      Code:
        URL: https://two.example/handler.zip
"#,
    );

    let doc = fx
        .compiler
        .compile(fx.dir.path(), Some(&empty()))
        .await
        .unwrap();
    let resources = doc.get("Resources").unwrap();
    let one = resources["One"]["Properties"]["Code"]["S3Key"].as_str().unwrap();
    let two = resources["Two"]["Properties"]["Code"]["S3Key"].as_str().unwrap();

    assert_eq!(one, two);
    assert!(one.contains(&content_digest(b"PK\x03\x04code")));
    assert_eq!(fx.fetcher.fetch_count(), 2);
    assert_eq!(content_keys(&fx.backend), vec![one.to_string()]);
}

#[tokio::test]
async fn test_empty_bindings_resolve_code_url_from_default() {
    let fx = Fixture::new();
    fx.write(
        "fn.yaml",
        r#"
Parameters:
  CodeUrl:
    Type: String
    Default: https://example.com/releases/handler.zip
Resources:
  Handler:
    Type: AWS::Lambda::Function
    Properties:
      Code:
        URL: !Ref CodeUrl
"#,
    );

    let text = fx
        .compiler
        .compile_to_yaml(&fx.path("fn.yaml"), Some(&empty()))
        .await
        .unwrap();
    let doc: Value = serde_yaml::from_str(&text).unwrap();
    let code = &doc["Resources"]["Handler"]["Properties"]["Code"];
    assert!(code.get("URL").is_none());
    assert!(code["S3Key"].as_str().unwrap().ends_with(".zip"));
    assert_eq!(fx.fetcher.fetch_count(), 1);
}

#[test]
fn test_parameters_lists_merged_defaults() {
    let fx = Fixture::new();
    fx.write(
        "cloud-formation.yaml",
        "Includes:\n  - net/template.yaml\nParameters:\n  Env:\n    Default: prod\n",
    );
    fx.write("net/template.yaml", "Parameters:\n  Cidr:\n    Type: String\n");

    let params = fx.compiler.parameters(Path::new(fx.dir.path())).unwrap();
    let names: Vec<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Env", "Cidr"]);
    assert_eq!(params[0].1.as_ref().and_then(Value::as_str), Some("prod"));
    assert!(params[1].1.is_none());
}
