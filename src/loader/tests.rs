use super::*;
use serde_json::json;
use std::fs;

fn write_file(dir: &tempfile::TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn config(name: &str) -> Value {
    json!({"name": name, "type": "Generic", "description": "", "parameter": {}})
}

#[test]
fn reads_array_shaped_category_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "a.json", &json!([config("A"), config("B")]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (configs, auto_loaders, report) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs.len(), 2);
    assert!(auto_loaders.is_empty());
    assert_eq!(report.excluded_count, 0);
}

#[test]
fn reads_object_shaped_category_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "a.json",
        &json!({"first": config("A"), "second": config("B")}),
    );
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (configs, _, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs.len(), 2);
}

#[test]
fn scenario_6_loader_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let path_x = write_file(&dir, "x.json", &json!([config("A"), config("B")]));
    let path_y = write_file(&dir, "y.json", &json!([config("C")]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path_x);
    categories.insert("y".to_string(), path_y);

    let filters = LoadFilters {
        exclude_categories: vec!["y".to_string()],
        exclude_tools: vec!["B".to_string()],
        ..Default::default()
    };

    let (configs, _, _) = Loader::load(&categories, &filters).unwrap();
    let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A"]);
}

#[test]
fn required_api_key_gates_tool_and_is_reported_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("Z");
    cfg["required_api_keys"] = json!(["NONEXISTENT_TEST_KEY_XYZ"]);
    let path = write_file(&dir, "x.json", &json!([cfg]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (configs, _, report) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert!(configs.is_empty());
    assert!(report.missing_api_keys.contains_key("Z"));
}

#[test]
fn duplicate_names_keep_first_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "x.json", &json!([config("A"), config("A")]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (configs, _, report) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(report.duplicates_dropped, 1);
}

#[test]
fn include_tools_is_most_specific_and_reports_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "x.json", &json!([config("A"), config("B")]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let filters = LoadFilters {
        include_tools: vec!["A".to_string(), "Ghost".to_string()],
        ..Default::default()
    };
    let (configs, _, report) = Loader::load(&categories, &filters).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].name, "A");
    assert_eq!(report.requested_but_missing, vec!["Ghost".to_string()]);
}

#[test]
fn auto_loader_entries_are_routed_separately() {
    let dir = tempfile::tempdir().unwrap();
    let mut auto = config("Loader1");
    auto["type"] = json!(AUTO_LOADER_TYPE_TAG);
    let path = write_file(&dir, "x.json", &json!([config("A"), auto]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (configs, auto_loaders, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(auto_loaders.len(), 1);
}

struct StubDiscovery;

#[async_trait::async_trait]
impl AutoLoaderDiscovery for StubDiscovery {
    async fn discover(&self, _entry: &ToolConfig) -> anyhow::Result<Vec<ToolConfig>> {
        Ok(vec![serde_json::from_value(config("Discovered")).unwrap()])
    }
}

#[tokio::test]
async fn merge_auto_loaded_appends_discovered_tools_deduplicated() {
    let mut existing: Vec<ToolConfig> = vec![serde_json::from_value(config("A")).unwrap()];
    let auto_loaders: Vec<ToolConfig> = vec![serde_json::from_value(config("Loader1")).unwrap()];
    Loader::merge_auto_loaded(&mut existing, &auto_loaders, &StubDiscovery).await;
    let names: Vec<&str> = existing.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A", "Discovered"]);
}

#[test]
fn configs_are_tagged_with_their_loader_category() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "w.json", &json!([config("A")]));
    let mut categories = HashMap::new();
    categories.insert("weather".to_string(), path);

    let (configs, _, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs[0].category, "weather");
}

#[test]
fn an_explicit_category_in_the_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("A");
    cfg["category"] = json!("custom");
    let path = write_file(&dir, "w.json", &json!([cfg]));
    let mut categories = HashMap::new();
    categories.insert("weather".to_string(), path);

    let (configs, _, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(configs[0].category, "custom");
}

#[test]
fn missing_keys_template_is_written_with_every_distinct_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut report = LoadReport::default();
    report.missing_api_keys.insert("A".to_string(), vec!["KEY_ONE".to_string()]);
    report.missing_api_keys.insert("B".to_string(), vec!["KEY_ONE".to_string(), "KEY_TWO".to_string()]);

    let path = dir.path().join(".env.template");
    write_missing_keys_template(&report, &path).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(written.matches("KEY_ONE=").count(), 1);
    assert!(written.contains("KEY_TWO=your_api_key_here"));
}

#[test]
fn missing_keys_template_is_not_written_when_nothing_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env.template");
    write_missing_keys_template(&LoadReport::default(), &path).unwrap();
    assert!(!path.exists());
}

#[test]
fn loading_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "x.json", &json!([config("A"), config("B")]));
    let mut categories = HashMap::new();
    categories.insert("x".to_string(), path);

    let (first, _, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    let (second, _, _) = Loader::load(&categories, &LoadFilters::default()).unwrap();
    assert_eq!(first.len(), second.len());
}
