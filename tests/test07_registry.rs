#![cfg(feature = "sqlite")]

use std::collections::HashMap;

use sql_handle::prelude::*;
use tempfile::TempDir;

fn registry_for(dir: &TempDir) -> Result<SourceRegistry, Box<dyn std::error::Error>> {
    let path = dir.path().join("reg.db");
    let raw = format!(
        r#"{{
            "direct": {{ "type": "sqlite", "db_path": {path:?} }},
            "pooled": {{ "type": "sqlite_pool", "db_path": {path:?}, "pool_max_size": 2 }}
        }}"#,
        path = path.to_string_lossy()
    );
    let configs: HashMap<String, SourceConfig> = serde_json::from_str(&raw)?;
    Ok(SourceRegistry::from_configs(configs)?)
}

#[test]
fn named_sources_reach_the_same_database() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let registry = registry_for(&dir)?;
    let mut names: Vec<_> = registry.names().collect();
    names.sort_unstable();
    assert_eq!(names, ["direct", "pooled"]);

    let mut direct = registry.handle("direct")?;
    direct.open()?;
    direct.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)")?;
    direct.execute("INSERT INTO kv VALUES (?, ?)", &[RowValues::from("color"), RowValues::from("teal")])?;

    let mut pooled = registry.handle("pooled")?;
    pooled.open()?;
    let rows = pooled.query("SELECT v FROM kv WHERE k = ?", &[RowValues::from("color")])?;
    assert_eq!(convert::to_string(rows.first().and_then(|r| r.get("v"))), Some("teal".into()));
    assert_eq!(pooled.columns("KV")?.into_iter().collect::<Vec<_>>(), ["k", "v"]);
    Ok(())
}

#[test]
fn unknown_source_name_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let registry = registry_for(&dir)?;
    match registry.handle("reporting") {
        Err(SqlHandleError::ConfigError(msg)) => assert!(msg.contains("reporting")),
        other => panic!("unexpected: {other:?}"),
    }
    Ok(())
}

#[test]
fn providers_report_their_backend() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let registry = registry_for(&dir)?;
    assert_eq!(registry.provider("pooled")?.database_type(), DatabaseType::Sqlite);
    Ok(())
}

#[cfg(feature = "postgres")]
#[test]
fn incomplete_postgres_source_is_rejected_up_front() {
    let configs: HashMap<String, SourceConfig> =
        serde_json::from_str(r#"{ "pg": { "type": "postgres", "host": "localhost" } }"#)
            .expect("valid json");
    let err = SourceRegistry::from_configs(configs).unwrap_err();
    assert!(matches!(err, SqlHandleError::ConfigError(_)), "{err:?}");
}
