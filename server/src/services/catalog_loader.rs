use std::path::Path;

use kartvisning_shared::{ProjectConfig, ProjectEntry};
use tracing::{debug, info, warn};

use crate::config::catalog_refresh_interval;
use crate::state::{AppState, ProjectCatalog};

/// Rescans the projects directory on a fixed interval so descriptors can be
/// added or edited without a restart.
pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(catalog_refresh_interval());
    // The startup scan already ran before the listener was bound.
    interval.tick().await;

    loop {
        interval.tick().await;
        refresh(&state).await;
    }
}

pub async fn refresh(state: &AppState) {
    match scan_projects(&state.projects_dir).await {
        Ok(catalog) => {
            let mut current = state.catalog.write().await;
            if *current != catalog {
                info!(
                    projects = catalog.entries.len(),
                    invalid = catalog.invalid,
                    "project catalog updated"
                );
            }
            *current = catalog;
        }
        Err(e) => {
            warn!(dir = %state.projects_dir.display(), "failed to scan projects directory: {e}");
        }
    }
}

/// Reads every `*.json` descriptor in `dir`. Files that do not parse as a
/// project are skipped and counted, never served in the catalog.
pub async fn scan_projects(dir: &Path) -> std::io::Result<ProjectCatalog> {
    let mut catalog = ProjectCatalog::default();
    let mut reader = tokio::fs::read_dir(dir).await?;

    while let Some(item) = reader.next_entry().await? {
        let path = item.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file = %path.display(), "failed to read project descriptor: {e}");
                catalog.invalid += 1;
                continue;
            }
        };
        match ProjectConfig::from_json(&raw) {
            Ok(project) => {
                catalog.entries.push(entry_for(stem, &project));
            }
            Err(e) => {
                warn!(file = %path.display(), "invalid project descriptor: {e}");
                catalog.invalid += 1;
            }
        }
    }

    catalog
        .entries
        .sort_by(|a, b| a.project_name.cmp(&b.project_name));
    debug!(
        projects = catalog.entries.len(),
        invalid = catalog.invalid,
        "scanned projects directory"
    );
    Ok(catalog)
}

fn entry_for(stem: &str, project: &ProjectConfig) -> ProjectEntry {
    let title = project
        .config
        .project
        .as_ref()
        .and_then(|meta| {
            meta.title
                .as_deref()
                .or(Some(meta.name.as_str()))
                .filter(|title| !title.trim().is_empty())
        })
        .unwrap_or(stem);
    ProjectEntry {
        site_title: title.to_string(),
        project_name: stem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const SAMPLE_PROJECT: &str = r#"{
        "config": {
            "project": { "name": "turkart", "title": "Turkart" },
            "mapepsg": "EPSG:25833",
            "mapbounds": { "mapbound": [
                { "epsg": "EPSG:25833", "extent": "-2500000,3500000,3045984,9045984" }
            ] },
            "maplayer": [],
            "layer": []
        }
    }"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kartvisning-catalog-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[tokio::test]
    async fn scan_lists_valid_descriptors_sorted_by_name() {
        let dir = scratch_dir("sorted");
        std::fs::write(dir.join("turkart.json"), SAMPLE_PROJECT).expect("write turkart");
        std::fs::write(
            dir.join("adresse.json"),
            r#"{"config":{"mapbounds":{"mapbound":[]},"maplayer":[],"layer":[]}}"#,
        )
        .expect("write adresse");
        std::fs::write(dir.join("notes.txt"), "ignored").expect("write notes");

        let catalog = scan_projects(&dir).await.expect("scan");

        assert_eq!(catalog.invalid, 0);
        assert_eq!(
            catalog.entries,
            vec![
                ProjectEntry {
                    site_title: "adresse".to_string(),
                    project_name: "adresse".to_string(),
                },
                ProjectEntry {
                    site_title: "Turkart".to_string(),
                    project_name: "turkart".to_string(),
                },
            ]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn scan_counts_invalid_descriptors_without_listing_them() {
        let dir = scratch_dir("invalid");
        std::fs::write(dir.join("turkart.json"), SAMPLE_PROJECT).expect("write turkart");
        std::fs::write(dir.join("broken.json"), "{ not json").expect("write broken");

        let catalog = scan_projects(&dir).await.expect("scan");

        assert_eq!(catalog.invalid, 1);
        assert_eq!(catalog.entries.len(), 1);
        assert_eq!(catalog.entries[0].project_name, "turkart");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn scan_of_missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join("kartvisning-catalog-does-not-exist");
        assert!(scan_projects(&dir).await.is_err());
    }

    #[tokio::test]
    async fn refresh_keeps_previous_catalog_when_directory_vanishes() {
        let dir = scratch_dir("refresh");
        std::fs::write(dir.join("turkart.json"), SAMPLE_PROJECT).expect("write turkart");
        let state = AppState::new(
            kartvisning_shared::BaseConfig::default(),
            dir.clone(),
            PathBuf::from("client/dist"),
            None,
        );

        refresh(&state).await;
        assert_eq!(state.catalog.read().await.entries.len(), 1);

        std::fs::remove_dir_all(&dir).expect("remove scratch dir");
        refresh(&state).await;
        assert_eq!(state.catalog.read().await.entries.len(), 1);
    }
}
