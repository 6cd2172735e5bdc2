//! Classpath construction from a resolved descriptor.

use crate::game::rules::{classpath_separator, evaluate_rules, RuleAction, RuleContext};
use crate::game::versions::VersionDescriptor;
use crate::store::LocalStore;

/// Validation errors that occur during launch preparation.
#[derive(Debug, thiserror::Error)]
pub enum ClasspathError {
    #[error("Required library not found: {library_path}")]
    LibraryNotFound { library_path: String },

    #[error("Client archive not found: {jar_path}")]
    ClientNotFound { jar_path: String },
}

/// Join every rule-allowed library artifact plus the client archive into
/// a classpath string, using the platform separator. Every entry must be
/// present on disk; the caller is expected to have completed the download
/// first.
pub fn build_classpath(
    descriptor: &VersionDescriptor,
    version_id: &str,
    store: &LocalStore,
    ctx: &RuleContext,
) -> Result<String, ClasspathError> {
    let mut entries = Vec::new();

    for library in &descriptor.libraries {
        if let Some(rules) = &library.rules {
            if evaluate_rules(rules, ctx) == RuleAction::Disallow {
                continue;
            }
        }

        let Some(artifact) = library.downloads.as_ref().and_then(|d| d.artifact.as_ref()) else {
            continue;
        };

        let full_path = store.library_path(&artifact.path);
        if !full_path.exists() {
            return Err(ClasspathError::LibraryNotFound {
                library_path: full_path.to_string_lossy().to_string(),
            });
        }
        entries.push(full_path.to_string_lossy().to_string());
    }

    let jar_path = store.version_jar_path(version_id);
    if !jar_path.exists() {
        return Err(ClasspathError::ClientNotFound {
            jar_path: jar_path.to_string_lossy().to_string(),
        });
    }
    entries.push(jar_path.to_string_lossy().to_string());

    Ok(entries.join(classpath_separator(&ctx.os_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::{OsRule, Rule};
    use crate::game::versions::{
        ArtifactRef, LibraryDownloads, LibraryEntry, VersionDescriptor,
    };
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn descriptor_with_libraries(libraries: Vec<LibraryEntry>) -> VersionDescriptor {
        VersionDescriptor {
            id: "1.20".to_string(),
            inherits_from: None,
            release_type: None,
            main_class: None,
            java_version: None,
            downloads: None,
            asset_index: None,
            assets: None,
            libraries,
            arguments: None,
        }
    }

    fn library(name: &str, path: &str, rules: Option<Vec<Rule>>) -> LibraryEntry {
        LibraryEntry {
            name: name.to_string(),
            downloads: Some(LibraryDownloads {
                artifact: Some(ArtifactRef {
                    path: path.to_string(),
                    url: format!("https://libs.example/{}", path),
                    sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".to_string(),
                    size: 0,
                }),
                classifiers: None,
            }),
            natives: None,
            rules,
            extract: None,
        }
    }

    fn ctx(os: &str) -> RuleContext {
        RuleContext {
            os_name: os.to_string(),
            arch: "x64".to_string(),
            os_version: String::new(),
            features: HashMap::new(),
        }
    }

    #[test]
    fn joins_allowed_libraries_and_client_jar() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());

        std::fs::create_dir_all(store.library_path("a/a/1.0/a-1.0.jar").parent().unwrap()).unwrap();
        std::fs::write(store.library_path("a/a/1.0/a-1.0.jar"), b"a").unwrap();
        let jar = store.version_jar_path("1.20");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"client").unwrap();

        let windows_only = vec![Rule {
            action: crate::game::rules::RuleAction::Allow,
            os: Some(OsRule {
                name: Some("windows".to_string()),
                version: None,
                arch: None,
            }),
            features: None,
        }];

        let descriptor = descriptor_with_libraries(vec![
            library("a:a:1.0", "a/a/1.0/a-1.0.jar", None),
            // Filtered out on linux; its artifact is never checked on disk.
            library("w:w:1.0", "w/w/1.0/w-1.0.jar", Some(windows_only)),
        ]);

        let classpath = build_classpath(&descriptor, "1.20", &store, &ctx("linux")).unwrap();
        let parts: Vec<&str> = classpath.split(':').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("a-1.0.jar"));
        assert!(parts[1].ends_with("1.20.jar"));
    }

    #[test]
    fn missing_library_fails() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());

        let descriptor =
            descriptor_with_libraries(vec![library("a:a:1.0", "a/a/1.0/a-1.0.jar", None)]);

        let result = build_classpath(&descriptor, "1.20", &store, &ctx("linux"));
        assert!(matches!(
            result,
            Err(ClasspathError::LibraryNotFound { .. })
        ));
    }
}
