//! Argument template expansion for the launch boundary.
//!
//! Templates come from the resolved descriptor's `jvm` and `game` lists.
//! Literal tokens are substituted in place; conditional entries go
//! through the rule evaluator first. Tokens whose placeholders cannot be
//! resolved are dropped entirely so no orphan flags are passed on.

use crate::game::config::{LAUNCHER_NAME, LAUNCHER_VERSION};
use crate::game::launcher::types::LaunchOptions;
use crate::game::rules::{evaluate_rules, RuleAction, RuleContext};
use crate::game::versions::{Argument, ArgumentValue, VersionDescriptor};
use crate::store::LocalStore;
use dunce::canonicalize;
use std::collections::HashMap;
use std::path::Path;

/// Build the substitution table for a launch.
pub fn build_variables(
    descriptor: &VersionDescriptor,
    version_id: &str,
    store: &LocalStore,
    game_dir: &Path,
    classpath: &str,
    options: &LaunchOptions,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    vars.insert("auth_player_name".to_string(), options.player_name.clone());
    vars.insert("auth_uuid".to_string(), options.identity_token.clone());
    vars.insert(
        "auth_access_token".to_string(),
        options.session_token.clone(),
    );
    vars.insert("user_type".to_string(), "msa".to_string());

    vars.insert("version_name".to_string(), version_id.to_string());
    vars.insert(
        "version_type".to_string(),
        descriptor
            .release_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "release".to_string()),
    );

    vars.insert("game_directory".to_string(), canonical_string(game_dir));
    vars.insert(
        "natives_directory".to_string(),
        canonical_string(&store.natives_dir(version_id)),
    );
    vars.insert(
        "assets_root".to_string(),
        canonical_string(&store.assets_dir()),
    );
    if let Some(assets_id) = descriptor.assets_id() {
        vars.insert("assets_index_name".to_string(), assets_id.to_string());
    }

    vars.insert("launcher_name".to_string(), LAUNCHER_NAME.to_string());
    vars.insert("launcher_version".to_string(), LAUNCHER_VERSION.to_string());
    vars.insert("classpath".to_string(), classpath.to_string());

    if let Some((width, height)) = options.window_size {
        vars.insert("resolution_width".to_string(), width.to_string());
        vars.insert("resolution_height".to_string(), height.to_string());
    }

    vars
}

/// Expand one template list into concrete tokens.
pub fn expand_arguments(
    templates: &[Argument],
    variables: &HashMap<String, String>,
    ctx: &RuleContext,
) -> Vec<String> {
    let mut out = Vec::new();

    for template in templates {
        match template {
            Argument::Literal(text) => {
                if let Some(token) = expand_token(text, variables) {
                    out.push(token);
                }
            }
            Argument::Conditional { rules, value } => {
                if evaluate_rules(rules, ctx) != RuleAction::Allow {
                    continue;
                }
                match value {
                    ArgumentValue::Single(text) => {
                        if let Some(token) = expand_token(text, variables) {
                            out.push(token);
                        }
                    }
                    ArgumentValue::Many(texts) => {
                        // If any part of a multi-token group fails to
                        // resolve, drop the whole group so a flag never
                        // appears without its value.
                        let expanded: Option<Vec<String>> = texts
                            .iter()
                            .map(|text| expand_token(text, variables))
                            .collect();
                        if let Some(tokens) = expanded {
                            out.extend(tokens);
                        }
                    }
                }
            }
        }
    }

    out
}

fn expand_token(text: &str, variables: &HashMap<String, String>) -> Option<String> {
    if contains_unresolved_placeholder(text, variables) {
        return None;
    }
    Some(substitute_variables(text, variables))
}

/// Substitute `${key}` placeholders from the variable table.
pub fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    let mut result = text.to_string();

    for (key, value) in variables {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

/// True when `text` contains a placeholder that is missing from the table
/// or maps to an empty string.
fn contains_unresolved_placeholder(text: &str, variables: &HashMap<String, String>) -> bool {
    let mut idx = 0usize;
    while let Some(start) = text[idx..].find("${") {
        let abs = idx + start + 2;
        let Some(end_rel) = text[abs..].find('}') else {
            // No closing brace: treat as a bad placeholder.
            return true;
        };
        let end = abs + end_rel;
        let key = &text[abs..end];
        match variables.get(key) {
            Some(value) if !value.trim().is_empty() => {}
            _ => return true,
        }
        idx = end + 1;
    }

    false
}

fn canonical_string(path: &Path) -> String {
    canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::Rule;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn plain_ctx() -> RuleContext {
        RuleContext {
            os_name: "linux".to_string(),
            arch: "x64".to_string(),
            os_version: String::new(),
            features: HashMap::new(),
        }
    }

    #[test]
    fn substitutes_known_placeholders() {
        let table = vars(&[("auth_player_name", "Steve"), ("version_name", "1.20")]);
        let result =
            substitute_variables("--username ${auth_player_name} --version ${version_name}", &table);
        assert_eq!(result, "--username Steve --version 1.20");
    }

    #[test]
    fn drops_tokens_with_unresolved_placeholders() {
        let table = vars(&[("known", "v")]);
        let templates = vec![
            Argument::Literal("${known}".to_string()),
            Argument::Literal("${unknown}".to_string()),
        ];
        let expanded = expand_arguments(&templates, &table, &plain_ctx());
        assert_eq!(expanded, vec!["v"]);
    }

    #[test]
    fn conditional_group_is_all_or_nothing() {
        let mut features = HashMap::new();
        features.insert("has_custom_resolution".to_string(), true);
        let templates = vec![Argument::Conditional {
            rules: vec![Rule {
                action: RuleAction::Allow,
                os: None,
                features: Some(features),
            }],
            value: ArgumentValue::Many(vec![
                "--width".to_string(),
                "${resolution_width}".to_string(),
            ]),
        }];

        // Feature off: whole group dropped by the rule.
        let table = vars(&[("resolution_width", "800")]);
        assert!(expand_arguments(&templates, &table, &plain_ctx()).is_empty());

        // Feature on but width missing: dropped so "--width" never dangles.
        let ctx = plain_ctx().with_feature("has_custom_resolution", true);
        assert!(expand_arguments(&templates, &vars(&[]), &ctx).is_empty());

        // Feature on and resolvable: both tokens emitted.
        let expanded = expand_arguments(&templates, &table, &ctx);
        assert_eq!(expanded, vec!["--width", "800"]);
    }
}
