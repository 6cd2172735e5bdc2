//! Conditional rule evaluation for libraries and launch arguments.
//!
//! A rule list is folded in order: every rule whose predicates all match
//! overwrites the running result with its action, so the last matching
//! rule wins. An empty match set leaves the default, which is disallow.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Regex matched against the host OS version string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Snapshot of the ambient environment a rule list is evaluated against.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub os_name: String,
    pub arch: String,
    pub os_version: String,
    pub features: HashMap<String, bool>,
}

impl RuleContext {
    /// Snapshot the current host with no feature flags set.
    pub fn current() -> Self {
        Self {
            os_name: host_os_name().to_string(),
            arch: host_arch().to_string(),
            os_version: host_os_version(),
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, value: bool) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }
}

/// Fold a rule list into a final action. Pure: no side effects, fully
/// determined by the rules and the context snapshot.
pub fn evaluate_rules(rules: &[Rule], ctx: &RuleContext) -> RuleAction {
    let mut result = RuleAction::Disallow;

    for rule in rules {
        if rule_matches(rule, ctx) {
            result = rule.action;
        }
    }

    result
}

fn rule_matches(rule: &Rule, ctx: &RuleContext) -> bool {
    if let Some(ref os) = rule.os {
        if let Some(ref name) = os.name {
            if name != &ctx.os_name {
                return false;
            }
        }

        if let Some(ref arch) = os.arch {
            if arch != &ctx.arch {
                return false;
            }
        }

        if let Some(ref version_expr) = os.version {
            match regex::Regex::new(version_expr) {
                Ok(re) => {
                    if !re.is_match(&ctx.os_version) {
                        return false;
                    }
                }
                // An uncompilable expression never matches.
                Err(_) => return false,
            }
        }
    }

    if let Some(ref features) = rule.features {
        for (name, wanted) in features {
            let active = ctx.features.get(name).copied().unwrap_or(false);
            if active != *wanted {
                return false;
            }
        }
    }

    true
}

/// Normalized host platform name as used by descriptor rules.
pub fn host_os_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "osx";

    #[cfg(target_os = "linux")]
    return "linux";
}

/// Normalized host architecture name as used by descriptor rules and the
/// runtime index.
pub fn host_arch() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    return "x64";

    #[cfg(target_arch = "x86")]
    return "x86";

    #[cfg(target_arch = "aarch64")]
    return "arm64";

    #[cfg(target_arch = "arm")]
    return "arm32";
}

/// Bit-width string substituted into `${arch}` native classifier keys.
pub fn host_arch_bits() -> &'static str {
    #[cfg(target_pointer_width = "64")]
    return "64";

    #[cfg(target_pointer_width = "32")]
    return "32";
}

pub fn host_os_version() -> String {
    sysinfo::System::long_os_version().unwrap_or_default()
}

/// Separator used when joining classpath entries on this platform.
pub fn classpath_separator(os_name: &str) -> &'static str {
    if os_name == "windows" {
        ";"
    } else {
        ":"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(os: &str, arch: &str) -> RuleContext {
        RuleContext {
            os_name: os.to_string(),
            arch: arch.to_string(),
            os_version: "10.0.19045".to_string(),
            features: HashMap::new(),
        }
    }

    fn os_rule(action: RuleAction, name: &str) -> Rule {
        Rule {
            action,
            os: Some(OsRule {
                name: Some(name.to_string()),
                version: None,
                arch: None,
            }),
            features: None,
        }
    }

    #[test]
    fn empty_rule_list_disallows() {
        assert_eq!(
            evaluate_rules(&[], &ctx("windows", "x64")),
            RuleAction::Disallow
        );
    }

    #[test]
    fn last_matching_rule_wins() {
        let rules = vec![
            os_rule(RuleAction::Allow, "windows"),
            os_rule(RuleAction::Disallow, "windows"),
        ];
        assert_eq!(
            evaluate_rules(&rules, &ctx("windows", "x64")),
            RuleAction::Disallow
        );

        // Reversed order flips the outcome.
        let rules = vec![
            os_rule(RuleAction::Disallow, "windows"),
            os_rule(RuleAction::Allow, "windows"),
        ];
        assert_eq!(
            evaluate_rules(&rules, &ctx("windows", "x64")),
            RuleAction::Allow
        );
    }

    #[test]
    fn unconditional_allow_then_os_disallow() {
        let rules = vec![
            Rule {
                action: RuleAction::Allow,
                os: None,
                features: None,
            },
            os_rule(RuleAction::Disallow, "osx"),
        ];
        assert_eq!(
            evaluate_rules(&rules, &ctx("osx", "x64")),
            RuleAction::Disallow
        );
        assert_eq!(
            evaluate_rules(&rules, &ctx("linux", "x64")),
            RuleAction::Allow
        );
    }

    #[test]
    fn version_regex_predicate() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: None,
                version: Some("^10\\.".to_string()),
                arch: None,
            }),
            features: None,
        };
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &ctx("windows", "x64")),
            RuleAction::Allow
        );

        let mut old = ctx("windows", "x64");
        old.os_version = "6.1.7601".to_string();
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &old),
            RuleAction::Disallow
        );
    }

    #[test]
    fn feature_predicate_requires_active_flag() {
        let mut features = HashMap::new();
        features.insert("has_custom_resolution".to_string(), true);
        let rule = Rule {
            action: RuleAction::Allow,
            os: None,
            features: Some(features),
        };

        let plain = ctx("linux", "x64");
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &plain),
            RuleAction::Disallow
        );

        let with_res = plain.with_feature("has_custom_resolution", true);
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &with_res),
            RuleAction::Allow
        );
    }

    #[test]
    fn arch_mismatch_skips_rule() {
        let rule = Rule {
            action: RuleAction::Allow,
            os: Some(OsRule {
                name: None,
                version: None,
                arch: Some("x86".to_string()),
            }),
            features: None,
        };
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &ctx("windows", "x64")),
            RuleAction::Disallow
        );
        assert_eq!(
            evaluate_rules(std::slice::from_ref(&rule), &ctx("windows", "x86")),
            RuleAction::Allow
        );
    }
}
