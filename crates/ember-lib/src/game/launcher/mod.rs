pub mod arguments;
pub mod classpath;
pub mod types;

pub use types::{LaunchCommand, LaunchOptions};

use crate::game::rules::RuleContext;
use crate::game::runtime::runtime_executable;
use crate::game::versions::VersionDescriptor;
use crate::store::LocalStore;
use anyhow::{Context, Result};
use std::path::Path;

/// Build the full launch command for a resolved, fully-downloaded version:
/// the runtime executable, substituted JVM arguments, main class and
/// substituted game arguments.
pub fn build_launch_command(
    descriptor: &VersionDescriptor,
    version_id: &str,
    store: &LocalStore,
    game_dir: &Path,
    runtime_major: u32,
    options: &LaunchOptions,
) -> Result<LaunchCommand> {
    let ctx = RuleContext::current()
        .with_feature("has_custom_resolution", options.window_size.is_some());

    let classpath = classpath::build_classpath(descriptor, version_id, store, &ctx)?;
    let variables =
        arguments::build_variables(descriptor, version_id, store, game_dir, &classpath, options);

    let mut args = Vec::new();

    if let Some(lists) = &descriptor.arguments {
        args.extend(arguments::expand_arguments(&lists.jvm, &variables, &ctx));
    }

    // Legacy descriptors carry no JVM template; supply the classpath flag
    // ourselves.
    let has_classpath = args.iter().any(|a| a == "-cp" || a == "-classpath");
    if !has_classpath {
        args.push("-cp".to_string());
        args.push(classpath.clone());
    }

    let main_class = descriptor
        .main_class
        .clone()
        .context("No main class in resolved descriptor")?;
    args.push(main_class);

    if let Some(lists) = &descriptor.arguments {
        args.extend(arguments::expand_arguments(&lists.game, &variables, &ctx));
    }

    Ok(LaunchCommand {
        program: runtime_executable(store, runtime_major),
        args,
        classpath,
    })
}
