//! Artifact builder - the sub-steps run inside the isolated environment

use crate::core::condition::SuccessPredicate;
use crate::core::config::ProvisionConfig;
use crate::core::step::{Program, Step, StepAction};
use std::path::PathBuf;

/// Separator PyInstaller expects between source and destination in `--add-data`
pub fn data_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

/// Final artifact location, relative to the project directory
///
/// One-file builds produce `<dist>/<name>`; one-folder builds put the
/// executable inside `<dist>/<name>/`.
pub fn artifact_path(config: &ProvisionConfig) -> PathBuf {
    let name = &config.app.display_name;
    let file_name = if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.clone()
    };
    let dist = PathBuf::from(&config.build.output_dir);
    if config.build.one_file {
        dist.join(file_name)
    } else {
        dist.join(name).join(file_name)
    }
}

/// One-line Pillow program converting `argv[1]` into an icon at `argv[2]`
pub fn icon_script(sizes: &[u32]) -> String {
    let sizes = sizes
        .iter()
        .map(|s| format!("({}, {})", s, s))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "import sys; from PIL import Image; \
         Image.open(sys.argv[1]).convert('RGBA').save(sys.argv[2], format='ICO', sizes=[{}])",
        sizes
    )
}

/// Arguments for the environment interpreter that run the packaging tool
pub fn packager_args(config: &ProvisionConfig) -> Vec<String> {
    let build = &config.build;
    let mut args: Vec<String> = vec![
        "-m".into(),
        "PyInstaller".into(),
        // Overwrite previous output so re-runs converge on the same artifact
        "--noconfirm".into(),
        "--clean".into(),
    ];
    if build.one_file {
        args.push("--onefile".into());
    }
    if build.windowed {
        args.push("--windowed".into());
    }
    args.push("--name".into());
    args.push(config.app.display_name.clone());
    args.push("--icon".into());
    args.push(config.icon_output().to_string_lossy().to_string());
    for file in &config.app.data_files {
        args.push("--add-data".into());
        args.push(format!("{}{}{}", file.source, data_separator(), file.dest));
    }
    args.push("--distpath".into());
    args.push(build.output_dir.clone());
    args.extend(build.extra_packager_args.iter().cloned());
    args.push(config.app.entry_script.clone());
    args
}

fn run_in_env(id: &str, description: &str, args: Vec<String>) -> Step {
    Step::new(
        id,
        description,
        StepAction::Run {
            program: Program::EnvironmentInterpreter,
            args,
            success: SuccessPredicate::exit_zero(),
        },
    )
}

/// Ordered sub-steps: upgrade installer, install deps, convert icon, package, verify
pub fn plan(config: &ProvisionConfig) -> Vec<Step> {
    let mut steps = Vec::new();

    if config.build.upgrade_installer {
        steps.push(run_in_env(
            "upgrade-pip",
            "Upgrade the environment's package installer",
            ["-m", "pip", "install", "--upgrade", "pip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ));
    }

    if !config.build.dependencies.is_empty() {
        let mut args: Vec<String> = ["-m", "pip", "install"].iter().map(|s| s.to_string()).collect();
        args.extend(config.build.dependencies.iter().cloned());
        steps.push(run_in_env(
            "install-build-deps",
            "Install build-time dependencies",
            args,
        ));
    }

    steps.push(run_in_env(
        "convert-icon",
        "Convert the icon image",
        vec![
            "-c".to_string(),
            icon_script(&config.build.icon_sizes),
            config.app.icon_source.clone(),
            config.icon_output().to_string_lossy().to_string(),
        ],
    ));

    steps.push(run_in_env(
        "package-app",
        "Bundle the application",
        packager_args(config),
    ));

    steps.push(Step::new(
        "verify-artifact",
        "Check the artifact was produced",
        StepAction::VerifyArtifact {
            path: artifact_path(config),
        },
    ));

    steps
}
