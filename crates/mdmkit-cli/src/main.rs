// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mdmkit: command line entry point.
//
// `generate` runs the build-time restriction schema plugin against an app
// project; `probe` asks the platform bridge for everything the JS module
// would report on this host.

use std::path::PathBuf;
use std::process::ExitCode;

use mdmkit_bridge::MdmModule;
use mdmkit_core::error::Result;
use mdmkit_core::{ModuleConfig, PluginSettings};

const USAGE: &str = "\
usage: mdmkit generate <settings.json> [--project-root DIR] [--ios-info-plist PATH]
       mdmkit probe
       mdmkit help";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Generate {
        settings: PathBuf,
        project_root: PathBuf,
        info_plist: Option<PathBuf>,
    },
    Probe,
    Help,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> std::result::Result<Command, String> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        None | Some("help" | "--help" | "-h") => Ok(Command::Help),
        Some("probe") => match args.next() {
            None => Ok(Command::Probe),
            Some(extra) => Err(format!("unexpected argument '{extra}'")),
        },
        Some("generate") => {
            let mut settings = None;
            let mut project_root = PathBuf::from(".");
            let mut info_plist = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--project-root" => {
                        project_root = args
                            .next()
                            .map(PathBuf::from)
                            .ok_or("--project-root needs a directory")?;
                    }
                    "--ios-info-plist" => {
                        info_plist =
                            Some(args.next().map(PathBuf::from).ok_or("--ios-info-plist needs a path")?);
                    }
                    flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
                    path if settings.is_none() => settings = Some(PathBuf::from(path)),
                    extra => return Err(format!("unexpected argument '{extra}'")),
                }
            }
            let settings = settings.ok_or("generate needs a settings file")?;
            Ok(Command::Generate {
                settings,
                project_root,
                info_plist,
            })
        }
        Some(other) => Err(format!("unknown command '{other}'")),
    }
}

fn generate(settings: PathBuf, project_root: PathBuf, info_plist: Option<PathBuf>) -> Result<()> {
    let plugin_settings = PluginSettings::load(&settings)?;
    tracing::info!(settings = %settings.display(), root = %project_root.display(), "running restriction plugin");

    let artifacts = mdmkit_schema::run_plugin(&plugin_settings, &project_root, info_plist.as_deref())?;
    for path in &artifacts.written {
        println!("wrote {}", path.display());
    }
    if artifacts.manifest_patched {
        println!("patched AndroidManifest.xml");
    }
    if let Some(path) = info_plist.filter(|_| artifacts.info_plist_patched) {
        println!("patched {}", path.display());
    }
    Ok(())
}

async fn probe() -> Result<()> {
    let module = MdmModule::for_current_platform(ModuleConfig::default());
    let report = serde_json::json!({
        "platform": module.platform_name(),
        "constants": module.config().constants(),
        "supported": module.is_supported().await?,
        "configuration": module.get_configuration().await?,
        "appLockingAllowed": module.is_app_locking_allowed().await?,
        "appLocked": module.is_app_locked().await?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    module.shutdown()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let result = match command {
        Command::Generate {
            settings,
            project_root,
            info_plist,
        } => generate(settings, project_root, info_plist),
        Command::Probe => probe().await,
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "mdmkit failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Command, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_prints_help() {
        assert_eq!(parse(&[]), Ok(Command::Help));
    }

    #[test]
    fn generate_takes_settings_and_options() {
        assert_eq!(
            parse(&["generate", "mdm.json", "--ios-info-plist", "ios/App/Info.plist", "--project-root", "app"]),
            Ok(Command::Generate {
                settings: PathBuf::from("mdm.json"),
                project_root: PathBuf::from("app"),
                info_plist: Some(PathBuf::from("ios/App/Info.plist")),
            })
        );
    }

    #[test]
    fn generate_defaults_to_current_directory() {
        match parse(&["generate", "mdm.json"]) {
            Ok(Command::Generate { project_root, info_plist, .. }) => {
                assert_eq!(project_root, PathBuf::from("."));
                assert!(info_plist.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_invocations_are_rejected() {
        assert!(parse(&["generate"]).is_err());
        assert!(parse(&["generate", "a.json", "b.json"]).is_err());
        assert!(parse(&["generate", "a.json", "--project-root"]).is_err());
        assert!(parse(&["generate", "a.json", "--verbose"]).is_err());
        assert!(parse(&["probe", "now"]).is_err());
        assert!(parse(&["publish"]).is_err());
    }
}
