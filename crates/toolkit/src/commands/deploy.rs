use std::time::Duration;

use common::config::{ConfigError, Manifest};
use derive_more::{Display, Error, From};
use dialoguer::Confirm;
use indicatif::ProgressBar;

use crate::{
    archiver::{ArchiveError, Package, PACKAGE_FILE_NAME},
    commands::{Deploy, TagDisplay},
    context::{Context, ContextError},
    output::{parse_fields, render_tags, OutputError},
    plugin::{local_version, PluginError},
    reconciler::{reconcile, DeployOptions, Outcome, PluginTags, ReconcileError, Release},
};

/// `version deploy` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeployError {
    /// Configuration error.
    Config(ConfigError),

    /// Unable to prepare the API client.
    Context(ContextError),

    /// Unable to read the local plugin version.
    Plugin(PluginError),

    /// Zip archiver error.
    #[display(fmt = "unable to create zip archive: {}", _0)]
    Archiver(ArchiveError),

    /// Version reconciliation error.
    Reconcile(ReconcileError),

    /// Unable to render the deployed version.
    Output(OutputError),
}

/// Deploy flow entrypoint.
pub(crate) fn deploy(
    context: &Context,
    Deploy {
        local,
        add_freemius_contributor,
        force,
        yes,
        display,
    }: Deploy,
) -> Result<(), DeployError> {
    let manifest = context.manifest()?;

    if local {
        return deploy_local(context, manifest);
    }

    let TagDisplay { fields, format } = display;
    let fields = parse_fields(fields.as_deref())?;

    let api = context.api()?;
    let version = local_version(context.project_dir())?;

    let progress = ProgressBar::new_spinner();

    progress.enable_steady_tick(Duration::from_millis(150));
    progress.set_message("Archiving...");

    let result = Package::build(
        context.project_dir(),
        &manifest.include,
        context.project_dir().join(PACKAGE_FILE_NAME),
    )
    .map_err(DeployError::from)
    .and_then(|package| {
        progress.set_message(format!("Deploying version {version}..."));

        let remote = PluginTags {
            api,
            plugin_id: &manifest.plugin_id,
        };

        let options = DeployOptions {
            force,
            add_contributor: add_freemius_contributor,
        };

        Ok(reconcile(&remote, package, &version, options, |version| {
            if yes {
                return Ok(true);
            }

            Ok(progress.suspend(|| {
                Confirm::new()
                    .with_prompt(format!(
                        "Version {version} is already deployed. Do you want to update it?"
                    ))
                    .default(false)
                    .interact()
            })?)
        })?)
    });

    progress.finish_and_clear();

    match result? {
        Outcome::Aborted => println!("Deployment aborted."),
        Outcome::Deployed { release, tag } => {
            match release {
                Release::New => println!("Success: The new version has been successfully deployed."),
                Release::Update => println!(
                    "Success: Version {} has been successfully updated.",
                    tag.version
                ),
            }

            println!("{}", render_tags(&[tag], format, &fields)?);
        }
    }

    Ok(())
}

/// Build the package archive without deploying it.
fn deploy_local(context: &Context, manifest: &Manifest) -> Result<(), DeployError> {
    let package = Package::build(
        context.project_dir(),
        &manifest.include,
        context.project_dir().join(PACKAGE_FILE_NAME),
    )?;

    let path = package.keep();

    tracing::debug!(path = %path.display(), "package kept");

    println!("Success: The zip archive \"{PACKAGE_FILE_NAME}\" has been successfully created.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::config::Config;

    use super::{deploy, DeployError};
    use crate::{
        archiver::PACKAGE_FILE_NAME,
        commands::{Deploy, TagDisplay},
        context::Context,
        output::{Format, OutputError},
    };

    #[test]
    fn unknown_field_fails_before_packaging() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".freemius.yml"),
            "plugin_id: 42\ninclude:\n  - acme.php\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("acme.php"),
            "<?php\n/*\n * Plugin Name: Acme\n * Version: 1.2.0\n */\n",
        )
        .unwrap();

        let context = Context::new(Config::default(), dir.path().to_path_buf());

        let result = deploy(
            &context,
            Deploy {
                local: false,
                add_freemius_contributor: false,
                force: true,
                yes: true,
                display: TagDisplay {
                    fields: Some(String::from("id,bogus")),
                    format: Format::Table,
                },
            },
        );

        assert!(matches!(
            result,
            Err(DeployError::Output(OutputError::UnknownField(field))) if field == "bogus"
        ));
        assert!(!dir.path().join(PACKAGE_FILE_NAME).exists());
    }
}
