//! push-container-manifest command

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use relctl_core::{BuildMetadataStore, RelctlConfig};
use relctl_publish::{publish_container_manifest, CliRegistry, PublishOutcome, PublishRequest};

use super::flag_or_config_path;
use crate::cli::PushManifestArgs;
use crate::output;

pub async fn run(args: PushManifestArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = RelctlConfig::load(config_path)?;
    let registry_config = &config.config.registry;

    let mut registry = CliRegistry::new()?;
    if let Some(authfile) = flag_or_config_path(
        &config,
        args.authfile.as_deref(),
        registry_config.authfile.as_deref(),
    ) {
        registry = registry.with_authfile(authfile.into_std_path_buf());
    }

    let store = BuildMetadataStore::new(config.builds_dir().into_std_path_buf());
    let request = PublishRequest {
        repo: args.repo.clone(),
        tags: args.tags,
        build_id: args.build,
        requested_arches: args.arches,
        artifact: args.artifact,
        namespace: args.metajsonname,
        force: args.force,
        legacy_format: args.v2s2 || registry_config.legacy_format,
        digest_file: args
            .write_digest_to_file
            .map(Utf8PathBuf::into_std_path_buf),
    };

    output::header(&format!("Publishing manifest list to {}", args.repo));
    if request.force {
        output::info("Forcing a publish even if the registry matches");
    }

    let spinner = output::spinner("Reconciling registry state");
    let outcome = publish_container_manifest(&registry, &store, &request).await;
    spinner.finish_and_clear();
    let outcome =
        outcome.with_context(|| format!("Failed to publish manifest list to {}", args.repo))?;

    match outcome {
        PublishOutcome::UpToDate { arches } => {
            output::success(&format!(
                "{} is up to date ({})",
                args.repo,
                arches.join(", ")
            ));
        }
        PublishOutcome::Published { digest, arches } => {
            output::success(&format!("Published {}", args.repo));
            if let Some(digest) = digest {
                output::kv("manifest list", &digest);
            }
            for (arch, digest) in arches {
                output::kv(&arch, &digest);
            }
        }
    }

    Ok(())
}
