//! sign command

use anyhow::{Context, Result};
use camino::Utf8Path;
use relctl_core::config::BusKind;
use relctl_core::{arch, BuildMetadataStore, Error, RelctlConfig, SigningEnvironment};
use relctl_sign::{
    parse_extra_keys, CommitSigner, GpgVerifier, ImageSigner, InMemoryBus, MessageBus,
    OstreeCli, S3ObjectStore, SigningContext, SigningProtocol, SpoolBus,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::flag_or_config_path;
use crate::cli::SignArgs;
use crate::output;

pub async fn run(args: SignArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    if args.verify_only && args.target.ostree {
        return Err(Error::configuration("--verify-only is only supported with --images").into());
    }

    let config = RelctlConfig::load(config_path)?;
    let signing = &config.config.signing;

    let environment = if args.stg {
        SigningEnvironment::Staging
    } else {
        signing.environment
    };

    let mut extra = signing.extra.clone();
    extra.extend(parse_extra_keys(&args.extra_keys)?);

    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| signing.request_timeout());

    let public_key = flag_or_config_path(
        &config,
        args.gpgkeypath.as_deref(),
        signing.gpg_key_path.as_deref(),
    )
    .map(|p| p.into_std_path_buf())
    .ok_or_else(|| {
        Error::configuration(
            "no public key configured: pass --gpgkeypath or set signing.gpg_key_path",
        )
    })?;

    let store = BuildMetadataStore::new(config.builds_dir().into_std_path_buf());
    let index = store.index()?;
    let build = index.resolve(args.build.as_deref())?;
    let arch = args.arch.as_deref().unwrap_or_else(|| arch::host_arch());
    let build_arches = index.arches_for(&build.id)?;
    if !build_arches.iter().any(|a| a == arch) {
        return Err(Error::configuration(format!(
            "build {} has no {} architecture (built: {})",
            build.id,
            arch,
            build_arches.join(", ")
        ))
        .into());
    }
    let mut record = store.load(&build.id, arch)?;

    let bus_config = &config.config.bus;
    let bus: Box<dyn MessageBus> = match bus_config.kind {
        BusKind::Spool => Box::new(SpoolBus::new(
            config.resolve(&bus_config.spool_dir).into_std_path_buf(),
            bus_config.poll_interval(),
        )),
        BusKind::Memory => {
            output::warning("Using the in-process bus; no signing authority will answer");
            Box::new(InMemoryBus::new())
        }
    };

    let storage = &config.config.storage;
    let objects = S3ObjectStore::new(storage).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; abandoning the signing request");
            on_interrupt.cancel();
        }
    });

    let protocol = SigningProtocol::new(bus.as_ref(), bus_config.topic_prefix.clone(), timeout)
        .with_cancellation(cancel);

    let ctx = SigningContext {
        protocol: &protocol,
        store: &objects,
        storage,
        environment,
        public_key,
        extra,
        priority: signing.priority,
    };

    output::header(&format!(
        "Signing build {} ({}) in {}",
        build.id, arch, environment
    ));

    if args.target.ostree {
        let commits = OstreeCli::new(
            config
                .resolve(&config.config.commit_store.repo)
                .into_std_path_buf(),
        )?;

        let spinner = output::spinner("Waiting for commit signature");
        let report = CommitSigner::new(&ctx, &commits)
            .sign(&mut record, &args.artifact, false)
            .await;
        spinner.finish_and_clear();
        let report =
            report.with_context(|| format!("Failed to sign commit of build {}", build.id))?;

        output::kv("commit", &report.checksum);
        output::kv("signed by", &report.verification.result.fingerprint);
        match report.reexported {
            Some(entry) => {
                output::success(&format!("Signature embedded in {}", entry.path));
                output::kv("sha256", &entry.sha256);
            }
            None => output::warning("Signature is not valid; artifact left unchanged"),
        }
    } else {
        let verifier = GpgVerifier::new()?;

        let message = if args.verify_only {
            "Verifying image signatures"
        } else {
            "Waiting for image signatures"
        };
        let spinner = output::spinner(message);
        let report = ImageSigner::new(&ctx, &verifier)
            .sign(&record, args.verify_only)
            .await;
        spinner.finish_and_clear();
        let report =
            report.with_context(|| format!("Failed to sign images of build {}", build.id))?;

        if !report.requested {
            output::info("No signing request sent; verified existing signatures");
        }
        for path in &report.verification.placed {
            output::kv("signature", &path.display().to_string());
        }
        for name in &report.verification.tolerated {
            output::warning(&format!("{}: invalid signature tolerated in staging", name));
        }
        output::success(&format!(
            "{} image signature(s) verified",
            report.verification.placed.len()
        ));
    }

    Ok(())
}
