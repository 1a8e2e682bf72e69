//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// relctl - publish and sign build artifacts
#[derive(Parser, Debug)]
#[command(name = "relctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to relctl.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Publish a multi-arch manifest list for a build, if it changed
    PushContainerManifest(PushManifestArgs),

    /// Have a build's commit or images signed and verify the result
    Sign(SignArgs),
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PushManifestArgs {
    /// Registry repository, e.g. quay.io/org/os
    #[arg(long)]
    pub repo: String,

    /// Tag to push (repeatable); the first one is compared against
    #[arg(long = "tag", required = true)]
    pub tags: Vec<String>,

    /// Architecture to include (repeatable); defaults to all built ones
    #[arg(long = "arch")]
    pub arches: Vec<String>,

    /// Build id; defaults to the latest build
    #[arg(long)]
    pub build: Option<String>,

    /// Artifact in `images` to publish
    #[arg(long, default_value = "ostree")]
    pub artifact: String,

    /// Metadata key publication records are stored under
    #[arg(long, default_value = "base-oscontainer")]
    pub metajsonname: String,

    /// Publish even when the registry already matches
    #[arg(short, long)]
    pub force: bool,

    /// Push Docker v2s2 manifests instead of OCI
    #[arg(long)]
    pub v2s2: bool,

    /// Write the manifest list digest to this file
    #[arg(long)]
    pub write_digest_to_file: Option<Utf8PathBuf>,

    /// Container auth file (overrides registry.authfile)
    #[arg(long)]
    pub authfile: Option<Utf8PathBuf>,
}

/// What to sign
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SignTarget {
    /// Sign the build's ostree commit
    #[arg(long)]
    pub ostree: bool,

    /// Sign every image of the build
    #[arg(long)]
    pub images: bool,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub target: SignTarget,

    /// Build id; defaults to the latest build
    #[arg(long)]
    pub build: Option<String>,

    /// Architecture; defaults to the host's
    #[arg(long)]
    pub arch: Option<String>,

    /// Use the staging signing environment
    #[arg(long)]
    pub stg: bool,

    /// Only verify existing signatures (images only)
    #[arg(long)]
    pub verify_only: bool,

    /// Armored public key to verify with (overrides signing.gpg_key_path)
    #[arg(long)]
    pub gpgkeypath: Option<Utf8PathBuf>,

    /// Extra key=value added to the request (repeatable)
    #[arg(long = "extra-key", value_name = "KEY=VALUE")]
    pub extra_keys: Vec<String>,

    /// Seconds to wait for the signing authority
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Artifact in `images` that carries the commit
    #[arg(long, default_value = "ostree")]
    pub artifact: String,
}
