//! Architecture name normalization
//!
//! Registries describe platforms with distribution names (`arm64`, `amd64`)
//! while build metadata uses canonical names (`aarch64`, `x86_64`). All
//! comparisons happen on the canonical form.

/// Pairs of (registry name, canonical name)
const ARCH_ALIASES: &[(&str, &str)] = &[("arm64", "aarch64"), ("amd64", "x86_64")];

/// Map a registry architecture name onto its canonical name.
///
/// Unknown names pass through unchanged.
pub fn normalize(registry_arch: &str) -> &str {
    ARCH_ALIASES
        .iter()
        .find(|(registry, _)| *registry == registry_arch)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(registry_arch)
}

/// Map a canonical architecture name onto the name a registry uses.
///
/// Inverse of [`normalize`] on the known set; other names pass through.
pub fn to_registry(canonical_arch: &str) -> &str {
    ARCH_ALIASES
        .iter()
        .find(|(_, canonical)| *canonical == canonical_arch)
        .map(|(registry, _)| *registry)
        .unwrap_or(canonical_arch)
}

/// Architecture of the running host, in canonical form
pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}
