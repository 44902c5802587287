use muster_core::provider::provider_passthrough;
use muster_core::{paths, MusterError};
use std::path::Path;

/// Thin passthroughs to the cluster provider: run the tool, surface the
/// exit status, nothing more.
#[derive(Debug, Clone, Copy)]
pub enum ProviderAction {
    Up,
    Halt,
    Reload,
    Destroy,
}

impl ProviderAction {
    fn argv(self) -> &'static [&'static str] {
        match self {
            ProviderAction::Up => &["up"],
            ProviderAction::Halt => &["halt"],
            ProviderAction::Reload => &["reload"],
            ProviderAction::Destroy => &["destroy", "-f"],
        }
    }
}

pub fn run(root: &Path, action: ProviderAction) -> anyhow::Result<()> {
    if !paths::is_project(root) {
        return Err(MusterError::NotAProject(root.display().to_string()).into());
    }
    provider_passthrough(root, action.argv())?;
    Ok(())
}
