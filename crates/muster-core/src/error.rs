use thiserror::Error;

#[derive(Debug, Error)]
pub enum MusterError {
    #[error("not a cluster project: no Vagrantfile or .muster/ in {0}")]
    NotAProject(String),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("provider tool not found: {0}")]
    ProviderMissing(String),

    #[error("provider query failed: {0}")]
    ProviderQuery(String),

    #[error("provider command '{command}' exited with code {code}")]
    ProviderExit { command: String, code: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MusterError>;
