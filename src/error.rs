use crate::fleet::MAX_DEVICES;
use thiserror::Error;

/// Taxonomie des erreurs du gestionnaire de flotte. Toutes sont détectées
/// de façon synchrone et remontées telles quelles à l'appelant ; aucune
/// n'est réessayée automatiquement.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported model: {0}")]
    UnknownModel(String),

    #[error("mac address already in use: {0}")]
    AddressInUse(String),

    #[error("fleet limit reached ({max} devices)", max = MAX_DEVICES)]
    CapacityExceeded,

    #[error("{0} not found")]
    NotFound(String),

    #[error("model still referenced by live devices: {0}")]
    ModelInUse(String),

    // L'échec de connexion est intercepté au niveau du device ; il n'est
    // observable que via `connected=false` ou un start() qui rend false.
    #[error("device failed to start")]
    ConnectionFailure,
}
