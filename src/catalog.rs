/**
 * MODEL CATALOG - Catalogue des modèles de devices supportés
 *
 * RÔLE : Mapping modèle -> version firmware par défaut, persisté en JSON.
 * Chargé une fois à la construction du gestionnaire ; toute lecture
 * impossible (fichier absent, JSON invalide, mauvaise forme) retombe
 * silencieusement sur le catalogue par défaut.
 *
 * Les mutations (insert/remove/replace + save) s'exécutent toujours sous
 * le verrou de flotte, jamais ici : ce module ne connaît pas la flotte.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub type ModelsMap = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: ModelsMap,
    path: PathBuf,
}

impl ModelCatalog {
    /// Catalogue intégré utilisé en dernier recours.
    pub fn defaults() -> ModelsMap {
        HashMap::from([("ZP2".to_string(), "T251107-S1".to_string())])
    }

    /// Charge le catalogue persisté ; ne renvoie jamais d'erreur.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let models = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ModelsMap>(&content) {
                Ok(map) => {
                    println!("[catalog] loaded {} models from {}", map.len(), path.display());
                    map
                }
                Err(e) => {
                    eprintln!("[catalog] invalid model store {}: {e}, using defaults", path.display());
                    Self::defaults()
                }
            },
            Err(_) => {
                println!("[catalog] no model store at {}, using defaults", path.display());
                Self::defaults()
            }
        };
        Self { models, path }
    }

    /// Écrit le catalogue sur disque (appelé sous le verrou de flotte,
    /// d'où l'IO synchrone : mutation + persistance forment une seule
    /// section critique).
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.models)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn default_firmware(&self, model: &str) -> Option<String> {
        self.models.get(model).cloned()
    }

    pub fn insert(&mut self, model: String, fw_version: String) {
        self.models.insert(model, fw_version);
    }

    pub fn remove(&mut self, model: &str) -> bool {
        self.models.remove(model).is_some()
    }

    /// Remplacement atomique de tout le catalogue (import).
    pub fn replace(&mut self, models: ModelsMap) {
        self.models = models;
    }

    pub fn snapshot(&self) -> ModelsMap {
        self.models.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModelCatalog::load(dir.path().join("nope.json"));
        assert_eq!(catalog.snapshot(), ModelCatalog::defaults());
        assert_eq!(catalog.default_firmware("ZP2").as_deref(), Some("T251107-S1"));
    }

    #[test]
    fn corrupt_store_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, "{not json").unwrap();
        let catalog = ModelCatalog::load(&path);
        assert_eq!(catalog.snapshot(), ModelCatalog::defaults());
    }

    #[test]
    fn wrong_shape_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, r#"{"ZP2": 42}"#).unwrap();
        let catalog = ModelCatalog::load(&path);
        assert_eq!(catalog.snapshot(), ModelCatalog::defaults());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("models.json");
        let mut catalog = ModelCatalog::load(&path);
        catalog.insert("ZP9".into(), "T999999-S9".into());
        catalog.save().unwrap();

        let reloaded = ModelCatalog::load(&path);
        assert_eq!(reloaded.snapshot(), catalog.snapshot());
        assert!(reloaded.contains("ZP9"));
    }
}
