/**
 * FLEET MANAGER - Gestion de la flotte de devices simulés
 *
 * RÔLE : Possède la collection de devices (id -> simulateur), applique les
 * invariants de flotte (capacité 100, unicité MAC, modèle connu) et offre
 * les opérations de cycle de vie unitaires et bulk.
 *
 * CONCURRENCE : un seul verrou de flotte (mutations entièrement
 * sérialisées) ; les opérations bulk prennent un instantané sous verrou
 * puis travaillent hors verrou via un pool borné de workers avec timeout
 * par tâche. Un timeout n'annule pas la tâche (best-effort assumé).
 */

use crate::catalog::{ModelCatalog, ModelsMap};
use crate::config::SimConfig;
use crate::device::{DeviceSimulator, DeviceStatus};
use crate::error::FleetError;
use crate::ident::MacAllocator;
use crate::mqtt::SessionFactory;
use crate::paginate::{paginate, PageView};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;

/// Taille maximale de la flotte.
pub const MAX_DEVICES: usize = 100;
/// Workers concurrents pour les opérations bulk, indépendant de la taille
/// de la flotte.
const MAX_WORKERS: usize = 5;
/// Attente maximale par tâche bulk.
const TASK_TIMEOUT: Duration = Duration::from_secs(5);

struct FleetInner {
    /// Ordre d'insertion préservé : c'est l'ordre des listings paginés.
    devices: IndexMap<String, Arc<DeviceSimulator>>,
    macs: MacAllocator,
    /// Compteur monotone, jamais réutilisé : ids et MAC séquentielles.
    counter: u64,
    catalog: ModelCatalog,
}

/// Le gestionnaire vit derrière un Arc (état axum) ; le verrou de flotte
/// est le seul point de sérialisation des mutations.
pub struct FleetManager {
    inner: Mutex<FleetInner>,
    factory: Arc<dyn SessionFactory>,
    workers: Arc<Semaphore>,
    data_interval: u64,
    heartbeat_interval: u64,
}

impl FleetManager {
    pub fn new(cfg: &SimConfig, factory: Arc<dyn SessionFactory>) -> Self {
        let catalog = ModelCatalog::load(&cfg.model_store_path);
        Self {
            inner: Mutex::new(FleetInner {
                devices: IndexMap::new(),
                macs: MacAllocator::new(),
                counter: 0,
                catalog,
            }),
            factory,
            workers: Arc::new(Semaphore::new(MAX_WORKERS)),
            data_interval: cfg.data_interval,
            heartbeat_interval: cfg.heartbeat_interval,
        }
    }

    /// Ajoute un device. Toute la séquence (capacité, modèle, MAC,
    /// insertion) forme une section critique unique : aucun device
    /// partiellement ajouté n'est jamais visible.
    pub fn add_device(
        &self,
        model: &str,
        fw_version: Option<String>,
        mac: Option<String>,
        use_sequential: bool,
    ) -> Result<String, FleetError> {
        let mut inner = self.inner.lock();

        if inner.devices.len() >= MAX_DEVICES {
            return Err(FleetError::CapacityExceeded);
        }
        if !inner.catalog.contains(model) {
            return Err(FleetError::UnknownModel(model.to_string()));
        }

        let fw_version = match fw_version.filter(|v| !v.trim().is_empty()) {
            Some(v) => v,
            None => inner.catalog.default_firmware(model).unwrap_or_default(),
        };

        // priorité : adresse explicite, puis séquentielle, puis aléatoire
        let mac = match mac.filter(|m| !m.trim().is_empty()) {
            Some(explicit) => {
                if !inner.macs.reserve(&explicit) {
                    return Err(FleetError::AddressInUse(explicit));
                }
                explicit
            }
            None if use_sequential => {
                let index = inner.counter;
                inner.macs.sequential_mac(index)
            }
            None => inner.macs.random_mac(),
        };

        let device_id = format!("device_{}", inner.counter);
        inner.counter += 1;

        let device = Arc::new(DeviceSimulator::new(
            device_id.clone(),
            mac,
            model.to_string(),
            fw_version,
            self.data_interval,
            self.heartbeat_interval,
            self.factory.clone(),
        ));
        inner.devices.insert(device_id.clone(), device);
        Ok(device_id)
    }

    /// Capacité restante, pour l'admission tout-ou-rien des batchs.
    /// Même invariant que le contrôle par ajout.
    pub fn remaining_capacity(&self) -> usize {
        MAX_DEVICES.saturating_sub(self.inner.lock().devices.len())
    }

    /// Retire un device : entrée et MAC libérées sous verrou, arrêt réseau
    /// exécuté ensuite hors verrou (le teardown lent ne bloque jamais les
    /// autres mutations).
    pub async fn remove_device(&self, device_id: &str) -> Result<(), FleetError> {
        let device = {
            let mut inner = self.inner.lock();
            let device = inner
                .devices
                .shift_remove(device_id)
                .ok_or_else(|| FleetError::NotFound(format!("device {device_id}")))?;
            inner.macs.release(&device.mac);
            device
        };
        device.stop().await;
        println!("[fleet] removed {device_id}");
        Ok(())
    }

    pub async fn start_device(&self, device_id: &str) -> Result<(), FleetError> {
        let device = self.get(device_id)?;
        if device.start().await {
            Ok(())
        } else {
            Err(FleetError::ConnectionFailure)
        }
    }

    pub async fn stop_device(&self, device_id: &str) -> Result<(), FleetError> {
        let device = self.get(device_id)?;
        device.stop().await;
        Ok(())
    }

    /// Démarre toute la flotte via le pool borné. Compte uniquement les
    /// démarrages réussis dans le délai ; un échec ou un timeout est
    /// loggé et n'interrompt pas les autres.
    pub async fn start_all(&self) -> usize {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return 0;
        }

        let mut handles = Vec::with_capacity(snapshot.len());
        for device in snapshot {
            let workers = self.workers.clone();
            handles.push(task::spawn(async move {
                let _permit = match workers.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return false,
                };
                device.start().await
            }));
        }

        let mut started = 0;
        for handle in handles {
            match tokio::time::timeout(TASK_TIMEOUT, handle).await {
                Ok(Ok(true)) => started += 1,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => eprintln!("[fleet] start task failed: {e}"),
                Err(_) => eprintln!("[fleet] start task timed out"),
            }
        }
        println!("[fleet] started {started} devices");
        started
    }

    /// Arrête toute la flotte ; rend le nombre de devices tentés
    /// (l'arrêt est traité comme accompli-ou-timeout).
    pub async fn stop_all(&self) -> usize {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return 0;
        }
        let attempted = snapshot.len();
        self.stop_batch(snapshot).await;
        println!("[fleet] stopped {attempted} devices");
        attempted
    }

    /// Retire toute la flotte en deux phases : arrêt parallèle hors
    /// verrou, puis retrait sous verrou des seuls devices de
    /// l'instantané (un add concurrent n'est jamais perdu). Rend le
    /// nombre de devices de l'instantané.
    pub async fn remove_all(&self) -> usize {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return 0;
        }
        let count = snapshot.len();

        self.stop_batch(snapshot.clone()).await;

        {
            let mut inner = self.inner.lock();
            for device in &snapshot {
                inner.macs.release(&device.mac);
                inner.devices.shift_remove(&device.device_id);
            }
        }
        println!("[fleet] removed {count} devices");
        count
    }

    pub fn device_status(&self, device_id: &str) -> Result<DeviceStatus, FleetError> {
        Ok(self.get(device_id)?.status())
    }

    /// Instantané de membership sous verrou, statuts construits hors
    /// verrou (les lectures des devices sont synchronisées de leur côté).
    pub fn all_status(&self) -> Vec<DeviceStatus> {
        self.snapshot().iter().map(|d| d.status()).collect()
    }

    pub fn paginated_status(&self, page: usize, page_size: usize) -> PageView {
        paginate(self.all_status(), page, page_size)
    }

    // ---- catalogue de modèles (mutations sous le même verrou de flotte) ----

    pub fn supported_models(&self) -> ModelsMap {
        self.inner.lock().catalog.snapshot()
    }

    pub fn add_model(&self, model: &str, fw_version: &str) -> Result<(), FleetError> {
        let model = model.trim();
        let fw_version = fw_version.trim();
        if model.is_empty() {
            return Err(FleetError::InvalidInput("model must not be empty".into()));
        }
        if fw_version.is_empty() {
            return Err(FleetError::InvalidInput("fw_version must not be empty".into()));
        }

        let mut inner = self.inner.lock();
        inner.catalog.insert(model.to_string(), fw_version.to_string());
        persist(&inner.catalog);
        Ok(())
    }

    /// Refuse de retirer un modèle encore référencé par un device vivant
    /// (intégrité référentielle du catalogue).
    pub fn remove_model(&self, model: &str) -> Result<(), FleetError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(FleetError::InvalidInput("model must not be empty".into()));
        }

        let mut inner = self.inner.lock();
        if !inner.catalog.contains(model) {
            return Err(FleetError::NotFound(format!("model {model}")));
        }
        if inner.devices.values().any(|d| d.model == model) {
            return Err(FleetError::ModelInUse(model.to_string()));
        }
        inner.catalog.remove(model);
        persist(&inner.catalog);
        Ok(())
    }

    /// Remplace tout le catalogue, sauf si l'import abandonnerait un
    /// modèle encore utilisé (les modèles manquants sont nommés, triés).
    pub fn import_models(&self, models: ModelsMap) -> Result<(), FleetError> {
        let mut inner = self.inner.lock();

        let mut missing: Vec<String> = inner
            .devices
            .values()
            .map(|d| d.model.clone())
            .filter(|m| !models.contains_key(m))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if !missing.is_empty() {
            return Err(FleetError::ModelInUse(missing.join(", ")));
        }

        inner.catalog.replace(models);
        persist(&inner.catalog);
        Ok(())
    }

    // ---- helpers ----

    fn get(&self, device_id: &str) -> Result<Arc<DeviceSimulator>, FleetError> {
        self.inner
            .lock()
            .devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| FleetError::NotFound(format!("device {device_id}")))
    }

    fn snapshot(&self) -> Vec<Arc<DeviceSimulator>> {
        self.inner.lock().devices.values().cloned().collect()
    }

    async fn stop_batch(&self, devices: Vec<Arc<DeviceSimulator>>) {
        let mut handles = Vec::with_capacity(devices.len());
        for device in devices {
            let workers = self.workers.clone();
            handles.push(task::spawn(async move {
                let _permit = match workers.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                device.stop().await;
            }));
        }
        for handle in handles {
            match tokio::time::timeout(TASK_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("[fleet] stop task failed: {e}"),
                Err(_) => eprintln!("[fleet] stop task timed out"),
            }
        }
    }
}

fn persist(catalog: &ModelCatalog) {
    if let Err(e) = catalog.save() {
        eprintln!("[fleet] failed to persist model catalog: {e}");
    }
}
