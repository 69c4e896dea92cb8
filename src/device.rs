/**
 * DEVICE SIMULATOR - Un device ZP simulé, autonome une fois démarré
 *
 * RÔLE : Possède sa session broker et deux senders périodiques
 * (télémétrie, heartbeat). Expose start/stop et un instantané de statut.
 *
 * CYCLE DE VIE : créé Idle par le gestionnaire, running après start(),
 * stoppé par stop(). L'arrêt est coopératif : les senders relisent le
 * drapeau `running` à chaque réveil, la sortie peut donc prendre jusqu'à
 * intervalle + 10 s (best-effort assumé, pas de latence bornée).
 */

use crate::mqtt::{LinkConfig, LinkFlags, MqttSession, SessionFactory};
use crate::payload;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

/// Instantané de statut, copie par valeur lisible sans synchronisation.
/// Les drapeaux sont lus champ par champ (last-write-wins) : le statut
/// est consultatif, jamais utilisé pour garantir un invariant.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub mac: String,
    pub model: String,
    pub fw_version: String,
    pub running: bool,
    pub connected: bool,
    pub topic: String,
}

enum SenderKind {
    Data,
    Heartbeat,
}

pub struct DeviceSimulator {
    pub device_id: String,
    pub mac: String,
    pub model: String,
    pub fw_version: String,
    pub topic: String,
    data_interval: u64,
    heartbeat_interval: u64,
    factory: Arc<dyn SessionFactory>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Arc<dyn MqttSession>>>,
}

impl DeviceSimulator {
    pub fn new(
        device_id: String,
        mac: String,
        model: String,
        fw_version: String,
        data_interval: u64,
        heartbeat_interval: u64,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        let topic = payload::device_topic(&mac);
        Self {
            device_id,
            mac,
            model,
            fw_version,
            topic,
            data_interval,
            heartbeat_interval,
            factory,
            running: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Démarre le device : connexion broker puis senders périodiques.
    /// Rend false si déjà démarré ou si la connexion initiale échoue ;
    /// l'échec est loggé, jamais propagé. Une perte de connexion
    /// ultérieure n'est visible que via `connected=false`.
    pub async fn start(&self) -> bool {
        // swap réserve le démarrage : deux start() concurrents ne peuvent
        // pas ouvrir deux sessions
        if self.running.swap(true, Ordering::Relaxed) {
            return false;
        }

        let cfg = LinkConfig {
            client_id: format!("device_{}", self.mac),
            topic: self.topic.clone(),
            version_payload: payload::version_info(&self.model, &self.fw_version),
        };
        let flags = LinkFlags {
            running: self.running.clone(),
            connected: self.connected.clone(),
        };

        match self.factory.open(cfg, flags).await {
            Ok(session) => {
                *self.session.lock() = Some(session.clone());
                self.spawn_sender(session.clone(), self.data_interval, SenderKind::Data);
                self.spawn_sender(session, self.heartbeat_interval, SenderKind::Heartbeat);
                println!("[device] {} ({}) started", self.device_id, self.mac);
                true
            }
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                eprintln!("[device] {} start failed: {e}", self.device_id);
                false
            }
        }
    }

    /// Arrête le device. Idempotent. Flipper `running` est le seul signal
    /// d'arrêt des senders ; la session est fermée immédiatement.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = session.disconnect().await {
                eprintln!("[device] {} disconnect failed: {e}", self.device_id);
            }
        }
        println!("[device] {} ({}) stopped", self.device_id, self.mac);
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            device_id: self.device_id.clone(),
            mac: self.mac.clone(),
            model: self.model.clone(),
            fw_version: self.fw_version.clone(),
            running: self.running.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
            topic: self.topic.clone(),
        }
    }

    /// Sender périodique : dort intervalle + gigue uniforme [0,10) s puis
    /// publie seulement si toujours running ET connected. Ne se relance
    /// jamais de lui-même.
    fn spawn_sender(&self, session: Arc<dyn MqttSession>, interval: u64, kind: SenderKind) {
        let running = self.running.clone();
        let connected = self.connected.clone();
        let topic = self.topic.clone();
        task::spawn(async move {
            while running.load(Ordering::Relaxed) {
                let jitter = rand::thread_rng().gen_range(0.0..10.0);
                tokio::time::sleep(Duration::from_secs_f64(interval as f64 + jitter)).await;
                if running.load(Ordering::Relaxed) && connected.load(Ordering::Relaxed) {
                    let body = match kind {
                        SenderKind::Data => payload::sensor_data(),
                        SenderKind::Heartbeat => payload::heartbeat(),
                    };
                    if let Err(e) = session.publish(&topic, body).await {
                        eprintln!("[device] publish failed on {topic}: {e}");
                    }
                }
            }
        });
    }
}
