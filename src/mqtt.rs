/**
 * MQTT LINK - Capacité de connexion broker des devices simulés
 *
 * RÔLE : Isole rumqttc derrière une paire de traits (SessionFactory /
 * MqttSession) pour que la flotte et les devices restent testables sans
 * broker (mock en mémoire, même esprit qu'un stub de client MQTT).
 *
 * FONCTIONNEMENT : open() joue le rôle d'un connect() bloquant avec
 * timeout (premier poll de l'event loop), puis une task indépendante
 * par device continue de dépiler les événements : ConnAck -> connected,
 * perte de connexion -> disconnected + retry de rumqttc en dessous.
 * La trame de version est republiée à chaque (re)connexion.
 */

use crate::config::MqttConf;
use anyhow::Result;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

/// Drapeaux d'état partagés entre un device et sa session broker.
/// `connected` est basculé de façon asynchrone par la boucle d'événements.
#[derive(Clone)]
pub struct LinkFlags {
    pub running: Arc<AtomicBool>,
    pub connected: Arc<AtomicBool>,
}

/// Paramètres d'ouverture d'une session.
#[derive(Clone)]
pub struct LinkConfig {
    pub client_id: String,
    pub topic: String,
    pub version_payload: String,
}

#[async_trait]
pub trait MqttSession: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Ouvre une session broker. L'échec de la connexion initiale est
    /// renvoyé à l'appelant ; les échecs ultérieurs ne sont observables
    /// que via `flags.connected`.
    async fn open(&self, cfg: LinkConfig, flags: LinkFlags) -> Result<Arc<dyn MqttSession>>;
}

pub struct RumqttFactory {
    broker: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
}

impl RumqttFactory {
    pub fn new(conf: &MqttConf) -> Self {
        Self {
            broker: conf.broker.clone(),
            port: conf.port,
            username: conf.username.clone(),
            password: conf.password.clone(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

struct RumqttSession {
    client: AsyncClient,
}

#[async_trait]
impl MqttSession for RumqttSession {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.client.publish(topic, QoS::AtMostOnce, false, payload).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for RumqttFactory {
    async fn open(&self, cfg: LinkConfig, flags: LinkFlags) -> Result<Arc<dyn MqttSession>> {
        let mut opts = MqttOptions::new(&cfg.client_id, &self.broker, self.port);
        opts.set_keep_alive(Duration::from_secs(15));
        if !self.username.is_empty() {
            opts.set_credentials(&self.username, &self.password);
        }
        let (client, mut eventloop) = AsyncClient::new(opts, 10);

        // Connexion initiale traitée comme un connect() bloquant avec
        // timeout : premier poll de l'event loop.
        match tokio::time::timeout(self.connect_timeout, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Incoming::ConnAck(_)))) => {
                flags.connected.store(true, Ordering::Relaxed);
                if let Err(e) = client
                    .publish(&cfg.topic, QoS::AtMostOnce, false, cfg.version_payload.clone())
                    .await
                {
                    eprintln!("[mqtt] {} version info publish failed: {e}", cfg.client_id);
                }
            }
            Ok(Ok(_)) => {} // autre événement, le ConnAck suivra dans la boucle
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(anyhow::anyhow!(
                    "connect timeout to {}:{}",
                    self.broker,
                    self.port
                ))
            }
        }

        let loop_client = client.clone();
        task::spawn(run_event_loop(eventloop, loop_client, cfg, flags));

        Ok(Arc::new(RumqttSession { client }))
    }
}

/// Boucle d'événements d'une session : tient à jour `connected` et
/// republie la trame de version à chaque reconnexion. Sort quand le
/// device n'est plus `running`.
async fn run_event_loop(mut eventloop: EventLoop, client: AsyncClient, cfg: LinkConfig, flags: LinkFlags) {
    loop {
        if !flags.running.load(Ordering::Relaxed) {
            break;
        }
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                flags.connected.store(true, Ordering::Relaxed);
                if let Err(e) = client
                    .publish(&cfg.topic, QoS::AtMostOnce, false, cfg.version_payload.clone())
                    .await
                {
                    eprintln!("[mqtt] {} version info publish failed: {e}", cfg.client_id);
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                flags.connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                flags.connected.store(false, Ordering::Relaxed);
                if !flags.running.load(Ordering::Relaxed) {
                    break;
                }
                eprintln!("[mqtt] {} connection error: {e}", cfg.client_id);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    flags.connected.store(false, Ordering::Relaxed);
}
