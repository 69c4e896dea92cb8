/**
 * ZPSIM - Simulateur de flotte de devices MQTT famille ZP
 *
 * RÔLE : Point d'entrée. Bootstrap config (.env), catalogue persisté,
 * gestionnaire de flotte, puis serveur HTTP de pilotage.
 *
 * ARCHITECTURE : un gestionnaire central (verrou de flotte unique) +
 * une session MQTT et deux senders périodiques par device + pool borné
 * pour les opérations bulk. API REST axum comme seule surface de
 * commande.
 */

mod catalog;
mod config;
mod device;
mod error;
mod fleet;
mod http;
mod ident;
mod mqtt;
mod paginate;
mod payload;

use crate::config::load_config;
use crate::fleet::FleetManager;
use crate::http::AppState;
use crate::mqtt::RumqttFactory;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // variables d'environnement depuis .env (ok si absent)
    dotenvy::dotenv().ok();

    let cfg = load_config();
    println!("[kernel] broker mqtt://{}:{}", cfg.mqtt.broker, cfg.mqtt.port);

    let factory = Arc::new(RumqttFactory::new(&cfg.mqtt));
    let manager = Arc::new(FleetManager::new(&cfg, factory));

    let app = http::build_router(AppState { manager });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.web_port));
    println!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
