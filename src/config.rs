use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub mqtt: MqttConf,
    pub web_port: u16,
    pub model_store_path: String,
    pub data_interval: u64,
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone)]
pub struct MqttConf {
    pub broker: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf {
                broker: "localhost".into(),
                port: 1883,
                username: String::new(),
                password: String::new(),
            },
            web_port: 5000,
            model_store_path: "./data/models.json".into(),
            data_interval: 60,
            heartbeat_interval: 60,
        }
    }
}

/// Charge la configuration depuis l'environnement (après dotenvy).
/// Toute valeur absente ou invalide retombe sur le défaut, jamais de panique.
pub fn load_config() -> SimConfig {
    let defaults = SimConfig::default();
    SimConfig {
        mqtt: MqttConf {
            broker: env_or("MQTT_BROKER", defaults.mqtt.broker),
            port: env_parse("MQTT_PORT", defaults.mqtt.port),
            username: env_or("MQTT_USERNAME", defaults.mqtt.username),
            password: env_or("MQTT_PASSWORD", defaults.mqtt.password),
        },
        web_port: env_parse("WEB_PORT", defaults.web_port),
        model_store_path: env_or("MODEL_STORE_PATH", defaults.model_store_path),
        data_interval: env_parse("DATA_INTERVAL", defaults.data_interval),
        heartbeat_interval: env_parse("HEARTBEAT_INTERVAL", defaults.heartbeat_interval),
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("[config] invalid value for {key}: {raw}, using default");
            default
        }),
        Err(_) => default,
    }
}
