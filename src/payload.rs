//! Trames publiées par les devices simulés. Formats figés côté firmware,
//! repris tels quels : seuls les champs aléatoires varient.

use rand::Rng;
use serde_json::json;

pub const HW_VERSION: &str = "V2";
pub const TOPIC_PREFIX: &str = "ZP2";

/// Topic de publication dérivé de l'adresse MAC.
pub fn device_topic(mac: &str) -> String {
    format!("{TOPIC_PREFIX}/{mac}/data")
}

/// Trame d'identification, envoyée une fois à chaque connexion réussie.
/// Le firmware ZP2 se présente comme "ZP25" sur le fil.
pub fn version_info(model: &str, fw_version: &str) -> String {
    let reported = if model == "ZP2" { "ZP25" } else { model };
    json!({
        "MODEL": reported,
        "FW": fw_version,
        "HW": HW_VERSION,
        "WE310F5": "39.00.008",
        "P750": "V8",
        "SADDR": "10",
        "SWTYPE": "0"
    })
    .to_string()
}

/// Trame de télémétrie capteurs, valeurs tirées dans les plages du
/// matériel réel.
pub fn sensor_data() -> String {
    let mut rng = rand::thread_rng();
    json!({
        "data": {
            "ts": 0,
            "t": round2(rng.gen_range(20.0..30.0)),
            "h": round2(rng.gen_range(40.0..80.0)),
            "ct": round2(rng.gen_range(20.0..35.0)),
            "ch": round2(rng.gen_range(50.0..70.0)),
            "p1": 0,
            "p25": 0,
            "p10": 0,
            "v": rng.gen_range(50..=60),
            "vl": 0,
            "c": rng.gen_range(900..=1000),
            "ec": rng.gen_range(450..=550),
            "rs": rng.gen_range(-50..=-40),
            "lv": 0
        },
        "data1": {
            "P750": rng.gen_range(1..=10),
            "AHT25": 1,
            "SCD4x": 1,
            "op": 1,
            "rset": 500,
            "speed": 0,
            "alarm": 0,
            "rpm": rng.gen_range(500..=700),
            "sa": 10
        }
    })
    .to_string()
}

pub fn heartbeat() -> String {
    json!({"Heartbeat": "1"}).to_string()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zp2_reports_itself_as_zp25() {
        let payload: serde_json::Value = serde_json::from_str(&version_info("ZP2", "T251107-S1")).unwrap();
        assert_eq!(payload["MODEL"], "ZP25");
        assert_eq!(payload["FW"], "T251107-S1");
        assert_eq!(payload["HW"], "V2");
    }

    #[test]
    fn other_models_report_their_own_name() {
        let payload: serde_json::Value = serde_json::from_str(&version_info("ZP7", "T000001-S1")).unwrap();
        assert_eq!(payload["MODEL"], "ZP7");
    }

    #[test]
    fn sensor_data_stays_in_hardware_ranges() {
        for _ in 0..20 {
            let payload: serde_json::Value = serde_json::from_str(&sensor_data()).unwrap();
            let t = payload["data"]["t"].as_f64().unwrap();
            assert!((20.0..=30.0).contains(&t));
            let v = payload["data"]["v"].as_i64().unwrap();
            assert!((50..=60).contains(&v));
            let rs = payload["data"]["rs"].as_i64().unwrap();
            assert!((-50..=-40).contains(&rs));
            let rpm = payload["data1"]["rpm"].as_i64().unwrap();
            assert!((500..=700).contains(&rpm));
        }
    }

    #[test]
    fn heartbeat_is_fixed() {
        assert_eq!(heartbeat(), r#"{"Heartbeat":"1"}"#);
    }

    #[test]
    fn topic_derives_from_mac() {
        assert_eq!(device_topic("aabbccddeeff"), "ZP2/aabbccddeeff/data");
    }
}
