use rand::Rng;
use std::collections::HashSet;

/// Préfixe constructeur des adresses séquentielles.
pub const SEQUENTIAL_PREFIX: &str = "4802af";

/// Allocateur d'adresses MAC de la flotte. Possédé par l'état interne du
/// gestionnaire : vérification et réservation se font donc atomiquement
/// sous le verrou de flotte.
#[derive(Debug, Default)]
pub struct MacAllocator {
    used: HashSet<String>,
}

impl MacAllocator {
    pub fn new() -> Self {
        Self { used: HashSet::new() }
    }

    /// MAC aléatoire (12 caractères hexadécimaux), retirée jusqu'à
    /// absence de collision puis réservée.
    pub fn random_mac(&mut self) -> String {
        loop {
            let bytes: [u8; 6] = rand::thread_rng().gen();
            let mac: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            if self.used.insert(mac.clone()) {
                return mac;
            }
        }
    }

    /// MAC séquentielle : préfixe fixe + index sur 6 chiffres hexadécimaux.
    /// Si le créneau est déjà pris (adresse explicite posée auparavant),
    /// repli sur une MAC aléatoire.
    pub fn sequential_mac(&mut self, index: u64) -> String {
        let mac = format!("{SEQUENTIAL_PREFIX}{index:06x}");
        if self.used.insert(mac.clone()) {
            mac
        } else {
            self.random_mac()
        }
    }

    /// Réserve une adresse explicite ; false si déjà prise.
    pub fn reserve(&mut self, mac: &str) -> bool {
        self.used.insert(mac.to_string())
    }

    /// Libère une adresse lors du retrait du device propriétaire.
    pub fn release(&mut self, mac: &str) {
        self.used.remove(mac);
    }

    pub fn is_used(&self, mac: &str) -> bool {
        self.used.contains(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_macs_are_unique_and_well_formed() {
        let mut alloc = MacAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let mac = alloc.random_mac();
            assert_eq!(mac.len(), 12);
            assert!(mac.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            assert!(seen.insert(mac));
        }
    }

    #[test]
    fn sequential_mac_is_deterministic() {
        let mut alloc = MacAllocator::new();
        assert_eq!(alloc.sequential_mac(0), "4802af000000");
        assert_eq!(alloc.sequential_mac(255), "4802af0000ff");
        assert!(alloc.is_used("4802af000000"));
    }

    #[test]
    fn sequential_collision_falls_back_to_random() {
        let mut alloc = MacAllocator::new();
        assert!(alloc.reserve("4802af000003"));
        let mac = alloc.sequential_mac(3);
        assert_ne!(mac, "4802af000003");
        assert_eq!(mac.len(), 12);
    }

    #[test]
    fn release_makes_address_reusable() {
        let mut alloc = MacAllocator::new();
        assert!(alloc.reserve("aabbccddeeff"));
        assert!(!alloc.reserve("aabbccddeeff"));
        alloc.release("aabbccddeeff");
        assert!(alloc.reserve("aabbccddeeff"));
    }
}
