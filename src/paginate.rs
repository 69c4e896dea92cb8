use crate::device::DeviceStatus;
use crate::fleet::MAX_DEVICES;
use serde::Serialize;

/// Une page de statuts : fenêtre déterministe sur un instantané pris à un
/// instant donné (ordre d'insertion de la flotte). Ne peut pas échouer.
#[derive(Debug, Serialize)]
pub struct PageView {
    pub devices: Vec<DeviceStatus>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub max_devices: usize,
}

/// Fenêtrage pur : `page_size` ramené dans [1,100], `page` ramené dans
/// [1, max(total_pages,1)]. Un instantané vide donne une page vide bien
/// formée.
pub fn paginate(snapshot: Vec<DeviceStatus>, page: usize, page_size: usize) -> PageView {
    let page_size = page_size.clamp(1, 100);
    let total = snapshot.len();
    let total_pages = total.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);
    let devices = if start >= total {
        Vec::new()
    } else {
        snapshot[start..end].to_vec()
    };

    PageView {
        devices,
        total,
        page,
        page_size,
        total_pages,
        max_devices: MAX_DEVICES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(n: usize) -> Vec<DeviceStatus> {
        (0..n)
            .map(|i| DeviceStatus {
                device_id: format!("device_{i}"),
                mac: format!("4802af{i:06x}"),
                model: "ZP2".into(),
                fw_version: "T251107-S1".into(),
                running: false,
                connected: false,
                topic: format!("ZP2/4802af{i:06x}/data"),
            })
            .collect()
    }

    #[test]
    fn empty_snapshot_gives_well_formed_page() {
        let page = paginate(Vec::new(), 1, 50);
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
        assert!(page.devices.is_empty());
        assert_eq!(page.max_devices, MAX_DEVICES);
    }

    #[test]
    fn pages_concatenate_to_full_snapshot_in_order() {
        let all = statuses(23);
        let mut collected = Vec::new();
        for p in 1..=5 {
            let page = paginate(all.clone(), p, 5);
            assert!(page.devices.len() <= 5);
            collected.extend(page.devices.into_iter().map(|d| d.device_id));
        }
        let expected: Vec<String> = all.iter().map(|d| d.device_id.clone()).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn total_pages_is_ceiling_division() {
        assert_eq!(paginate(statuses(23), 1, 5).total_pages, 5);
        assert_eq!(paginate(statuses(20), 1, 5).total_pages, 4);
        assert_eq!(paginate(statuses(1), 1, 50).total_pages, 1);
    }

    #[test]
    fn out_of_range_page_is_clamped() {
        let page = paginate(statuses(10), 99, 5);
        assert_eq!(page.page, 2);
        assert_eq!(page.devices[0].device_id, "device_5");

        let page = paginate(statuses(10), 0, 5);
        assert_eq!(page.page, 1);
        assert_eq!(page.devices[0].device_id, "device_0");
    }

    #[test]
    fn page_size_is_clamped_to_bounds() {
        let page = paginate(statuses(10), 1, 0);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.devices.len(), 1);

        let page = paginate(statuses(10), 1, 10_000);
        assert_eq!(page.page_size, 100);
        assert_eq!(page.devices.len(), 10);
    }
}
