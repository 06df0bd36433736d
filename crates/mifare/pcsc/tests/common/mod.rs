//! Common test utilities

use nexum_mifare_transport_pcsc::{PcscDeviceManager, PcscPcd, PcscReader};

/// Try to get the first real reader for tests
pub fn get_reader() -> Option<PcscReader> {
    let manager = PcscDeviceManager::new().ok()?;
    manager.list_readers().ok()?.into_iter().next()
}

/// Try to get a reader with a card in the field
pub fn get_reader_with_card() -> Option<PcscReader> {
    let manager = PcscDeviceManager::new().ok()?;
    manager
        .list_readers()
        .ok()?
        .into_iter()
        .find(PcscReader::has_card)
}

/// Try to open a backend on a reader with a card in the field
pub fn get_test_pcd() -> Option<PcscPcd> {
    let manager = PcscDeviceManager::new().ok()?;
    let reader = get_reader_with_card()?;
    manager.open_reader(reader.name()).ok()
}
