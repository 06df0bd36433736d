use nexum_mifare_transport_pcsc::{
    ConnectStrategy, PcscConfig, PcscDeviceManager, PcscError, PcscPcd,
};

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    let readers = manager.list_readers()?;

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = match (reader.has_card(), reader.picc_type()) {
            (true, Some(picc_type)) => format!("card present: {picc_type}"),
            (true, None) => "card present".to_string(),
            (false, _) => "no card".to_string(),
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}

/// Strategies tried in order when opening a reader
fn strategies(reader_name: Option<&str>) -> Vec<ConnectStrategy> {
    match reader_name {
        Some(name) => vec![ConnectStrategy::Reader(name.to_string())],
        None => vec![ConnectStrategy::AnyCard, ConnectStrategy::FirstAvailable],
    }
}

/// Open the named reader, or else a reader holding a card, or else the first reader
///
/// The reader does not need a card yet: the session waits for one.
pub fn open_reader(
    manager: &PcscDeviceManager,
    reader_name: Option<&str>,
) -> Result<PcscPcd, Box<dyn std::error::Error>> {
    let mut last_error = PcscError::NoReadersAvailable;
    for strategy in strategies(reader_name) {
        match manager.connect_strategy(strategy, PcscConfig::default()) {
            Ok(pcd) => return Ok(pcd),
            Err(e @ PcscError::NoCard(_)) => last_error = e,
            Err(e) => return Err(e.into()),
        }
    }
    Err(last_error.into())
}
