/// Key layout for the observation partitions
///
/// - `cells`: cell:{radio}:{mcc}:{mnc}:{lac}:{cid}:{id} -> CellObservation (JSON)
/// - `wifis`: wifi:{key}:{id} -> WifiObservation (JSON)
///
/// `id` is a v7 UUID so rows for one station sort by insertion time.
use uuid::Uuid;

use crate::submission::CellKey;

/// Encode a cell row key
pub fn encode_cell_key(cell: &CellKey, id: Uuid) -> Vec<u8> {
    let mut key = encode_cell_prefix(cell);
    key.extend_from_slice(id.as_simple().to_string().as_bytes());
    key
}

/// Prefix shared by every row of one cell: cell:{radio}:{mcc}:{mnc}:{lac}:{cid}:
pub fn encode_cell_prefix(cell: &CellKey) -> Vec<u8> {
    format!(
        "cell:{}:{}:{}:{}:{}:",
        cell.radio, cell.mcc, cell.mnc, cell.lac, cell.cid
    )
    .into_bytes()
}

/// Encode a wifi row key
pub fn encode_wifi_key(wifi_key: &str, id: Uuid) -> Vec<u8> {
    let mut key = encode_wifi_prefix(wifi_key);
    key.extend_from_slice(id.as_simple().to_string().as_bytes());
    key
}

/// Prefix shared by every row of one access point: wifi:{key}:
pub fn encode_wifi_prefix(wifi_key: &str) -> Vec<u8> {
    format!("wifi:{}:", wifi_key).into_bytes()
}
