use serde_json::{Map, Value};

use super::error::{InvalidEntry, InvalidReport, Result, malformed};
use super::models::{CellEntry, Report, SubmissionBatch, WifiEntry};
use super::rules::{self, CELL_FIELDS, Field, Fields, POSITION_FIELDS, WIFI_FIELDS};

/// Validate the structure of a decoded batch.
///
/// Fails only on structural problems (top level not an object, `items`
/// missing or not an array, an item not an object, a non-array entry list,
/// non-numeric coordinates). Bad reports and entries are kept as skip
/// markers so the rest of the batch still goes through.
pub fn validate_batch(raw: &Value) -> Result<SubmissionBatch> {
    let object = raw
        .as_object()
        .ok_or_else(|| malformed("batch must be a JSON object"))?;

    let items = object
        .get("items")
        .ok_or_else(|| malformed("items is required"))?
        .as_array()
        .ok_or_else(|| malformed("items must be an array"))?;

    let reports = items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_report(index, item))
        .collect::<Result<Vec<_>>>()?;

    Ok(SubmissionBatch {
        item_count: items.len(),
        reports,
    })
}

fn validate_report(
    index: usize,
    item: &Value,
) -> Result<std::result::Result<Report, InvalidReport>> {
    let object = item
        .as_object()
        .ok_or_else(|| malformed(format!("items[{index}] must be an object")))?;

    let cells = entry_list(object, "cellTowers", index)?;
    let wifis = entry_list(object, "wifiAccessPoints", index)?;

    let fields = rules::resolve(object, POSITION_FIELDS);
    let latitude = coordinate(&fields, "latitude", index)?;
    let longitude = coordinate(&fields, "longitude", index)?;

    let (latitude, longitude) = match (latitude, longitude) {
        (Ok(latitude), Ok(longitude)) => (latitude, longitude),
        (Err(reason), _) | (_, Err(reason)) => return Ok(Err(reason)),
    };

    Ok(Ok(Report {
        latitude,
        longitude,
        accuracy: fields.int("accuracy"),
        altitude: fields.int("altitude"),
        altitude_accuracy: fields.int("altitude_accuracy"),
        age: fields.opt_int("age"),
        heading: fields.float("heading"),
        pressure: fields.opt_float("pressure"),
        speed: fields.float("speed"),
        source: fields.text("source").unwrap_or_default(),
        timestamp: fields.int("timestamp"),
        radio_type: fields.radio("radio_type"),
        cell_towers: cells.iter().map(validate_cell).collect(),
        wifi_access_points: wifis.iter().map(validate_wifi).collect(),
    }))
}

/// An absent entry list is empty; a present one must be an array.
fn entry_list<'a>(
    object: &'a Map<String, Value>,
    name: &str,
    index: usize,
) -> Result<&'a [Value]> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(entries)) => Ok(entries.as_slice()),
        Some(_) => Err(malformed(format!("items[{index}].{name} must be an array"))),
    }
}

fn coordinate(
    fields: &Fields,
    name: &str,
    index: usize,
) -> Result<std::result::Result<f64, InvalidReport>> {
    match fields.state(name) {
        Field::Value(_) => Ok(Ok(fields.float(name))),
        Field::Absent => Ok(Err(InvalidReport::MissingPosition)),
        Field::OutOfRange => Ok(Err(InvalidReport::OutOfBounds)),
        Field::WrongType => Err(malformed(format!("items[{index}].{name} must be a number"))),
    }
}

fn validate_cell(value: &Value) -> std::result::Result<CellEntry, InvalidEntry> {
    let object = value.as_object().ok_or(InvalidEntry::NotAnObject)?;
    let fields = rules::resolve(object, CELL_FIELDS);

    // Identifying fields are range-checked by the rule table, so the
    // narrowing casts below cannot truncate.
    Ok(CellEntry {
        radio_type: fields.opt_radio("radio_type")?,
        mcc: fields.require_int("mcc")? as u16,
        mnc: fields.require_int("mnc")? as u16,
        lac: fields.require_int("lac")? as u32,
        cid: fields.require_int("cid")? as u32,
        age: fields.int("age"),
        asu: fields.int("asu"),
        psc: fields.int("psc"),
        serving: fields.flag("serving"),
        signal_strength: fields.int("signal"),
        timing_advance: fields.int("ta"),
    })
}

fn validate_wifi(value: &Value) -> std::result::Result<WifiEntry, InvalidEntry> {
    let object = value.as_object().ok_or(InvalidEntry::NotAnObject)?;
    let fields = rules::resolve(object, WIFI_FIELDS);

    Ok(WifiEntry {
        mac_address: fields.require_text("mac")?,
        radio_type: fields.text("radio_type"),
        age: fields.int("age"),
        channel: fields.int("channel"),
        frequency: fields.int("frequency"),
        signal_to_noise_ratio: fields.int("snr"),
        signal_strength: fields.int("signal"),
    })
}
