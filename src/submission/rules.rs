//! Canonicalization rules
//!
//! Each entry kind (report position, cell, wifi) has one declarative table of
//! [`FieldRule`]s keyed by canonical field name. A rule lists the source names
//! accepted across submission dialects, how the raw JSON value is coerced, the
//! sentinel used when the field is absent and an optional inclusive range.
//! [`resolve`] evaluates a table once against a JSON object.

use serde_json::{Map, Value};

use super::error::InvalidEntry;
use super::models::Radio;

pub const MAX_CID_SHORT: u32 = 65_535;

/// Radio type as submitted, before aliasing and inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRadio {
    Name(String),
    Code(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Integer,
    /// Float input rounded half away from zero.
    RoundedInteger,
    Float,
    Text,
    Flag,
    Radio,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentinel {
    /// No substitute; the caller decides what absence means.
    Required,
    /// Optional without a sentinel literal.
    Absent,
    Int(i64),
    Float(f64),
    Text(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub sources: &'static [&'static str],
    pub coercion: Coercion,
    pub missing: Sentinel,
    pub range: Option<(f64, f64)>,
}

const fn field(
    name: &'static str,
    sources: &'static [&'static str],
    coercion: Coercion,
    missing: Sentinel,
    range: Option<(f64, f64)>,
) -> FieldRule {
    FieldRule {
        name,
        sources,
        coercion,
        missing,
        range,
    }
}

const NON_NEGATIVE: Option<(f64, f64)> = Some((0.0, f64::INFINITY));
const SIGNAL_DBM: Option<(f64, f64)> = Some((-150.0, -1.0));

pub const POSITION_FIELDS: &[FieldRule] = &[
    field("latitude", &["latitude"], Coercion::Float, Sentinel::Required, Some((-90.0, 90.0))),
    field("longitude", &["longitude"], Coercion::Float, Sentinel::Required, Some((-180.0, 180.0))),
    field("accuracy", &["accuracy"], Coercion::RoundedInteger, Sentinel::Int(0), NON_NEGATIVE),
    field("altitude", &["altitude"], Coercion::RoundedInteger, Sentinel::Int(0), None),
    field(
        "altitude_accuracy",
        &["altitudeAccuracy"],
        Coercion::RoundedInteger,
        Sentinel::Int(0),
        NON_NEGATIVE,
    ),
    field("age", &["age"], Coercion::Integer, Sentinel::Absent, None),
    field("heading", &["heading"], Coercion::Float, Sentinel::Float(-1.0), Some((0.0, 360.0))),
    field("pressure", &["pressure"], Coercion::Float, Sentinel::Absent, None),
    field("speed", &["speed"], Coercion::Float, Sentinel::Float(-1.0), NON_NEGATIVE),
    field("source", &["source"], Coercion::Text, Sentinel::Text("gps"), None),
    field("timestamp", &["timestamp"], Coercion::Integer, Sentinel::Int(0), None),
    field("radio_type", &["radioType"], Coercion::Radio, Sentinel::Absent, None),
];

pub const CELL_FIELDS: &[FieldRule] = &[
    field("radio_type", &["radioType"], Coercion::Radio, Sentinel::Absent, None),
    field("mcc", &["mobileCountryCode"], Coercion::Integer, Sentinel::Required, Some((1.0, 999.0))),
    field("mnc", &["mobileNetworkCode"], Coercion::Integer, Sentinel::Required, Some((0.0, 999.0))),
    field(
        "lac",
        &["locationAreaCode"],
        Coercion::Integer,
        Sentinel::Required,
        Some((1.0, 65_535.0)),
    ),
    field(
        "cid",
        &["cellId"],
        Coercion::Integer,
        Sentinel::Required,
        Some((1.0, 268_435_455.0)),
    ),
    field("age", &["age"], Coercion::Integer, Sentinel::Int(0), None),
    field("asu", &["asu"], Coercion::Integer, Sentinel::Int(-1), Some((-5.0, 99.0))),
    field(
        "psc",
        &["primaryScramblingCode", "psc"],
        Coercion::Integer,
        Sentinel::Int(-1),
        Some((0.0, 511.0)),
    ),
    field("serving", &["serving"], Coercion::Flag, Sentinel::Absent, None),
    field("signal", &["signalStrength"], Coercion::Integer, Sentinel::Int(0), SIGNAL_DBM),
    field("ta", &["timingAdvance"], Coercion::Integer, Sentinel::Int(0), Some((0.0, 63.0))),
];

pub const WIFI_FIELDS: &[FieldRule] = &[
    field("mac", &["macAddress"], Coercion::Text, Sentinel::Required, None),
    field("radio_type", &["radioType"], Coercion::Text, Sentinel::Absent, None),
    field("age", &["age"], Coercion::Integer, Sentinel::Int(0), None),
    field("channel", &["channel"], Coercion::Integer, Sentinel::Int(0), Some((1.0, 196.0))),
    field("frequency", &["frequency"], Coercion::Integer, Sentinel::Int(0), Some((1.0, 99_999.0))),
    field("snr", &["signalToNoiseRatio"], Coercion::Integer, Sentinel::Int(0), Some((1.0, 100.0))),
    field("signal", &["signalStrength"], Coercion::Integer, Sentinel::Int(0), SIGNAL_DBM),
];

/// Android `TelephonyManager` network type codes sent by legacy clients.
const LEGACY_RADIO_CODES: &[(i64, Radio)] = &[
    (1, Radio::Gsm),
    (2, Radio::Gsm),
    (16, Radio::Gsm),
    (4, Radio::Cdma),
    (5, Radio::Cdma),
    (6, Radio::Cdma),
    (7, Radio::Cdma),
    (12, Radio::Cdma),
    (14, Radio::Cdma),
    (3, Radio::Wcdma),
    (8, Radio::Wcdma),
    (9, Radio::Wcdma),
    (10, Radio::Wcdma),
    (15, Radio::Wcdma),
    (17, Radio::Wcdma),
    (18, Radio::Wcdma),
    (13, Radio::Lte),
];

const WIFI_RADIO_TYPES: &[&str] = &[
    "802.11a", "802.11b", "802.11g", "802.11n", "802.11ac", "802.11ax",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Flag(bool),
    Radio(RawRadio),
}

/// Outcome of reading one field through its rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Scalar),
    Absent,
    WrongType,
    OutOfRange,
}

static ABSENT: Field = Field::Absent;

/// A rule table evaluated against one JSON object.
#[derive(Debug, Clone)]
pub struct Fields {
    values: Vec<(&'static FieldRule, Field)>,
}

pub fn resolve(object: &Map<String, Value>, rules: &'static [FieldRule]) -> Fields {
    Fields {
        values: rules.iter().map(|rule| (rule, read_field(object, rule))).collect(),
    }
}

impl Fields {
    fn entry(&self, name: &str) -> Option<&(&'static FieldRule, Field)> {
        self.values.iter().find(|(rule, _)| rule.name == name)
    }

    pub fn state(&self, name: &str) -> &Field {
        self.entry(name).map(|(_, field)| field).unwrap_or(&ABSENT)
    }

    fn sentinel(&self, name: &str) -> Sentinel {
        self.entry(name)
            .map(|(rule, _)| rule.missing)
            .unwrap_or(Sentinel::Absent)
    }

    /// Integer value, or the rule's sentinel when absent or unusable.
    pub fn int(&self, name: &str) -> i64 {
        match (self.state(name), self.sentinel(name)) {
            (Field::Value(Scalar::Int(value)), _) => *value,
            (_, Sentinel::Int(missing)) => missing,
            _ => 0,
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match (self.state(name), self.sentinel(name)) {
            (Field::Value(Scalar::Float(value)), _) => *value,
            (Field::Value(Scalar::Int(value)), _) => *value as f64,
            (_, Sentinel::Float(missing)) => missing,
            (_, Sentinel::Int(missing)) => missing as f64,
            _ => 0.0,
        }
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match (self.state(name), self.sentinel(name)) {
            (Field::Value(Scalar::Text(value)), _) => Some(value.clone()),
            (_, Sentinel::Text(missing)) => Some(missing.to_string()),
            _ => None,
        }
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.state(name) {
            Field::Value(Scalar::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn opt_float(&self, name: &str) -> Option<f64> {
        match self.state(name) {
            Field::Value(Scalar::Float(value)) => Some(*value),
            Field::Value(Scalar::Int(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.state(name) {
            Field::Value(Scalar::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn radio(&self, name: &str) -> Option<RawRadio> {
        match self.state(name) {
            Field::Value(Scalar::Radio(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Optional radio; a present but unreadable value invalidates the entry
    /// instead of reading as absent.
    pub fn opt_radio(&self, name: &str) -> Result<Option<RawRadio>, InvalidEntry> {
        match self.state(name) {
            Field::Value(Scalar::Radio(value)) => Ok(Some(value.clone())),
            Field::Absent => Ok(None),
            _ => Err(InvalidEntry::UnknownRadio),
        }
    }

    /// Mandatory integer; absence or a bad value invalidates the entry.
    pub fn require_int(&self, name: &'static str) -> Result<i64, InvalidEntry> {
        match self.state(name) {
            Field::Value(Scalar::Int(value)) => Ok(*value),
            Field::Value(_) | Field::WrongType => Err(InvalidEntry::WrongType(name)),
            Field::Absent => Err(InvalidEntry::MissingField(name)),
            Field::OutOfRange => Err(InvalidEntry::OutOfRange(name)),
        }
    }

    pub fn require_text(&self, name: &'static str) -> Result<String, InvalidEntry> {
        match self.state(name) {
            Field::Value(Scalar::Text(value)) => Ok(value.clone()),
            Field::Value(_) | Field::WrongType => Err(InvalidEntry::WrongType(name)),
            Field::Absent => Err(InvalidEntry::MissingField(name)),
            Field::OutOfRange => Err(InvalidEntry::OutOfRange(name)),
        }
    }
}

fn read_field(object: &Map<String, Value>, rule: &FieldRule) -> Field {
    // First non-blank source wins.
    let raw = rule
        .sources
        .iter()
        .filter_map(|source| object.get(*source))
        .find(|value| !is_blank(value));

    let Some(raw) = raw else {
        return Field::Absent;
    };

    match coerce(raw, rule.coercion) {
        Some(scalar) if in_range(&scalar, rule.range) => Field::Value(scalar),
        Some(_) => Field::OutOfRange,
        None => Field::WrongType,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn coerce(raw: &Value, coercion: Coercion) -> Option<Scalar> {
    match coercion {
        Coercion::Integer => integer(raw).map(Scalar::Int),
        Coercion::RoundedInteger => number(raw)
            .filter(|value| value.abs() < i64::MAX as f64)
            .map(|value| Scalar::Int(value.round() as i64)),
        Coercion::Float => number(raw).map(Scalar::Float),
        Coercion::Text => raw.as_str().map(|text| Scalar::Text(text.trim().to_string())),
        Coercion::Flag => flag(raw).map(Scalar::Flag),
        Coercion::Radio => match raw {
            Value::String(name) => Some(Scalar::Radio(RawRadio::Name(
                name.trim().to_ascii_lowercase(),
            ))),
            Value::Number(_) => integral(raw).map(|code| Scalar::Radio(RawRadio::Code(code))),
            _ => None,
        },
    }
}

/// Booleans, or the integers `0` and `1`.
fn flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(value) => Some(*value),
        Value::Number(_) => match integral(raw)? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// A JSON number with no fractional part, so `18.0` reads as `18`.
fn integral(raw: &Value) -> Option<i64> {
    if let Some(value) = raw.as_i64() {
        return Some(value);
    }
    raw.as_f64()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .filter(|value| value.abs() < i64::MAX as f64)
        .map(|value| value as i64)
}

fn integer(raw: &Value) -> Option<i64> {
    if let Some(value) = raw.as_i64() {
        return Some(value);
    }
    number(raw)
        .filter(|value| value.abs() < i64::MAX as f64)
        .map(|value| value.trunc() as i64)
}

fn number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(value) => value.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

fn in_range(scalar: &Scalar, range: Option<(f64, f64)>) -> bool {
    let Some((low, high)) = range else {
        return true;
    };
    let value = match scalar {
        Scalar::Int(value) => *value as f64,
        Scalar::Float(value) => *value,
        _ => return true,
    };
    low <= value && value <= high
}

/// Map a submitted radio spelling or legacy code to its symbolic radio.
pub fn canonical_radio(raw: &RawRadio) -> Option<Radio> {
    match raw {
        RawRadio::Name(name) => match name.as_str() {
            "gsm" => Some(Radio::Gsm),
            "cdma" => Some(Radio::Cdma),
            "wcdma" | "umts" => Some(Radio::Wcdma),
            "lte" => Some(Radio::Lte),
            _ => None,
        },
        RawRadio::Code(code) => LEGACY_RADIO_CODES
            .iter()
            .find(|(legacy, _)| legacy == code)
            .map(|(_, radio)| *radio),
    }
}

pub fn canonical_wifi_radio(value: &str) -> Option<String> {
    let value = value.to_ascii_lowercase();
    WIFI_RADIO_TYPES
        .contains(&value.as_str())
        .then_some(value)
}

/// Canonical access point key: 12 lowercase hex digits, no separators.
pub fn canonical_mac(value: &str) -> Option<String> {
    let key: String = value
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect::<String>()
        .to_ascii_lowercase();

    if key.len() != 12 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if key == "000000000000" || key == "ffffffffffff" {
        return None;
    }
    Some(key)
}

/// Channel number for a 2.4 GHz or 5 GHz frequency in MHz.
pub fn channel_from_frequency(frequency: u32) -> Option<u16> {
    let channel = match frequency {
        2412..=2472 => (frequency - 2407) / 5,
        2484 => 14,
        5170..=5825 => (frequency - 5000) / 5,
        _ => return None,
    };
    u16::try_from(channel).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rounds_position_integers() {
        let fields = resolve(
            &object(json!({"accuracy": 12.4, "altitude": 100.5, "altitudeAccuracy": 23.7})),
            POSITION_FIELDS,
        );
        assert_eq!(fields.int("accuracy"), 12);
        assert_eq!(fields.int("altitude"), 101);
        assert_eq!(fields.int("altitude_accuracy"), 24);
    }

    #[test]
    fn test_heading_and_speed_keep_fractions() {
        let fields = resolve(&object(json!({"heading": 45.5, "speed": 3.6})), POSITION_FIELDS);
        assert_eq!(fields.float("heading"), 45.5);
        assert_eq!(fields.float("speed"), 3.6);
    }

    #[test]
    fn test_absent_fields_take_sentinels() {
        let fields = resolve(&object(json!({})), POSITION_FIELDS);
        assert_eq!(fields.int("accuracy"), 0);
        assert_eq!(fields.float("heading"), -1.0);
        assert_eq!(fields.float("speed"), -1.0);
        assert_eq!(fields.text("source").as_deref(), Some("gps"));
        assert_eq!(fields.int("timestamp"), 0);
        assert_eq!(fields.opt_int("age"), None);
        assert_eq!(fields.opt_float("pressure"), None);
    }

    #[test]
    fn test_out_of_range_optional_falls_back_to_sentinel() {
        let fields = resolve(&object(json!({"asu": 500, "psc": 9999})), CELL_FIELDS);
        assert_eq!(fields.int("asu"), -1);
        assert_eq!(fields.int("psc"), -1);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let fields = resolve(
            &object(json!({"mobileCountryCode": "262", "cellId": 12.9})),
            CELL_FIELDS,
        );
        assert_eq!(fields.require_int("mcc"), Ok(262));
        assert_eq!(fields.require_int("cid"), Ok(12));
    }

    #[test]
    fn test_required_field_problems() {
        let fields = resolve(
            &object(json!({"mobileCountryCode": "abc", "mobileNetworkCode": 2000})),
            CELL_FIELDS,
        );
        assert_eq!(fields.require_int("mcc"), Err(InvalidEntry::WrongType("mcc")));
        assert_eq!(fields.require_int("mnc"), Err(InvalidEntry::OutOfRange("mnc")));
        assert_eq!(fields.require_int("lac"), Err(InvalidEntry::MissingField("lac")));
    }

    #[test]
    fn test_first_dialect_source_wins() {
        let fields = resolve(
            &object(json!({"psc": 7, "primaryScramblingCode": 5})),
            CELL_FIELDS,
        );
        assert_eq!(fields.int("psc"), 5);

        let legacy = resolve(&object(json!({"psc": 7})), CELL_FIELDS);
        assert_eq!(legacy.int("psc"), 7);
    }

    #[test]
    fn test_text_rejects_numbers() {
        let fields = resolve(&object(json!({"macAddress": 10})), WIFI_FIELDS);
        assert_eq!(fields.require_text("mac"), Err(InvalidEntry::WrongType("mac")));
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let fields = resolve(&object(json!({"radioType": "  "})), CELL_FIELDS);
        assert_eq!(fields.radio("radio_type"), None);
        assert_eq!(fields.state("radio_type"), &Field::Absent);
    }

    #[test]
    fn test_canonical_radio_names_and_codes() {
        assert_eq!(canonical_radio(&RawRadio::Name("umts".into())), Some(Radio::Wcdma));
        assert_eq!(canonical_radio(&RawRadio::Name("lte".into())), Some(Radio::Lte));
        assert_eq!(canonical_radio(&RawRadio::Code(18)), Some(Radio::Wcdma));
        assert_eq!(canonical_radio(&RawRadio::Code(13)), Some(Radio::Lte));
        assert_eq!(canonical_radio(&RawRadio::Name("18".into())), None);
        assert_eq!(canonical_radio(&RawRadio::Code(99)), None);
    }

    #[test]
    fn test_radio_names_are_lowercased() {
        let fields = resolve(&object(json!({"radioType": "GSM"})), CELL_FIELDS);
        assert_eq!(fields.radio("radio_type"), Some(RawRadio::Name("gsm".into())));
    }

    #[test]
    fn test_integral_float_radio_code() {
        let fields = resolve(&object(json!({"radioType": 18.0})), CELL_FIELDS);
        assert_eq!(fields.radio("radio_type"), Some(RawRadio::Code(18)));

        let fields = resolve(&object(json!({"radioType": 18.5})), CELL_FIELDS);
        assert_eq!(fields.state("radio_type"), &Field::WrongType);
    }

    #[test]
    fn test_unreadable_radio_is_not_absent() {
        let fields = resolve(&object(json!({"radioType": true})), CELL_FIELDS);
        assert_eq!(fields.opt_radio("radio_type"), Err(InvalidEntry::UnknownRadio));

        let fields = resolve(&object(json!({"radioType": ["lte"]})), CELL_FIELDS);
        assert_eq!(fields.opt_radio("radio_type"), Err(InvalidEntry::UnknownRadio));

        let fields = resolve(&object(json!({})), CELL_FIELDS);
        assert_eq!(fields.opt_radio("radio_type"), Ok(None));
    }

    #[test]
    fn test_serving_accepts_booleans_and_zero_one() {
        let flag = |value: Value| {
            resolve(&object(json!({ "serving": value })), CELL_FIELDS).flag("serving")
        };
        assert_eq!(flag(json!(true)), Some(true));
        assert_eq!(flag(json!(1)), Some(true));
        assert_eq!(flag(json!(0)), Some(false));
        assert_eq!(flag(json!(1.0)), Some(true));
        assert_eq!(flag(json!(2)), None);
        assert_eq!(flag(json!("yes")), None);
    }

    #[test]
    fn test_canonical_mac() {
        assert_eq!(canonical_mac("01:23:45:67:89:AB").as_deref(), Some("0123456789ab"));
        assert_eq!(canonical_mac("01-23-45-67-89-ab").as_deref(), Some("0123456789ab"));
        assert_eq!(canonical_mac("0123456789ab").as_deref(), Some("0123456789ab"));
        assert_eq!(canonical_mac("00:00:00:00:00:00"), None);
        assert_eq!(canonical_mac("ff:ff:ff:ff:ff:ff"), None);
        assert_eq!(canonical_mac("0123456789"), None);
        assert_eq!(canonical_mac("0123456789zz"), None);
    }

    #[test]
    fn test_channel_from_frequency() {
        assert_eq!(channel_from_frequency(2412), Some(1));
        assert_eq!(channel_from_frequency(2437), Some(6));
        assert_eq!(channel_from_frequency(2484), Some(14));
        assert_eq!(channel_from_frequency(5180), Some(36));
        assert_eq!(channel_from_frequency(900), None);
    }

    #[test]
    fn test_wifi_radio_types() {
        assert_eq!(canonical_wifi_radio("802.11N").as_deref(), Some("802.11n"));
        assert_eq!(canonical_wifi_radio("bluetooth"), None);
    }
}
