use chrono::{DateTime, Datelike, TimeZone, Utc};

use super::accounting::{BatchAccountant, EntryKind};
use super::dedup::first_wins;
use super::error::{InvalidEntry, InvalidReport};
use super::models::{
    CellEntry, CellReading, NormalizedReport, Position, PositionSource, Radio, Report,
    WifiEntry, WifiReading,
};
use super::rules::{self, MAX_CID_SHORT, RawRadio};

/// Normalize and deduplicate one validated report.
///
/// Entry-level skips and duplicates are recorded on the accountant; the
/// report itself is only rejected when nothing usable is left.
pub fn normalize_report(
    report: Report,
    now: DateTime<Utc>,
    accountant: &mut BatchAccountant,
) -> Result<NormalizedReport, InvalidReport> {
    let Report {
        latitude,
        longitude,
        accuracy,
        altitude,
        altitude_accuracy,
        age,
        heading,
        pressure,
        speed,
        source,
        timestamp,
        radio_type,
        cell_towers,
        wifi_access_points,
    } = report;

    let cells = accountant.accept_entries(
        EntryKind::Cell,
        cell_towers
            .into_iter()
            .map(|entry| entry.and_then(|cell| normalize_cell(cell, radio_type.as_ref()))),
    );
    let cells = first_wins(cells, CellReading::key);
    accountant.duplicates(EntryKind::Cell, cells.discarded);

    let wifis = accountant.accept_entries(
        EntryKind::Wifi,
        wifi_access_points
            .into_iter()
            .map(|entry| entry.and_then(normalize_wifi)),
    );
    let wifis = first_wins(wifis, |wifi: &WifiReading| wifi.key.clone());
    accountant.duplicates(EntryKind::Wifi, wifis.discarded);

    if cells.kept.is_empty() && wifis.kept.is_empty() {
        return Err(InvalidReport::Empty);
    }

    let timestamp = derive_timestamp(timestamp, now);

    Ok(NormalizedReport {
        timestamp,
        time: month_bucket(timestamp),
        position: Position {
            latitude,
            longitude,
            accuracy: present(accuracy, 0),
            altitude: present(altitude, 0),
            altitude_accuracy: present(altitude_accuracy, 0),
            heading: present(heading, -1.0),
            speed: present(speed, -1.0),
            age,
            pressure,
            source: PositionSource::parse(&source),
        },
        cells: cells.kept,
        wifis: wifis.kept,
    })
}

/// Resolve a cell's radio (own, else inherited) and drop sentinels.
pub fn normalize_cell(
    entry: CellEntry,
    report_radio: Option<&RawRadio>,
) -> Result<CellReading, InvalidEntry> {
    let raw = entry
        .radio_type
        .as_ref()
        .or(report_radio)
        .ok_or(InvalidEntry::NoRadio)?;
    let radio = rules::canonical_radio(raw).ok_or(InvalidEntry::UnknownRadio)?;

    if matches!(radio, Radio::Gsm | Radio::Cdma) && entry.cid > MAX_CID_SHORT {
        return Err(InvalidEntry::OutOfRange("cid"));
    }

    Ok(CellReading {
        radio,
        mcc: entry.mcc,
        mnc: entry.mnc,
        lac: entry.lac,
        cid: entry.cid,
        psc: present(entry.psc, -1).and_then(|psc| u16::try_from(psc).ok()),
        asu: present(entry.asu, -1).and_then(|asu| i16::try_from(asu).ok()),
        signal: entry.signal_strength as i32,
        ta: entry.timing_advance as i32,
        age: present(entry.age, 0),
        serving: entry.serving,
    })
}

pub fn normalize_wifi(entry: WifiEntry) -> Result<WifiReading, InvalidEntry> {
    let key = rules::canonical_mac(&entry.mac_address).ok_or(InvalidEntry::InvalidMac)?;

    let frequency = present(entry.frequency, 0).and_then(|f| u32::try_from(f).ok());
    let channel = present(entry.channel, 0)
        .and_then(|c| u16::try_from(c).ok())
        .or_else(|| frequency.and_then(rules::channel_from_frequency));

    Ok(WifiReading {
        key,
        channel,
        frequency,
        snr: present(entry.signal_to_noise_ratio, 0).and_then(|snr| u16::try_from(snr).ok()),
        signal: entry.signal_strength as i32,
        age: present(entry.age, 0),
        radio: entry
            .radio_type
            .as_deref()
            .and_then(rules::canonical_wifi_radio),
    })
}

/// Submission time replaces the `0` sentinel and unusable timestamps.
pub fn derive_timestamp(millis: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if millis <= 0 {
        return now;
    }
    DateTime::from_timestamp_millis(millis).unwrap_or(now)
}

/// First instant of the calendar month (UTC).
pub fn month_bucket(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

fn present<T: PartialEq>(value: T, sentinel: T) -> Option<T> {
    (value != sentinel).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 12).unwrap()
    }

    fn cell_entry(radio: Option<RawRadio>) -> CellEntry {
        CellEntry {
            radio_type: radio,
            mcc: 262,
            mnc: 1,
            lac: 5,
            cid: 12,
            age: 0,
            asu: -1,
            psc: -1,
            serving: None,
            signal_strength: 0,
            timing_advance: 0,
        }
    }

    fn wifi_entry(mac: &str) -> WifiEntry {
        WifiEntry {
            mac_address: mac.to_string(),
            radio_type: None,
            age: 0,
            channel: 0,
            frequency: 0,
            signal_to_noise_ratio: 0,
            signal_strength: 0,
        }
    }

    fn report(cells: Vec<CellEntry>, wifis: Vec<WifiEntry>) -> Report {
        Report {
            latitude: 51.5,
            longitude: -0.1,
            accuracy: 0,
            altitude: 0,
            altitude_accuracy: 0,
            age: None,
            heading: -1.0,
            pressure: None,
            speed: -1.0,
            source: "gps".to_string(),
            timestamp: 0,
            radio_type: None,
            cell_towers: cells.into_iter().map(Ok).collect(),
            wifi_access_points: wifis.into_iter().map(Ok).collect(),
        }
    }

    #[test]
    fn test_zero_timestamp_uses_now() {
        assert_eq!(derive_timestamp(0, now()), now());
        assert_eq!(derive_timestamp(-5, now()), now());
    }

    #[test]
    fn test_explicit_timestamp_is_kept() {
        let millis = 1_400_000_000_123;
        let derived = derive_timestamp(millis, now());
        assert_eq!(derived.timestamp_millis(), millis);
    }

    #[test]
    fn test_month_bucket() {
        let bucket = month_bucket(now());
        assert_eq!(bucket, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_cell_inherits_report_radio() {
        let inherited = RawRadio::Name("lte".into());
        let cell = normalize_cell(cell_entry(None), Some(&inherited)).unwrap();
        assert_eq!(cell.radio, Radio::Lte);
    }

    #[test]
    fn test_cell_radio_beats_report_radio() {
        let inherited = RawRadio::Name("lte".into());
        let cell = normalize_cell(
            cell_entry(Some(RawRadio::Name("gsm".into()))),
            Some(&inherited),
        )
        .unwrap();
        assert_eq!(cell.radio, Radio::Gsm);
    }

    #[test]
    fn test_cell_without_any_radio_is_dropped() {
        assert_eq!(normalize_cell(cell_entry(None), None), Err(InvalidEntry::NoRadio));
    }

    #[test]
    fn test_unknown_radio_is_dropped() {
        let result = normalize_cell(cell_entry(Some(RawRadio::Name("18".into()))), None);
        assert_eq!(result, Err(InvalidEntry::UnknownRadio));
    }

    #[test]
    fn test_umts_and_legacy_code_alias_to_wcdma() {
        let umts = normalize_cell(cell_entry(Some(RawRadio::Name("umts".into()))), None).unwrap();
        let code = normalize_cell(cell_entry(Some(RawRadio::Code(18))), None).unwrap();
        assert_eq!(umts.radio, Radio::Wcdma);
        assert_eq!(code.radio, Radio::Wcdma);
    }

    #[test]
    fn test_gsm_cid_limit() {
        let mut entry = cell_entry(Some(RawRadio::Name("gsm".into())));
        entry.cid = 70_000;
        assert_eq!(normalize_cell(entry.clone(), None), Err(InvalidEntry::OutOfRange("cid")));

        entry.radio_type = Some(RawRadio::Name("wcdma".into()));
        assert!(normalize_cell(entry, None).is_ok());
    }

    #[test]
    fn test_cell_sentinels_are_omitted() {
        let cell = normalize_cell(cell_entry(Some(RawRadio::Name("gsm".into()))), None).unwrap();
        assert_eq!(cell.psc, None);
        assert_eq!(cell.asu, None);
        assert_eq!(cell.age, None);
        assert_eq!(cell.signal, 0);
        assert_eq!(cell.ta, 0);
    }

    #[test]
    fn test_wifi_key_and_channel() {
        let mut entry = wifi_entry("01:23:45:67:89:AB");
        entry.frequency = 2437;
        let wifi = normalize_wifi(entry).unwrap();
        assert_eq!(wifi.key, "0123456789ab");
        assert_eq!(wifi.frequency, Some(2437));
        assert_eq!(wifi.channel, Some(6));
        assert_eq!(wifi.snr, None);
    }

    #[test]
    fn test_invalid_mac_is_dropped() {
        assert_eq!(normalize_wifi(wifi_entry("not-a-mac")), Err(InvalidEntry::InvalidMac));
    }

    #[test]
    fn test_report_position_sentinels() {
        let mut input = report(vec![], vec![wifi_entry("0123456789ab")]);
        input.accuracy = 12;
        input.speed = 3.6;
        let mut accountant = BatchAccountant::new(1);

        let normalized = normalize_report(input, now(), &mut accountant).unwrap();
        assert_eq!(normalized.position.accuracy, Some(12));
        assert_eq!(normalized.position.altitude, None);
        assert_eq!(normalized.position.heading, None);
        assert_eq!(normalized.position.speed, Some(3.6));
        assert_eq!(normalized.position.source, PositionSource::Gps);
        assert_eq!(normalized.timestamp, now());
        assert_eq!(normalized.time, month_bucket(now()));
    }

    #[test]
    fn test_duplicates_collapse_first_wins() {
        let mut first = cell_entry(Some(RawRadio::Name("umts".into())));
        first.asu = 10;
        let mut second = cell_entry(Some(RawRadio::Name("wcdma".into())));
        second.asu = 16;
        let mut accountant = BatchAccountant::new(1);

        let normalized =
            normalize_report(report(vec![first, second], vec![]), now(), &mut accountant).unwrap();
        assert_eq!(normalized.cells.len(), 1);
        assert_eq!(normalized.cells[0].asu, Some(10));
        assert_eq!(accountant.finish().cell_duplicates, 1);
    }

    #[test]
    fn test_report_without_usable_entries_is_empty() {
        let mut accountant = BatchAccountant::new(1);
        let result = normalize_report(
            report(vec![cell_entry(None)], vec![wifi_entry("bad")]),
            now(),
            &mut accountant,
        );
        assert_eq!(result, Err(InvalidReport::Empty));

        let counts = accountant.finish();
        assert_eq!(counts.cells_dropped, 1);
        assert_eq!(counts.wifis_dropped, 1);
    }
}
