//! The degenerate-input notice goes through the `log` facade at info level.
//!
//! Kept in its own test binary: the logger is process-global.

use std::sync::{Arc, Mutex};

use cc_core::{Club, ClubCollection, ClubModel, CollectionMeta, HacMethod, Panel};
use cc_inference::{MergeConfig, MergeMethod, merge_clubs};
use log::{Level, LevelFilter, Log, Metadata, Record};

struct Capture {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture { records: Mutex::new(Vec::new()) };

fn collection(n_clubs: usize) -> ClubCollection {
    let rows = (0..4).map(|i| vec![i as f64 + 1.0; 6]).collect();
    let meta = CollectionMeta {
        panel: Arc::new(Panel::from_rows(rows).unwrap()),
        data_cols: (0..6).collect(),
        ref_col: 5,
        hac_method: HacMethod::Fqsb,
        time_trim: 1.0 / 3.0,
        track_unit_names: false,
    };
    let clubs = (0..n_clubs)
        .map(|i| Club::new(format!("club{}", i + 1), vec![i], ClubModel::with_tvalue(1.0)))
        .collect();
    ClubCollection::new(clubs, meta, vec![3]).unwrap()
}

#[test]
fn fewer_than_two_clubs_emits_info_notice() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    for n in [0, 1] {
        CAPTURE.records.lock().unwrap().clear();
        let cc = collection(n);
        for method in [MergeMethod::Ps, MergeMethod::Vlt] {
            let out = merge_clubs(&cc, &MergeConfig::new(method)).unwrap();
            assert_eq!(out.clubs, cc.clubs);
            assert_eq!(out.divergent, cc.divergent);
        }
        let records = CAPTURE.records.lock().unwrap();
        let notices: Vec<_> = records
            .iter()
            .filter(|(level, msg)| *level == Level::Info && msg.contains("nothing to merge"))
            .collect();
        assert_eq!(notices.len(), 2, "{n} club(s): {records:?}");
    }
}
