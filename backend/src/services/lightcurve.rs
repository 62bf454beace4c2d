//! Per-object photometry and image cutouts.

use std::collections::BTreeMap;

use crate::broker::AlertBroker;
use crate::models::{CandidateRecord, LightCurve, ObjectId, StampKind};

/// Light curves keyed by object, plus the objects that were skipped.
#[derive(Debug, Clone, Default)]
pub struct LightCurveSet {
    pub curves: BTreeMap<ObjectId, LightCurve>,
    pub warnings: Vec<String>,
}

/// Fetch light curves one object at a time.
///
/// Objects whose fetch fails or that have no detections are skipped with a
/// warning.
pub async fn fetch_light_curves(broker: &dyn AlertBroker, records: &[CandidateRecord]) -> LightCurveSet {
    let mut set = LightCurveSet::default();
    for record in records {
        match broker.light_curve(&record.oid).await {
            Ok(curve) if curve.is_empty() => {
                log::warn!("{} has no detections, skipping", record.oid);
                set.warnings.push(format!("light curve {}: no detections", record.oid));
            }
            Ok(curve) => {
                set.curves.insert(record.oid.clone(), curve);
            }
            Err(e) => {
                log::warn!("Light curve for {} unavailable: {}", record.oid, e);
                set.warnings.push(format!("light curve {}: {}", record.oid, e));
            }
        }
    }
    set
}

/// Science, template and difference cutouts of one detection.
#[derive(Debug, Clone, Default)]
pub struct StampSet {
    pub images: Vec<(StampKind, Vec<u8>)>,
    pub warnings: Vec<String>,
}

impl StampSet {
    pub fn get(&self, kind: StampKind) -> Option<&[u8]> {
        self.images
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

/// Fetch all three cutouts for `candid`; a missing cutout is a warning.
pub async fn fetch_stamps(broker: &dyn AlertBroker, oid: &ObjectId, candid: &str) -> StampSet {
    let mut set = StampSet::default();
    for kind in StampKind::ALL {
        match broker.stamp(oid, candid, kind).await {
            Ok(bytes) => set.images.push((kind, bytes)),
            Err(e) => {
                log::warn!("{} stamp for {}/{} unavailable: {}", kind.as_str(), oid, candid, e);
                set.warnings
                    .push(format!("stamp {}/{} {}: {}", oid, candid, kind.as_str(), e));
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalBroker;
    use crate::models::{Detection, FilterId};

    fn record(oid: &str) -> CandidateRecord {
        CandidateRecord {
            oid: oid.into(),
            meanra: 0.0,
            meandec: 0.0,
            ndet: 2,
            firstmjd: 100.0,
            lastmjd: 101.0,
            mjdstarthist: None,
            mjdendhist: None,
            stellar: None,
            sgscore: None,
            class: None,
            probability: None,
        }
    }

    fn curve() -> LightCurve {
        LightCurve {
            detections: vec![Detection {
                candid: Some("1001".to_string()),
                mjd: 100.2,
                fid: FilterId(2),
                magpsf: 18.9,
                sigmapsf: 0.05,
            }],
            non_detections: vec![],
        }
    }

    #[tokio::test]
    async fn test_light_curves_skip_problems() {
        let broker = LocalBroker::new();
        broker.add_light_curve(ObjectId::new("good"), curve());
        broker.add_light_curve(ObjectId::new("empty"), LightCurve::default());
        broker.add_light_curve(ObjectId::new("broken"), curve());
        broker.fail_object(ObjectId::new("broken"));

        let records = vec![record("good"), record("empty"), record("broken"), record("unknown")];
        let set = fetch_light_curves(&broker, &records).await;

        assert_eq!(set.curves.len(), 1);
        assert!(set.curves.contains_key(&ObjectId::new("good")));
        assert_eq!(set.warnings.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_stamp_is_warning() {
        let broker = LocalBroker::new();
        let oid = ObjectId::new("ZTF1");
        broker.add_stamp(oid.clone(), "1001", StampKind::Science, vec![0x89, b'P', b'N', b'G']);
        broker.add_stamp(oid.clone(), "1001", StampKind::Difference, vec![1, 2, 3]);

        let set = fetch_stamps(&broker, &oid, "1001").await;
        assert_eq!(set.images.len(), 2);
        assert_eq!(set.get(StampKind::Science), Some(&[0x89, b'P', b'N', b'G'][..]));
        assert!(set.get(StampKind::Template).is_none());
        assert_eq!(set.warnings.len(), 1);
    }
}
