//! Demultiplexing of a record stream down to selected ADS-B message kinds.
//!
//! The extractor only classifies; the caller copies kept records to the
//! output container untouched.

use serde::Serialize;
use tracing::debug;

use crate::decode::decode_hex;
use crate::filter::{FilterCounts, FilterReason, KindFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Keep,
    Filtered(FilterReason),
}

/// Records read from one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCount {
    pub path: String,
    pub records: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractStats {
    pub read: u64,
    pub written: u64,
    pub filtered: u64,
    pub filter_reasons: FilterCounts,
    /// Undecodable payloads, also counted as filtered
    pub malformed: u64,
    /// In input order
    pub files: Vec<FileCount>,
}

pub struct Extractor {
    filter: KindFilter,
    stats: ExtractStats,
}

impl Extractor {
    pub fn new(filter: KindFilter) -> Self {
        Extractor {
            filter,
            stats: ExtractStats::default(),
        }
    }

    /// Start counting records for a new input file.
    pub fn begin_file(&mut self, path: impl Into<String>) {
        self.stats.files.push(FileCount {
            path: path.into(),
            records: 0,
        });
    }

    /// Classify one raw payload.
    ///
    /// Every call decodes afresh; an undecodable payload is filtered on its
    /// own and never judged by an earlier record's message.
    pub fn process(&mut self, raw_message: &str, time: f64) -> ExtractOutcome {
        self.stats.read += 1;
        if let Some(file) = self.stats.files.last_mut() {
            file.records += 1;
        }

        let reason = match decode_hex(raw_message, time) {
            Ok(decoded) => self.filter.rejects(&decoded),
            Err(e) => {
                debug!(index = self.stats.read, error = %e, "skipping malformed record");
                self.stats.malformed += 1;
                Some(FilterReason::Malformed)
            }
        };

        match reason {
            Some(reason) => {
                self.stats.filtered += 1;
                self.stats.filter_reasons.record(reason);
                ExtractOutcome::Filtered(reason)
            }
            None => {
                self.stats.written += 1;
                ExtractOutcome::Keep
            }
        }
    }

    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    pub fn into_stats(self) -> ExtractStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENT: &str = "8D4840D6202CC371C32CE0576098";
    const POSITION: &str = "8D40621D58C382D690C8AC2863A7";
    const VELOCITY: &str = "8D485020994409940838175B284F";
    const SHORT_REPLY: &str = "20001838CA3804";

    #[test]
    fn test_keep_all_adsb_by_default() {
        let mut ex = Extractor::new(KindFilter::default());
        ex.begin_file("a.avro");
        for hex in [IDENT, POSITION, VELOCITY] {
            assert_eq!(ex.process(hex, 0.0), ExtractOutcome::Keep);
        }
        assert_eq!(
            ex.process(SHORT_REPLY, 0.0),
            ExtractOutcome::Filtered(FilterReason::NotAdsb)
        );
        let stats = ex.into_stats();
        assert_eq!(stats.written, 3);
        assert_eq!(stats.filtered, 1);
    }

    #[test]
    fn test_kind_flags() {
        let mut ex = Extractor::new(KindFilter {
            no_velocity: true,
            ..Default::default()
        });
        assert_eq!(
            ex.process(VELOCITY, 0.0),
            ExtractOutcome::Filtered(FilterReason::Kind)
        );
        assert_eq!(ex.process(POSITION, 0.0), ExtractOutcome::Keep);
    }

    #[test]
    fn test_malformed_never_reuses_previous_message() {
        let mut ex = Extractor::new(KindFilter::default());
        ex.begin_file("a.avro");
        assert_eq!(ex.process(POSITION, 0.0), ExtractOutcome::Keep);
        ex.begin_file("b.avro");
        for bad in ["", "8D40621D58C3", "XYZXYZXYZXYZXYZXYZXYZXYZXYZX"] {
            assert_eq!(
                ex.process(bad, 0.0),
                ExtractOutcome::Filtered(FilterReason::Malformed)
            );
        }
        let stats = ex.stats();
        assert_eq!(stats.malformed, 3);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.files[1].records, 3);
    }

    #[test]
    fn test_counters_balance() {
        let mut ex = Extractor::new(KindFilter {
            no_identification: true,
            ..Default::default()
        });
        ex.begin_file("one");
        ex.process(IDENT, 0.0);
        ex.process(POSITION, 0.0);
        ex.begin_file("two");
        ex.process(VELOCITY, 0.0);
        ex.process("garbage", 0.0);
        ex.process(SHORT_REPLY, 0.0);

        let stats = ex.into_stats();
        assert_eq!(stats.read, 5);
        assert_eq!(stats.written + stats.filtered, stats.read);
        assert_eq!(stats.files.iter().map(|f| f.records).sum::<u64>(), stats.read);
        assert_eq!(stats.files[0].records, 2);
        assert_eq!(stats.files[1].records, 3);
    }
}
