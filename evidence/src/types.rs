//! Core types for evidence aggregation.
//!
//! Every evidence source produces one closed variant of [`EvidenceItem`].
//! Bundles embed the items by value, so once a bundle is sealed the items
//! it carries can no longer change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{fingerprint, FingerprintError};
use crate::scoring::completeness_score;

/// The five evidence sources a bundle draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// On-chain registry and freeze contract events
    Ledger,
    /// Satellite imagery captures
    Imagery,
    /// Drone swarm survey validations
    Aerial,
    /// Parsed legal documents
    Legal,
    /// Official revenue/survey/mutation records
    Registry,
}

impl EvidenceKind {
    /// All sources, in canonical order.
    pub const ALL: [EvidenceKind; 5] = [
        EvidenceKind::Ledger,
        EvidenceKind::Imagery,
        EvidenceKind::Aerial,
        EvidenceKind::Legal,
        EvidenceKind::Registry,
    ];

    /// Completeness points awarded when this source contributes at least one item.
    pub fn points(&self) -> u8 {
        match self {
            Self::Ledger => 25,
            Self::Imagery => 20,
            Self::Aerial => 20,
            Self::Legal => 20,
            Self::Registry => 15,
        }
    }

    /// Lowercase name used in URLs, logs and canonical serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::Imagery => "imagery",
            Self::Aerial => "aerial",
            Self::Legal => "legal",
            Self::Registry => "registry",
        }
    }

    /// Whether this source is looked up by case id rather than property id.
    pub fn keyed_by_case(&self) -> bool {
        matches!(self, Self::Legal)
    }
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic point of a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Inclusive time window for a source lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Window ending at `to` and reaching back `days`.
    pub fn days_back(to: DateTime<Utc>, days: u32) -> Self {
        Self {
            from: to - chrono::Duration::days(days as i64),
            to,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Kind of on-chain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    Transfer,
    Freeze,
    Dispute,
    Resolution,
    Other,
}

/// An on-chain event touching the parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub contract_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub event_kind: LedgerEventKind,
    pub parties: Vec<String>,
    pub property_id: String,
    pub gas_used: u64,
    pub transaction_value: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// A satellite capture of the parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageryRecord {
    pub image_url: String,
    pub provider: String,
    pub resolution_meters: f64,
    pub cloud_coverage: f64,
    /// Analysis metrics such as vegetation index
    pub analysis: BTreeMap<String, f64>,
    pub change_detection: Option<BTreeMap<String, f64>>,
    pub captured_at: DateTime<Utc>,
}

/// Outcome of a drone swarm survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AerialResult {
    Approved,
    Rejected,
    Inconclusive,
}

/// A drone swarm survey validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AerialValidation {
    pub validation_id: String,
    pub operator: String,
    pub coordinates: Coordinates,
    pub consensus_score: f64,
    pub accuracy_percentage: f64,
    pub result: AerialResult,
    pub swarm_participants: Vec<String>,
    pub image_hashes: Vec<String>,
    pub flown_at: DateTime<Utc>,
}

/// Typed output of the legal document parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalExtract {
    pub document_type: String,
    pub document_hash: String,
    pub extraction_confidence: f64,
    pub parsed_fields: BTreeMap<String, String>,
    pub original_filename: String,
    pub validation_status: String,
    pub processed_at: DateTime<Utc>,
}

/// Kind of government record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryRecordKind {
    Revenue,
    Survey,
    Mutation,
}

/// An official government record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub record_kind: RegistryRecordKind,
    pub record_number: String,
    pub issuing_office: String,
    pub verified_fields: BTreeMap<String, String>,
    pub digital_signature: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// One piece of evidence from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EvidenceItem {
    Ledger(LedgerEvent),
    Imagery(ImageryRecord),
    Aerial(AerialValidation),
    Legal(LegalExtract),
    Registry(RegistryRecord),
}

impl EvidenceItem {
    /// Source this item came from.
    pub fn kind(&self) -> EvidenceKind {
        match self {
            Self::Ledger(_) => EvidenceKind::Ledger,
            Self::Imagery(_) => EvidenceKind::Imagery,
            Self::Aerial(_) => EvidenceKind::Aerial,
            Self::Legal(_) => EvidenceKind::Legal,
            Self::Registry(_) => EvidenceKind::Registry,
        }
    }

    /// Common capture/observation timestamp.
    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Self::Ledger(e) => e.observed_at,
            Self::Imagery(e) => e.captured_at,
            Self::Aerial(e) => e.flown_at,
            Self::Legal(e) => e.processed_at,
            Self::Registry(e) => e.recorded_at,
        }
    }

    /// Whether every number in the item is finite.
    ///
    /// NaN and infinities have no JSON form, so items holding them cannot
    /// be fingerprinted.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Ledger(e) => ledger_finite(e),
            Self::Imagery(e) => imagery_finite(e),
            Self::Aerial(e) => aerial_finite(e),
            Self::Legal(e) => legal_finite(e),
            Self::Registry(_) => true,
        }
    }

    /// Decode an untagged source payload as the given variant.
    pub fn from_value(
        kind: EvidenceKind,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EvidenceKind::Ledger => Self::Ledger(serde_json::from_value(value)?),
            EvidenceKind::Imagery => Self::Imagery(serde_json::from_value(value)?),
            EvidenceKind::Aerial => Self::Aerial(serde_json::from_value(value)?),
            EvidenceKind::Legal => Self::Legal(serde_json::from_value(value)?),
            EvidenceKind::Registry => Self::Registry(serde_json::from_value(value)?),
        })
    }
}

fn ledger_finite(event: &LedgerEvent) -> bool {
    event.transaction_value.map_or(true, f64::is_finite)
}

fn imagery_finite(record: &ImageryRecord) -> bool {
    record.resolution_meters.is_finite()
        && record.cloud_coverage.is_finite()
        && record.analysis.values().all(|v| v.is_finite())
        && record
            .change_detection
            .as_ref()
            .map_or(true, |m| m.values().all(|v| v.is_finite()))
}

fn aerial_finite(validation: &AerialValidation) -> bool {
    validation.coordinates.lat.is_finite()
        && validation.coordinates.lon.is_finite()
        && validation.consensus_score.is_finite()
        && validation.accuracy_percentage.is_finite()
}

fn legal_finite(extract: &LegalExtract) -> bool {
    extract.extraction_confidence.is_finite()
}

/// The five evidence sequences of a bundle, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSet {
    pub ledger: Vec<LedgerEvent>,
    pub imagery: Vec<ImageryRecord>,
    pub aerial: Vec<AerialValidation>,
    pub legal: Vec<LegalExtract>,
    pub registry: Vec<RegistryRecord>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to the sequence of its variant.
    pub fn push(&mut self, item: EvidenceItem) {
        match item {
            EvidenceItem::Ledger(e) => self.ledger.push(e),
            EvidenceItem::Imagery(e) => self.imagery.push(e),
            EvidenceItem::Aerial(e) => self.aerial.push(e),
            EvidenceItem::Legal(e) => self.legal.push(e),
            EvidenceItem::Registry(e) => self.registry.push(e),
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, item: EvidenceItem) -> Self {
        self.push(item);
        self
    }

    /// Number of items collected for a source.
    pub fn count(&self, kind: EvidenceKind) -> usize {
        match kind {
            EvidenceKind::Ledger => self.ledger.len(),
            EvidenceKind::Imagery => self.imagery.len(),
            EvidenceKind::Aerial => self.aerial.len(),
            EvidenceKind::Legal => self.legal.len(),
            EvidenceKind::Registry => self.registry.len(),
        }
    }

    pub fn has(&self, kind: EvidenceKind) -> bool {
        self.count(kind) > 0
    }

    pub fn total_items(&self) -> usize {
        EvidenceKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    /// First source holding a NaN or infinite number, if any.
    pub fn non_finite_source(&self) -> Option<EvidenceKind> {
        if !self.ledger.iter().all(ledger_finite) {
            Some(EvidenceKind::Ledger)
        } else if !self.imagery.iter().all(imagery_finite) {
            Some(EvidenceKind::Imagery)
        } else if !self.aerial.iter().all(aerial_finite) {
            Some(EvidenceKind::Aerial)
        } else if !self.legal.iter().all(legal_finite) {
            Some(EvidenceKind::Legal)
        } else {
            None
        }
    }
}

/// Confidence in a bundle, derived from its completeness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceRating {
    Low,
    Medium,
    High,
}

impl ConfidenceRating {
    /// 80+ is HIGH, 60+ is MEDIUM, anything else LOW.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::High,
            60..=79 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

/// Coarse quality flags shown alongside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub ledger_coverage: bool,
    pub visual_evidence: bool,
    pub legal_documentation: bool,
    pub official_records: bool,
}

/// Counters attached to a bundle. Never part of the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSummary {
    /// Items per source
    pub evidence_count: BTreeMap<EvidenceKind, usize>,
    /// Number of sources consulted (always all five)
    pub total_sources: usize,
    /// Sources that contributed at least one item
    pub sources_with_evidence: usize,
    /// Sources that failed or timed out during collection
    pub unavailable_sources: Vec<EvidenceKind>,
    /// Wall-clock collection time
    pub generation_ms: u64,
    pub quality: QualityIndicators,
}

impl BundleSummary {
    fn compute(
        evidence: &EvidenceSet,
        unavailable_sources: Vec<EvidenceKind>,
        generation_ms: u64,
    ) -> Self {
        let evidence_count = EvidenceKind::ALL
            .iter()
            .map(|k| (*k, evidence.count(*k)))
            .collect();

        Self {
            evidence_count,
            total_sources: EvidenceKind::ALL.len(),
            sources_with_evidence: EvidenceKind::ALL.iter().filter(|k| evidence.has(**k)).count(),
            unavailable_sources,
            generation_ms,
            quality: QualityIndicators {
                ledger_coverage: evidence.has(EvidenceKind::Ledger),
                visual_evidence: evidence.has(EvidenceKind::Imagery)
                    || evidence.has(EvidenceKind::Aerial),
                legal_documentation: evidence.has(EvidenceKind::Legal),
                official_records: evidence.has(EvidenceKind::Registry),
            },
        }
    }
}

/// The scored, fingerprinted aggregate of all evidence for one case.
///
/// Score, fingerprint and rating are computed once in [`EvidenceBundle::seal`];
/// there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    bundle_id: String,
    case_id: String,
    property_id: String,
    created_at: DateTime<Utc>,
    evidence: EvidenceSet,
    completeness_score: u8,
    fingerprint: String,
    confidence: ConfidenceRating,
    summary: BundleSummary,
}

impl EvidenceBundle {
    /// Finalize collected evidence into an immutable bundle.
    ///
    /// Fails when the evidence cannot be fingerprinted, e.g. it holds a
    /// non-finite number.
    pub fn seal(
        case_id: impl Into<String>,
        property_id: impl Into<String>,
        created_at: DateTime<Utc>,
        evidence: EvidenceSet,
        unavailable_sources: Vec<EvidenceKind>,
        generation_ms: u64,
    ) -> Result<Self, FingerprintError> {
        let completeness_score = completeness_score(&evidence);
        let fingerprint = fingerprint(&evidence)?;
        let summary = BundleSummary::compute(&evidence, unavailable_sources, generation_ms);

        Ok(Self {
            bundle_id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.into(),
            property_id: property_id.into(),
            created_at,
            evidence,
            completeness_score,
            fingerprint,
            confidence: ConfidenceRating::from_score(completeness_score),
            summary,
        })
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn evidence(&self) -> &EvidenceSet {
        &self.evidence
    }

    pub fn completeness_score(&self) -> u8 {
        self.completeness_score
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn confidence(&self) -> ConfidenceRating {
        self.confidence
    }

    pub fn summary(&self) -> &BundleSummary {
        &self.summary
    }

    /// Recompute the fingerprint and compare it with the sealed one.
    ///
    /// Bundles that went through storage or the wire can be re-checked here.
    pub fn verify_integrity(&self) -> bool {
        fingerprint(&self.evidence).is_ok_and(|fp| fp == self.fingerprint)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(ConfidenceRating::from_score(100), ConfidenceRating::High);
        assert_eq!(ConfidenceRating::from_score(80), ConfidenceRating::High);
        assert_eq!(ConfidenceRating::from_score(79), ConfidenceRating::Medium);
        assert_eq!(ConfidenceRating::from_score(60), ConfidenceRating::Medium);
        assert_eq!(ConfidenceRating::from_score(59), ConfidenceRating::Low);
        assert_eq!(ConfidenceRating::from_score(0), ConfidenceRating::Low);
    }

    #[test]
    fn test_item_tagging() {
        let item = EvidenceItem::Legal(legal_extract("hash_deed_123"));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["source"], "legal");

        let back: EvidenceItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), EvidenceKind::Legal);
        assert_eq!(back.observed_at(), at(4));
    }

    #[test]
    fn test_from_untagged_value() {
        let value = serde_json::to_value(registry_record("RR_1")).unwrap();
        let item = EvidenceItem::from_value(EvidenceKind::Registry, value.clone()).unwrap();
        assert_eq!(item.kind(), EvidenceKind::Registry);

        // A registry payload is not a valid ledger event
        assert!(EvidenceItem::from_value(EvidenceKind::Ledger, value).is_err());
    }

    #[test]
    fn test_sealed_bundle() {
        let bundle = EvidenceBundle::seal("CASE_1", "GJ01AA1234567890", at(6), full_set(), vec![], 12).unwrap();

        assert_eq!(bundle.completeness_score(), 100);
        assert_eq!(bundle.confidence(), ConfidenceRating::High);
        assert_eq!(bundle.fingerprint().len(), 64);
        assert_eq!(bundle.summary().total_sources, 5);
        assert_eq!(bundle.summary().sources_with_evidence, 5);
        assert!(bundle.summary().quality.visual_evidence);
        assert!(bundle.verify_integrity());
    }

    #[test]
    fn test_integrity_survives_serialization() {
        let bundle = EvidenceBundle::seal("CASE_1", "GJ01", at(6), full_set(), vec![], 3).unwrap();
        let json = serde_json::to_string(&bundle).unwrap();
        let restored: EvidenceBundle = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.fingerprint(), bundle.fingerprint());
        assert!(restored.verify_integrity());
    }

    #[test]
    fn test_tampered_bundle_fails_integrity() {
        let bundle = EvidenceBundle::seal("CASE_1", "GJ01", at(6), full_set(), vec![], 3).unwrap();
        let mut json = serde_json::to_value(&bundle).unwrap();
        json["evidence"]["legal"][0]["parsed_fields"]["owner"] = "Someone Else".into();

        let tampered: EvidenceBundle = serde_json::from_value(json).unwrap();
        assert!(!tampered.verify_integrity());
    }

    #[test]
    fn test_non_finite_numbers_refused() {
        let mut record = imagery_record("https://imagery.test/a.tiff");
        record.cloud_coverage = f64::NAN;
        assert!(!EvidenceItem::Imagery(record.clone()).is_finite());

        let set = EvidenceSet::new().with(EvidenceItem::Imagery(record));
        assert_eq!(set.non_finite_source(), Some(EvidenceKind::Imagery));
        assert!(matches!(
            EvidenceBundle::seal("CASE_1", "GJ01", at(6), set, vec![], 3),
            Err(FingerprintError::NonFinite(EvidenceKind::Imagery))
        ));
        assert_eq!(full_set().non_finite_source(), None);
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::days_back(at(10), 5);
        assert!(range.contains(at(6)));
        assert!(!range.contains(at(4)));
    }
}
