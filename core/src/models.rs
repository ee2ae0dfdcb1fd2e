use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{Composite, InsertPolicy, Record, ScopedStore, new_id};

/// Current time as UTC RFC 3339 with milliseconds, e.g. `2024-01-01T08:00:00.000Z`.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the timestamp shapes records carry: full RFC 3339, or local
/// date-times without an offset down to minute precision, or a bare date.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// --- Diet ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietItem {
    pub id: String,
    pub name: String,
    /// Grams.
    pub weight: f64,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDietItem {
    pub name: String,
    pub weight: f64,
    /// Defaults to the time of creation.
    pub timestamp: Option<String>,
    pub image_uri: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DietItemPatch {
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub timestamp: Option<String>,
    pub image_uri: Option<Option<String>>,
}

impl Record for DietItem {
    const KEY_PREFIX: &'static str = "dietEntries";
    const INSERT: InsertPolicy = InsertPolicy::Prepend;
    const NOUN: &'static str = "diet item";
    const PLURAL: &'static str = "diet items";

    type New = NewDietItem;
    type Patch = DietItemPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(id: String, data: NewDietItem) -> Self {
        DietItem {
            id,
            name: data.name,
            weight: data.weight,
            timestamp: data.timestamp.unwrap_or_else(now_timestamp),
            image_uri: data.image_uri,
        }
    }

    fn apply(&mut self, patch: DietItemPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(image_uri) = patch.image_uri {
            self.image_uri = image_uri;
        }
    }
}

// --- Medication ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicationKind {
    #[default]
    Prescription,
    Supplement,
    Vitamin,
    Other,
}

pub const MEDICATION_KINDS: &[&str] = &["prescription", "supplement", "vitamin", "other"];

impl MedicationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MedicationKind::Prescription => "prescription",
            MedicationKind::Supplement => "supplement",
            MedicationKind::Vitamin => "vitamin",
            MedicationKind::Other => "other",
        }
    }
}

impl fmt::Display for MedicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "prescription" => Ok(MedicationKind::Prescription),
            "supplement" => Ok(MedicationKind::Supplement),
            "vitamin" => Ok(MedicationKind::Vitamin),
            "other" => Ok(MedicationKind::Other),
            _ => bail!(
                "Invalid medication type '{s}'. Must be one of: {}",
                MEDICATION_KINDS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub id: String,
    pub dosage: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: MedicationKind,
    #[serde(default)]
    pub records: Vec<MedicationRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMedicationRecord {
    /// Kept when present and non-empty; otherwise the store assigns one.
    pub id: Option<String>,
    pub dosage: String,
    pub timestamp: Option<String>,
    pub image_uri: Option<String>,
    pub notes: Option<String>,
}

impl NewMedicationRecord {
    /// The initial record logged alongside a new medication.
    #[must_use]
    pub fn taken_or_missed(taken: bool, timestamp: Option<String>, image_uri: Option<String>) -> Self {
        let (dosage, notes) = if taken {
            ("Taken", "Medication taken as scheduled")
        } else {
            ("Missed", "Medication missed")
        };
        NewMedicationRecord {
            id: None,
            dosage: dosage.to_string(),
            timestamp,
            image_uri,
            notes: Some(notes.to_string()),
        }
    }

    fn into_record(self, id: String) -> MedicationRecord {
        MedicationRecord {
            id,
            dosage: self.dosage,
            timestamp: self.timestamp.unwrap_or_else(now_timestamp),
            image_uri: self.image_uri,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewMedication {
    pub name: String,
    pub kind: MedicationKind,
    pub records: Vec<NewMedicationRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MedicationPatch {
    pub name: Option<String>,
    pub kind: Option<MedicationKind>,
}

fn supplied_or_new(id: Option<String>) -> String {
    id.filter(|id| !id.is_empty()).unwrap_or_else(new_id)
}

impl Record for Medication {
    const KEY_PREFIX: &'static str = "medicationEntries";
    const INSERT: InsertPolicy = InsertPolicy::Prepend;
    const NOUN: &'static str = "medication";
    const PLURAL: &'static str = "medications";

    type New = NewMedication;
    type Patch = MedicationPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(id: String, data: NewMedication) -> Self {
        let records = data
            .records
            .into_iter()
            .map(|mut r| {
                let id = supplied_or_new(r.id.take());
                r.into_record(id)
            })
            .collect();
        Medication {
            id,
            name: data.name,
            kind: data.kind,
            records,
        }
    }

    fn apply(&mut self, patch: MedicationPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
    }
}

impl Composite for Medication {
    type Child = MedicationRecord;
    type NewChild = NewMedicationRecord;
    const CHILD_NOUN: &'static str = "medication record";

    fn children(&self) -> &[MedicationRecord] {
        &self.records
    }

    fn children_mut(&mut self) -> &mut Vec<MedicationRecord> {
        &mut self.records
    }

    fn child_id(child: &MedicationRecord) -> &str {
        &child.id
    }

    fn child_timestamp(child: &MedicationRecord) -> &str {
        &child.timestamp
    }

    fn create_child(id: String, data: NewMedicationRecord) -> MedicationRecord {
        data.into_record(id)
    }
}

// --- Symptom ---

pub const MAX_SEVERITY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomRecord {
    pub id: String,
    /// 0 (none) to 10 (worst).
    pub severity: u8,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub records: Vec<SymptomRecord>,
}

impl Symptom {
    /// The most recently appended reading, as shown on the symptom list.
    #[must_use]
    pub fn last_record(&self) -> Option<&SymptomRecord> {
        self.records.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSymptomRecord {
    pub id: Option<String>,
    pub severity: u8,
    pub timestamp: Option<String>,
    pub image_uri: Option<String>,
}

impl NewSymptomRecord {
    fn into_record(self, id: String) -> SymptomRecord {
        SymptomRecord {
            id,
            severity: self.severity,
            timestamp: self.timestamp.unwrap_or_else(now_timestamp),
            image_uri: self.image_uri,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSymptom {
    pub name: String,
    pub records: Vec<NewSymptomRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct SymptomPatch {
    pub name: Option<String>,
}

impl Record for Symptom {
    const KEY_PREFIX: &'static str = "symptomEntries";
    const INSERT: InsertPolicy = InsertPolicy::Prepend;
    const NOUN: &'static str = "symptom";
    const PLURAL: &'static str = "symptoms";

    type New = NewSymptom;
    type Patch = SymptomPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(id: String, data: NewSymptom) -> Self {
        let records = data
            .records
            .into_iter()
            .map(|mut r| {
                let id = supplied_or_new(r.id.take());
                r.into_record(id)
            })
            .collect();
        Symptom {
            id,
            name: data.name,
            records,
        }
    }

    fn apply(&mut self, patch: SymptomPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
    }
}

impl Composite for Symptom {
    type Child = SymptomRecord;
    type NewChild = NewSymptomRecord;
    const CHILD_NOUN: &'static str = "symptom record";

    fn children(&self) -> &[SymptomRecord] {
        &self.records
    }

    fn children_mut(&mut self) -> &mut Vec<SymptomRecord> {
        &mut self.records
    }

    fn child_id(child: &SymptomRecord) -> &str {
        &child.id
    }

    fn child_timestamp(child: &SymptomRecord) -> &str {
        &child.timestamp
    }

    fn create_child(id: String, data: NewSymptomRecord) -> SymptomRecord {
        data.into_record(id)
    }
}

// --- Prescription ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_date: Option<String>,
    pub created_date: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewPrescription {
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionPatch {
    pub text: Option<String>,
    pub is_archived: Option<bool>,
    pub archived_date: Option<Option<String>>,
}

impl Record for Prescription {
    const KEY_PREFIX: &'static str = "prescriptions";
    const INSERT: InsertPolicy = InsertPolicy::Prepend;
    const NOUN: &'static str = "prescription";
    const PLURAL: &'static str = "prescriptions";

    type New = NewPrescription;
    type Patch = PrescriptionPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(id: String, data: NewPrescription) -> Self {
        Prescription {
            id,
            text: data.text.trim().to_string(),
            is_archived: false,
            archived_date: None,
            created_date: now_timestamp(),
        }
    }

    fn apply(&mut self, patch: PrescriptionPatch) {
        if let Some(text) = patch.text {
            self.text = text;
        }
        if let Some(is_archived) = patch.is_archived {
            self.is_archived = is_archived;
        }
        if let Some(archived_date) = patch.archived_date {
            self.archived_date = archived_date;
        }
    }
}

impl ScopedStore<Prescription> {
    /// Mark a prescription archived as of now. `Ok(false)` if it does not exist.
    pub fn archive(&mut self, id: &str) -> Result<bool, StoreError> {
        self.modify_one("archive prescription", id, |p| {
            p.is_archived = true;
            p.archived_date = Some(now_timestamp());
        })
    }

    #[must_use]
    pub fn active(&self) -> Vec<&Prescription> {
        self.items().iter().filter(|p| !p.is_archived).collect()
    }

    #[must_use]
    pub fn archived(&self) -> Vec<&Prescription> {
        self.items().iter().filter(|p| p.is_archived).collect()
    }
}

// --- Chat ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Message text, or an image URI for image messages.
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewChatMessage {
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatMessagePatch {
    pub content: Option<String>,
}

impl Record for ChatMessage {
    const KEY_PREFIX: &'static str = "chatMessages";
    const INSERT: InsertPolicy = InsertPolicy::Append;
    const NOUN: &'static str = "message";
    const PLURAL: &'static str = "messages";

    type New = NewChatMessage;
    type Patch = ChatMessagePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn create(id: String, data: NewChatMessage) -> Self {
        ChatMessage {
            id,
            kind: data.kind,
            content: data.content,
            timestamp: now_timestamp(),
        }
    }

    fn apply(&mut self, patch: ChatMessagePatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
    }
}

// --- Validation ---
//
// Run before any store call so a bad form never reaches storage.

/// Trimmed, non-empty name. `what` names the field in the message
/// ("medication name").
pub fn validate_name(what: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("Please enter a {what}");
    }
    Ok(trimmed.to_string())
}

pub fn validate_weight(weight: f64) -> Result<f64> {
    if !weight.is_finite() || weight <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(weight)
}

pub fn validate_severity(severity: i64) -> Result<u8> {
    match u8::try_from(severity) {
        Ok(s) if s <= MAX_SEVERITY => Ok(s),
        _ => bail!("Severity must be between 0 and {MAX_SEVERITY} (got {severity})"),
    }
}

/// Accepts anything of the shape `local@domain.tld`; returns it trimmed and
/// lowercased.
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        bail!("Invalid email address '{email}'");
    }
    Ok(email)
}
