use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::StoreError;
use crate::identity::{IdentityProvider, Session, SessionEvent, User};
use crate::models::{
    ChatMessage, DietItem, MedicationKind, Medication, MedicationRecord, MessageKind,
    NewChatMessage, NewDietItem, NewMedication, NewMedicationRecord, NewPrescription, NewSymptom,
    NewSymptomRecord, Prescription, Symptom, SymptomRecord, validate_email, validate_name,
    validate_severity, validate_weight,
};
use crate::store::ScopedStore;
use crate::toast::{ToastKind, Toaster};

const RESET_TOAST_DURATION: Duration = Duration::from_millis(4000);

/// Application root: owns the database, the session and one store per
/// record domain, and keeps the stores pointed at the signed-in user.
///
/// Build it once at start-up and pass references to whatever needs a store.
pub struct CareService {
    db: Rc<Database>,
    session: Session,
    session_events: Receiver<SessionEvent>,
    toaster: Toaster,
    diet: ScopedStore<DietItem>,
    medications: ScopedStore<Medication>,
    symptoms: ScopedStore<Symptom>,
    prescriptions: ScopedStore<Prescription>,
    chat: ScopedStore<ChatMessage>,
}

impl CareService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Self::with_database(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Self::with_database(db)
    }

    /// Wire up the stores and restore whatever session the database holds.
    pub fn with_database(db: Database) -> Result<Self> {
        let db = Rc::new(db);
        let mut session = Session::new();
        let session_events = session.subscribe();

        let mut service = CareService {
            diet: ScopedStore::new(db.clone()),
            medications: ScopedStore::new(db.clone()),
            symptoms: ScopedStore::new(db.clone()),
            prescriptions: ScopedStore::new(db.clone()),
            chat: ScopedStore::new(db.clone()),
            db,
            session,
            session_events,
            toaster: Toaster::new(),
        };

        let restored = service.db.load_session()?;
        service.session.restore(restored);
        service.sync_session();
        Ok(service)
    }

    /// Forward pending session events to every store.
    fn sync_session(&mut self) {
        while let Ok(event) = self.session_events.try_recv() {
            debug!(?event, "session changed");
            let user_id = event.user_id();
            self.diet.set_user(user_id);
            self.medications.set_user(user_id);
            self.symptoms.set_user(user_id);
            self.prescriptions.set_user(user_id);
            self.chat.set_user(user_id);
        }
    }

    // --- Session ---

    pub fn sign_up(&mut self, email: &str, name: Option<&str>) -> Result<User> {
        let email = validate_email(email)?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let user = self.db.create_account(&email, name)?;
        info!(user_id = %user.id, "account created");
        self.start_session(user.clone())?;
        Ok(user)
    }

    pub fn sign_in(&mut self, email: &str) -> Result<User> {
        let email = validate_email(email)?;
        let user = self
            .db
            .find_account(&email)?
            .with_context(|| format!("No account for '{email}'. Sign up first"))?;
        self.start_session(user.clone())?;
        Ok(user)
    }

    fn start_session(&mut self, user: User) -> Result<()> {
        self.db.save_session(Some(&user.id))?;
        self.session.sign_in(user);
        self.sync_session();
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.db.save_session(None)?;
        self.session.sign_out();
        self.sync_session();
        Ok(())
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.session.current_user()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    // --- Stores ---

    #[must_use]
    pub fn diet(&self) -> &ScopedStore<DietItem> {
        &self.diet
    }

    pub fn diet_mut(&mut self) -> &mut ScopedStore<DietItem> {
        &mut self.diet
    }

    #[must_use]
    pub fn medications(&self) -> &ScopedStore<Medication> {
        &self.medications
    }

    pub fn medications_mut(&mut self) -> &mut ScopedStore<Medication> {
        &mut self.medications
    }

    #[must_use]
    pub fn symptoms(&self) -> &ScopedStore<Symptom> {
        &self.symptoms
    }

    pub fn symptoms_mut(&mut self) -> &mut ScopedStore<Symptom> {
        &mut self.symptoms
    }

    #[must_use]
    pub fn prescriptions(&self) -> &ScopedStore<Prescription> {
        &self.prescriptions
    }

    pub fn prescriptions_mut(&mut self) -> &mut ScopedStore<Prescription> {
        &mut self.prescriptions
    }

    #[must_use]
    pub fn chat(&self) -> &ScopedStore<ChatMessage> {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ScopedStore<ChatMessage> {
        &mut self.chat
    }

    #[must_use]
    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    // --- Validated entry points ---

    pub fn log_food(
        &mut self,
        name: &str,
        weight: f64,
        timestamp: Option<String>,
        image_uri: Option<String>,
    ) -> Result<DietItem> {
        let name = validate_name("food name", name)?;
        let weight = validate_weight(weight)?;
        Ok(self.diet.add(NewDietItem {
            name,
            weight,
            timestamp,
            image_uri,
        })?)
    }

    /// Add a medication with its first record marked taken or missed.
    pub fn add_medication(
        &mut self,
        name: &str,
        kind: MedicationKind,
        taken: bool,
        timestamp: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Medication> {
        let name = validate_name("medication name", name)?;
        Ok(self.medications.add(NewMedication {
            name,
            kind,
            records: vec![NewMedicationRecord::taken_or_missed(
                taken, timestamp, image_uri,
            )],
        })?)
    }

    /// `Ok(None)` when no medication has `medication_id`.
    pub fn log_dose(
        &mut self,
        medication_id: &str,
        dosage: &str,
        notes: Option<String>,
        timestamp: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Option<MedicationRecord>> {
        let dosage = validate_name("dosage", dosage)?;
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Ok(self.medications.add_child(
            medication_id,
            NewMedicationRecord {
                id: None,
                dosage,
                timestamp,
                image_uri,
                notes,
            },
        )?)
    }

    pub fn add_symptom(
        &mut self,
        name: &str,
        severity: i64,
        timestamp: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Symptom> {
        let name = validate_name("symptom name", name)?;
        let severity = validate_severity(severity)?;
        Ok(self.symptoms.add(NewSymptom {
            name,
            records: vec![NewSymptomRecord {
                id: None,
                severity,
                timestamp,
                image_uri,
            }],
        })?)
    }

    /// `Ok(None)` when no symptom has `symptom_id`.
    pub fn log_severity(
        &mut self,
        symptom_id: &str,
        severity: i64,
        timestamp: Option<String>,
        image_uri: Option<String>,
    ) -> Result<Option<SymptomRecord>> {
        let severity = validate_severity(severity)?;
        Ok(self.symptoms.add_child(
            symptom_id,
            NewSymptomRecord {
                id: None,
                severity,
                timestamp,
                image_uri,
            },
        )?)
    }

    pub fn add_prescription(&mut self, text: &str) -> Result<Prescription> {
        let text = validate_name("prescription", text)?;
        Ok(self.prescriptions.add(NewPrescription { text })?)
    }

    pub fn send_message(&mut self, kind: MessageKind, content: &str) -> Result<ChatMessage> {
        let content = validate_name("message", content)?;
        Ok(self.chat.add(NewChatMessage { kind, content })?)
    }

    /// Clear every domain for the current user and report the outcome as a
    /// toast. Every store is attempted; the first failure is returned.
    pub fn reset_all_data(&mut self) -> Result<(), StoreError> {
        let results = [
            self.chat.clear(),
            self.diet.clear(),
            self.medications.clear(),
            self.prescriptions.clear(),
            self.symptoms.clear(),
        ];
        match results.into_iter().find_map(Result::err) {
            None => {
                self.toaster.show_for(
                    "All data has been successfully cleared",
                    ToastKind::Success,
                    RESET_TOAST_DURATION,
                );
                Ok(())
            }
            Some(err) => {
                self.toaster.show_for(
                    "Failed to clear data. Please try again.",
                    ToastKind::Error,
                    RESET_TOAST_DURATION,
                );
                Err(err)
            }
        }
    }
}
