//! Every change to the meet goes through [`MeetService`].
//!
//! Mutations take one command lock, commit their writes in one transaction,
//! then publish on the hub while still holding it. Broadcast order therefore
//! matches the order changes hit the database, whether they came in over
//! HTTP or the channel. Nothing is published for a change that did not
//! commit.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use meet_link::ChannelEvent;
use meet_link::protocol::{self, SyncPayload};
use meet_model::classes::{primary_age_class, primary_weight_class};
use meet_model::export::{lifters_csv, lifts_csv};
use meet_model::lift::generate_attempts;
use meet_model::lifter::age_on;
use meet_model::{
    AgeClass, DisplayMode, JudgePanel, JudgeSeat, Lift, LiftType, Lifter, MeetError, MeetState,
    NewAgeClass, NewLifter, NewWeightClass, Verdict, WeightClass,
};

use crate::export::MeetExport;
use crate::hub::EventHub;
use crate::models::MeetStateUpdate;
use crate::repository::MeetRepository;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Meet(#[from] MeetError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Meet(e) => e.error_code(),
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// What a client needs to join the channel.
pub struct Subscription {
    pub sync: ChannelEvent,
    pub events: broadcast::Receiver<Arc<ChannelEvent>>,
}

pub struct MeetService {
    repo: MeetRepository,
    hub: Arc<EventHub>,
    judges: JudgePanel,
    meet_date: Option<NaiveDate>,
    commands: Mutex<()>,
}

impl MeetService {
    pub fn new(
        repo: MeetRepository,
        hub: Arc<EventHub>,
        judges: JudgePanel,
        meet_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            repo,
            hub,
            judges,
            meet_date,
            commands: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    fn today(&self) -> NaiveDate {
        self.meet_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn publish<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<()> {
        self.hub.publish(name, payload)?;
        Ok(())
    }

    async fn require_state(&self) -> Result<MeetState> {
        Ok(self
            .repo
            .get_meet_state()
            .await?
            .ok_or(MeetError::MeetStateMissing)?)
    }

    // ── channel ─────────────────────────────────────────────────────────

    /// Subscribe to broadcasts and build the `sync` that goes first.
    ///
    /// Runs under the command lock, so the snapshot reflects exactly the
    /// events up to the `seq` it carries.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let _guard = self.commands.lock().await;
        let meet_state = self.require_state().await?;
        let active_lift = match meet_state.current_active_lift_id {
            Some(id) => self.repo.get_lift(id).await?,
            None => None,
        };
        let (head, events) = self.hub.subscribe();
        let payload = SyncPayload {
            meet_state,
            active_lift,
            epoch: self.hub.epoch().to_string(),
        };
        let sync = ChannelEvent::from_payload(protocol::SYNC, &payload)?.with_seq(head);
        Ok(Subscription { sync, events })
    }

    // ── meet state ──────────────────────────────────────────────────────

    pub async fn meet_state(&self) -> Result<MeetState> {
        self.require_state().await
    }

    pub async fn current_lift(&self) -> Result<Option<Lift>> {
        let state = self.require_state().await?;
        match state.current_active_lift_id {
            Some(id) => Ok(self.repo.get_lift(id).await?),
            None => Ok(None),
        }
    }

    pub async fn update_meet_state(&self, update: MeetStateUpdate) -> Result<MeetState> {
        let _guard = self.commands.lock().await;
        let mut state = self.require_state().await?;
        let mut released = None;
        let mut cleared = false;

        if let Some(lift_type) = update.current_lift_type {
            let previous = state.set_lift_type(lift_type);
            cleared = previous.is_some();
            released = self.release(previous).await?;
        }
        if let Some(mode) = update.display_mode {
            state.display_mode = mode;
        }

        let changed: Vec<&Lift> = released.iter().collect();
        self.repo.save_platform(&changed, &state).await?;
        self.publish_state_change(&state, released.as_ref(), cleared)?;
        info!(
            lift_type = %state.current_lift_type,
            attempt = state.current_attempt_number,
            display = %state.display_mode,
            "meet state updated"
        );
        Ok(state)
    }

    pub async fn set_lift_type(&self, lift_type: LiftType) -> Result<MeetState> {
        self.update_meet_state(MeetStateUpdate {
            current_lift_type: Some(lift_type),
            display_mode: None,
        })
        .await
    }

    pub async fn set_display_mode(&self, mode: DisplayMode) -> Result<MeetState> {
        self.update_meet_state(MeetStateUpdate {
            current_lift_type: None,
            display_mode: Some(mode),
        })
        .await
    }

    pub async fn advance_attempt(&self) -> Result<MeetState> {
        let _guard = self.commands.lock().await;
        let mut state = self.require_state().await?;
        let previous = state.advance_attempt()?;
        let released = self.release(previous).await?;

        let changed: Vec<&Lift> = released.iter().collect();
        self.repo.save_platform(&changed, &state).await?;
        self.publish_state_change(&state, released.as_ref(), previous.is_some())?;
        info!(
            lift_type = %state.current_lift_type,
            attempt = state.current_attempt_number,
            "advanced attempt"
        );
        Ok(state)
    }

    /// The lift that was on the platform, returned to the queue. Completed
    /// lifts stay completed and give `None`. Nothing is written; the caller
    /// saves it with the meet state.
    async fn release(&self, lift_id: Option<i64>) -> Result<Option<Lift>> {
        let Some(id) = lift_id else {
            return Ok(None);
        };
        let Some(mut lift) = self.repo.get_lift(id).await? else {
            return Ok(None);
        };
        if !lift.deactivate() {
            return Ok(None);
        }
        debug!(lift_id = id, "returning lift to the queue");
        Ok(Some(lift))
    }

    fn publish_state_change(
        &self,
        state: &MeetState,
        released: Option<&Lift>,
        cleared: bool,
    ) -> Result<()> {
        if let Some(lift) = released {
            self.publish(protocol::LIFT_UPDATED, lift)?;
        }
        self.publish(protocol::MEET_STATE_UPDATED, state)?;
        if cleared {
            self.publish(protocol::ACTIVE_LIFT_CHANGED, &None::<Lift>)?;
        }
        Ok(())
    }

    // ── active lift ─────────────────────────────────────────────────────

    /// Put a lift on the platform. With no id, the next pending lift of the
    /// current round is chosen; when none is left the platform is cleared
    /// and `None` is returned.
    pub async fn set_active_lift(&self, lift_id: Option<i64>) -> Result<Option<Lift>> {
        let _guard = self.commands.lock().await;
        let mut state = self.require_state().await?;

        let candidate = match lift_id {
            Some(id) => Some(
                self.repo
                    .get_lift(id)
                    .await?
                    .ok_or(MeetError::LiftNotFound(id))?,
            ),
            None => {
                let round = self
                    .repo
                    .list_round(state.current_lift_type, state.current_attempt_number)
                    .await?;
                state.next_pending(&round).cloned()
            }
        };

        let Some(mut lift) = candidate else {
            let released = self.release(state.current_active_lift_id.take()).await?;
            let changed: Vec<&Lift> = released.iter().collect();
            self.repo.save_platform(&changed, &state).await?;
            if let Some(prev) = &released {
                self.publish(protocol::LIFT_UPDATED, prev)?;
            }
            self.publish(protocol::ACTIVE_LIFT_CHANGED, &None::<Lift>)?;
            info!(
                lift_type = %state.current_lift_type,
                attempt = state.current_attempt_number,
                "no pending lifts left; platform cleared"
            );
            return Ok(None);
        };

        lift.activate()?;
        let released = self.release(state.current_active_lift_id).await?;
        state.current_active_lift_id = Some(lift.id);
        let mut changed: Vec<&Lift> = released.iter().collect();
        changed.push(&lift);
        self.repo.save_platform(&changed, &state).await?;

        if let Some(prev) = &released {
            self.publish(protocol::LIFT_UPDATED, prev)?;
        }
        self.publish(protocol::ACTIVE_LIFT_CHANGED, &Some(&lift))?;
        info!(
            lift_id = lift.id,
            lifter = %lift.lifter_name,
            weight = lift.weight_lifted,
            "lift on the platform"
        );
        Ok(Some(lift))
    }

    // ── judging ─────────────────────────────────────────────────────────

    pub fn login_judge(&self, pin: &str) -> Result<JudgeSeat> {
        Ok(self.judges.seat_for(pin)?)
    }

    pub async fn score_lift(&self, lift_id: i64, judge_pin: &str, good: bool) -> Result<Lift> {
        let _guard = self.commands.lock().await;
        let mut lift = self
            .repo
            .get_lift(lift_id)
            .await?
            .ok_or(MeetError::LiftNotFound(lift_id))?;
        let seat = self.judges.seat_for(judge_pin)?;

        let verdict = lift.record_decision(seat, good);
        self.repo.save_lift(&lift).await?;
        self.publish(protocol::LIFT_UPDATED, &lift)?;

        match verdict {
            Verdict::Undecided => debug!(lift_id, judge = %seat, good, "decision recorded"),
            decided => info!(lift_id, judge = %seat, verdict = ?decided, "lift decided"),
        }
        Ok(lift)
    }

    pub async fn list_lifts(&self) -> Result<Vec<Lift>> {
        Ok(self.repo.list_lifts().await?)
    }

    // ── lifters ─────────────────────────────────────────────────────────

    pub async fn list_lifters(&self) -> Result<Vec<Lifter>> {
        Ok(self.repo.list_lifters().await?)
    }

    /// Register a lifter: assign primary classes and plan three attempts for
    /// each lift with an opener.
    pub async fn create_lifter(&self, new: NewLifter) -> Result<Lifter> {
        new.validate()?;
        let _guard = self.commands.lock().await;
        if self.repo.lifter_id_number_exists(&new.lifter_id_number).await? {
            return Err(MeetError::DuplicateLifterIdNumber(new.lifter_id_number).into());
        }

        let age = age_on(new.birth_date, self.today());
        let weight_classes = self.repo.list_weight_classes().await?;
        let age_classes = self.repo.list_age_classes().await?;
        let weight_class = primary_weight_class(&weight_classes, new.actual_weight, new.gender);
        let age_class = primary_age_class(&age_classes, age);
        let lifts = generate_attempts(|t| new.opener(t));

        let id = self
            .repo
            .create_lifter(
                &new,
                age,
                weight_class.map(|c| c.id),
                age_class.map(|c| c.id),
                &lifts,
            )
            .await?;
        let lifter = self.load_lifter(id).await?;
        self.publish(protocol::LIFTER_ADDED, &lifter)?;
        info!(
            lifter_id = id,
            name = %lifter.name,
            lifts = lifts.len(),
            "lifter registered"
        );
        Ok(lifter)
    }

    async fn load_lifter(&self, id: i64) -> Result<Lifter> {
        Ok(self
            .repo
            .get_lifter(id)
            .await?
            .ok_or(MeetError::LifterNotFound(id))?)
    }

    pub async fn add_additional_weight_class(&self, lifter_id: i64, class_id: i64) -> Result<Lifter> {
        let _guard = self.commands.lock().await;
        self.load_lifter(lifter_id).await?;
        self.repo
            .get_weight_class(class_id)
            .await?
            .ok_or(MeetError::WeightClassNotFound(class_id))?;
        if !self.repo.add_additional_weight_class(lifter_id, class_id).await? {
            return Err(MeetError::AlreadyAssigned { what: "weight class" }.into());
        }
        self.lifter_updated(lifter_id).await
    }

    pub async fn remove_additional_weight_class(
        &self,
        lifter_id: i64,
        class_id: i64,
    ) -> Result<Lifter> {
        let _guard = self.commands.lock().await;
        self.load_lifter(lifter_id).await?;
        if !self.repo.remove_additional_weight_class(lifter_id, class_id).await? {
            return Err(MeetError::NotAssigned { what: "weight class" }.into());
        }
        self.lifter_updated(lifter_id).await
    }

    pub async fn add_additional_age_class(&self, lifter_id: i64, class_id: i64) -> Result<Lifter> {
        let _guard = self.commands.lock().await;
        self.load_lifter(lifter_id).await?;
        self.repo
            .get_age_class(class_id)
            .await?
            .ok_or(MeetError::AgeClassNotFound(class_id))?;
        if !self.repo.add_additional_age_class(lifter_id, class_id).await? {
            return Err(MeetError::AlreadyAssigned { what: "age class" }.into());
        }
        self.lifter_updated(lifter_id).await
    }

    pub async fn remove_additional_age_class(&self, lifter_id: i64, class_id: i64) -> Result<Lifter> {
        let _guard = self.commands.lock().await;
        self.load_lifter(lifter_id).await?;
        if !self.repo.remove_additional_age_class(lifter_id, class_id).await? {
            return Err(MeetError::NotAssigned { what: "age class" }.into());
        }
        self.lifter_updated(lifter_id).await
    }

    async fn lifter_updated(&self, lifter_id: i64) -> Result<Lifter> {
        let lifter = self.load_lifter(lifter_id).await?;
        self.publish(protocol::LIFTER_UPDATED, &lifter)?;
        Ok(lifter)
    }

    // ── classes ─────────────────────────────────────────────────────────

    pub async fn list_weight_classes(&self) -> Result<Vec<WeightClass>> {
        Ok(self.repo.list_weight_classes().await?)
    }

    pub async fn list_age_classes(&self) -> Result<Vec<AgeClass>> {
        Ok(self.repo.list_age_classes().await?)
    }

    pub async fn create_weight_class(&self, new: NewWeightClass) -> Result<WeightClass> {
        new.validate()?;
        let _guard = self.commands.lock().await;
        if self.repo.weight_class_name_exists(&new.name).await? {
            return Err(MeetError::DuplicateClassName(new.name).into());
        }
        let class = self.repo.create_weight_class(&new).await?;
        self.publish(protocol::WEIGHT_CLASS_UPDATED, &class)?;
        self.publish(protocol::LIFTER_UPDATED, &None::<Lifter>)?;
        info!(class_id = class.id, name = %class.name, "weight class added");
        Ok(class)
    }

    pub async fn delete_weight_class(&self, id: i64) -> Result<()> {
        let _guard = self.commands.lock().await;
        if !self.repo.delete_weight_class(id).await? {
            return Err(MeetError::WeightClassNotFound(id).into());
        }
        self.publish(protocol::WEIGHT_CLASS_UPDATED, &None::<WeightClass>)?;
        self.publish(protocol::LIFTER_UPDATED, &None::<Lifter>)?;
        info!(class_id = id, "weight class deleted");
        Ok(())
    }

    pub async fn create_age_class(&self, new: NewAgeClass) -> Result<AgeClass> {
        new.validate()?;
        let _guard = self.commands.lock().await;
        if self.repo.age_class_name_exists(&new.name).await? {
            return Err(MeetError::DuplicateClassName(new.name).into());
        }
        let class = self.repo.create_age_class(&new).await?;
        self.publish(protocol::AGE_CLASS_UPDATED, &class)?;
        self.publish(protocol::LIFTER_UPDATED, &None::<Lifter>)?;
        info!(class_id = class.id, name = %class.name, "age class added");
        Ok(class)
    }

    pub async fn delete_age_class(&self, id: i64) -> Result<()> {
        let _guard = self.commands.lock().await;
        if !self.repo.delete_age_class(id).await? {
            return Err(MeetError::AgeClassNotFound(id).into());
        }
        self.publish(protocol::AGE_CLASS_UPDATED, &None::<AgeClass>)?;
        self.publish(protocol::LIFTER_UPDATED, &None::<Lifter>)?;
        info!(class_id = id, "age class deleted");
        Ok(())
    }

    // ── export ──────────────────────────────────────────────────────────

    pub async fn export(&self) -> Result<MeetExport> {
        let lifters = self.repo.list_lifters().await?;
        let lifts = self.repo.list_lifts().await?;
        Ok(MeetExport::new(lifters_csv(&lifters), lifts_csv(&lifts)))
    }
}
