//! The reconciler: diff, announce, persist.
//!
//! A run fetches the observed collection, loads the known one, diffs them
//! and applies each change in order. Applying a change means announcing it
//! (unless the noise policy silences it) and then persisting it. A failed
//! announcement aborts the run before anything is persisted; a failed
//! persist aborts the run after the announcement went out. Nothing is
//! retried or rolled back.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
  announce::{Announce, Announcer, Directory, random_disease},
  change::{Change, ChangeKind},
  diff::diff,
  entity::{Entity, EntityKind},
  error::{Error, Operation, Result},
  policy::Policy,
  store::{EntityStore, Notifier, Source},
};

// ─── Report ──────────────────────────────────────────────────────────────────

/// Tally of the changes applied by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
  pub kind:       EntityKind,
  pub created:    usize,
  pub changed:    usize,
  pub removed:    usize,
  pub restored:   usize,
  pub gone:       usize,
  /// Changes persisted without an announcement.
  pub suppressed: usize,
}

impl RunReport {
  pub fn new(kind: EntityKind) -> Self {
    Self { kind, created: 0, changed: 0, removed: 0, restored: 0, gone: 0, suppressed: 0 }
  }

  pub fn total(&self) -> usize {
    self.created + self.changed + self.removed + self.restored + self.gone
  }

  fn record(&mut self, kind: ChangeKind) {
    match kind {
      ChangeKind::Created => self.created += 1,
      ChangeKind::FieldChanged(_) => self.changed += 1,
      ChangeKind::Removed => self.removed += 1,
      ChangeKind::Restored => self.restored += 1,
      ChangeKind::Gone => self.gone += 1,
    }
  }
}

impl fmt::Display for RunReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}: {} created, {} changed, {} removed, {} restored, {} gone ({} silent)",
      self.kind.plural(),
      self.created,
      self.changed,
      self.removed,
      self.restored,
      self.gone,
      self.suppressed
    )
  }
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Drives reconciliation runs against one store and one notifier.
pub struct Reconciler<S, N> {
  store:    S,
  notifier: N,
  policy:   Arc<Policy>,
  clock:    fn() -> DateTime<Utc>,
  disease:  fn() -> &'static str,
}

impl<S, N: Notifier> Reconciler<S, N> {
  pub fn new(store: S, notifier: N, policy: Arc<Policy>) -> Self {
    Self { store, notifier, policy, clock: Utc::now, disease: random_disease }
  }

  /// Replace the source of the run timestamp.
  pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
    self.clock = clock;
    self
  }

  /// Replace the cause-of-death picker used in removal messages.
  pub fn with_disease(mut self, disease: fn() -> &'static str) -> Self {
    self.disease = disease;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn notifier(&self) -> &N { &self.notifier }

  /// One full fetch–diff–announce–persist cycle for entity variant `E`.
  pub async fn run<E, F>(&self, source: &F) -> Result<RunReport>
  where
    E: Announce,
    S: EntityStore<E>,
    F: Source<E>,
  {
    let observed = observe(source).await?;
    self.run_observed(observed).await
  }

  /// Like [`run`](Self::run), for an observed collection fetched by the
  /// caller (the org chart is flattened before the run starts).
  pub async fn run_observed<E>(&self, observed: Vec<E>) -> Result<RunReport>
  where
    E: Announce,
    S: EntityStore<E>,
  {
    let known = self.load_known::<E>().await?;
    self.reconcile(known, observed).await
  }

  /// Diff two snapshots and apply every resulting change, in order.
  pub async fn reconcile<E>(&self, known: Vec<E>, observed: Vec<E>) -> Result<RunReport>
  where
    E: Announce,
    S: EntityStore<E>,
  {
    let directory = Directory::build(&known, &observed);
    let changes = diff(&known, &observed, &self.policy.tracking);
    let now = (self.clock)();

    info!(
      kind = %E::KIND,
      known = known.len(),
      observed = observed.len(),
      changes = changes.len(),
      "reconciling"
    );

    let announcer = Announcer {
      directory: &directory,
      noise:     &self.policy.noise,
      disease:   self.disease,
    };

    let mut report = RunReport::new(E::KIND);
    for change in changes {
      self.apply(change.settle(now), &announcer, &mut report).await?;
    }

    info!(%report, "reconciled");
    Ok(report)
  }

  /// Populate an empty store from the source without announcing anything.
  ///
  /// Fails with [`Error::AlreadyInitialized`] if the store holds any record
  /// of this variant.
  pub async fn initialize<E, F>(&self, source: &F) -> Result<usize>
  where
    E: Entity,
    S: EntityStore<E>,
    F: Source<E>,
  {
    self.ensure_empty::<E>().await?;
    let observed = observe(source).await?;
    self.seed(observed).await
  }

  /// Fail with [`Error::AlreadyInitialized`] unless the store holds no
  /// record of variant `E`.
  pub async fn ensure_empty<E>(&self) -> Result<()>
  where
    E: Entity,
    S: EntityStore<E>,
  {
    let known = self.load_known::<E>().await?;
    if !known.is_empty() {
      return Err(Error::AlreadyInitialized { kind: E::KIND, count: known.len() });
    }
    Ok(())
  }

  /// Persist every entity as a silent creation. Does not check emptiness;
  /// pair with [`ensure_empty`](Self::ensure_empty).
  pub async fn seed<E>(&self, observed: Vec<E>) -> Result<usize>
  where
    E: Entity,
    S: EntityStore<E>,
  {
    let now = (self.clock)();
    let count = observed.len();

    for entity in observed {
      let change = Change::Created(entity).settle(now);
      let entity = change.entity();
      self
        .store
        .persist(entity)
        .await
        .map_err(|e| Error::store(Operation::Persist(ChangeKind::Created), Some(entity.id()), e))?;
    }

    info!(kind = %E::KIND, count, "initialized");
    Ok(count)
  }

  async fn load_known<E>(&self) -> Result<Vec<E>>
  where
    E: Entity,
    S: EntityStore<E>,
  {
    self
      .store
      .load_all()
      .await
      .map_err(|e| Error::store(Operation::LoadKnown(E::KIND), None, e))
  }

  async fn apply<E>(
    &self,
    change: Change<E>,
    announcer: &Announcer<'_>,
    report: &mut RunReport,
  ) -> Result<()>
  where
    E: Announce,
    S: EntityStore<E>,
  {
    let kind = change.kind();
    let entity = change.entity();
    let id = entity.id();

    match announcer.announce(&change) {
      Some(message) => {
        self
          .notifier
          .notify(&message)
          .await
          .map_err(|e| Error::notify(Operation::Announce(kind), Some(id), e))?;
      }
      None => {
        debug!(%kind, id, "change applied silently");
        report.suppressed += 1;
      }
    }

    match &change {
      Change::Gone(_) => self
        .store
        .delete(id)
        .await
        .map_err(|e| Error::store(Operation::Delete, Some(id), e))?,
      _ => self
        .store
        .persist(entity)
        .await
        .map_err(|e| Error::store(Operation::Persist(kind), Some(id), e))?,
    }

    info!(entity = %E::KIND, id, change = %kind, "applied");
    report.record(kind);
    Ok(())
  }
}

async fn observe<E: Entity, F: Source<E>>(source: &F) -> Result<Vec<E>> {
  source
    .observe()
    .await
    .map_err(|e| Error::transport(Operation::FetchObserved(E::KIND), None, e))
}

#[cfg(test)]
mod tests {
  use std::{fmt, sync::Mutex};

  use chrono::TimeZone;

  use super::*;
  use crate::{
    announce::Message,
    entity::{Emoji, Employee, Field, User},
    error::ErrorKind,
    policy::TrackingPolicy,
  };

  // ─── Fakes ──────────────────────────────────────────────────────────────

  #[derive(Debug)]
  struct Boom(&'static str);

  impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
  }

  impl std::error::Error for Boom {}

  /// Records every side effect, in order, across store and notifier.
  #[derive(Default)]
  struct Journal {
    log: Mutex<Vec<String>>,
  }

  impl Journal {
    fn push(&self, entry: String) { self.log.lock().unwrap().push(entry); }

    fn entries(&self) -> Vec<String> { self.log.lock().unwrap().clone() }
  }

  #[derive(Default)]
  struct MemoryStore<'j> {
    users:       Mutex<Vec<User>>,
    emojis:      Mutex<Vec<Emoji>>,
    employees:   Mutex<Vec<Employee>>,
    journal:     Option<&'j Journal>,
    fail_writes: bool,
  }

  fn upsert<E: Entity>(rows: &mut Vec<E>, entity: &E) {
    match rows.iter_mut().find(|r| r.id() == entity.id()) {
      Some(row) => *row = entity.clone(),
      None => rows.push(entity.clone()),
    }
  }

  macro_rules! memory_store {
    ($entity:ty, $table:ident) => {
      impl EntityStore<$entity> for MemoryStore<'_> {
        type Error = Boom;

        async fn load_all(&self) -> Result<Vec<$entity>, Boom> {
          Ok(self.$table.lock().unwrap().clone())
        }

        async fn persist(&self, entity: &$entity) -> Result<(), Boom> {
          if let Some(journal) = self.journal {
            journal.push(format!("persist {}", entity.id()));
          }
          if self.fail_writes {
            return Err(Boom("disk full"));
          }
          upsert(&mut self.$table.lock().unwrap(), entity);
          Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), Boom> {
          if let Some(journal) = self.journal {
            journal.push(format!("delete {id}"));
          }
          if self.fail_writes {
            return Err(Boom("disk full"));
          }
          self.$table.lock().unwrap().retain(|r| r.id() != id);
          Ok(())
        }
      }
    };
  }

  memory_store!(User, users);
  memory_store!(Emoji, emojis);
  memory_store!(Employee, employees);

  #[derive(Default)]
  struct RecordingNotifier<'j> {
    sent:    Mutex<Vec<Message>>,
    journal: Option<&'j Journal>,
    fail:    bool,
  }

  impl RecordingNotifier<'_> {
    fn texts(&self) -> Vec<String> {
      self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }
  }

  impl Notifier for RecordingNotifier<'_> {
    type Error = Boom;

    async fn notify(&self, message: &Message) -> Result<(), Boom> {
      if let Some(journal) = self.journal {
        journal.push(format!("notify {}", message.text));
      }
      if self.fail {
        return Err(Boom("channel archived"));
      }
      self.sent.lock().unwrap().push(message.clone());
      Ok(())
    }
  }

  struct FixedSource<E>(Vec<E>);

  impl<E: Entity> Source<E> for FixedSource<E> {
    type Error = Boom;

    async fn observe(&self) -> Result<Vec<E>, Boom> { Ok(self.0.clone()) }
  }

  struct DownSource;

  impl<E: Entity> Source<E> for DownSource {
    type Error = Boom;

    async fn observe(&self) -> Result<Vec<E>, Boom> { Err(Boom("503")) }
  }

  fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  fn typhoid() -> &'static str { "Typhoid Fever" }

  fn reconciler<'j>(
    store: MemoryStore<'j>,
    notifier: RecordingNotifier<'j>,
    policy: Policy,
  ) -> Reconciler<MemoryStore<'j>, RecordingNotifier<'j>> {
    Reconciler::new(store, notifier, Arc::new(policy))
      .with_clock(now)
      .with_disease(typhoid)
  }

  fn zach() -> User {
    User {
      real_name: "Zach Taylor".into(),
      display_name: "zt".into(),
      created_at: Some(now() - chrono::Duration::days(10)),
      ..User::new("z", "zach")
    }
  }

  // ─── Runs ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn new_user_is_announced_and_stored() {
    let r = reconciler(MemoryStore::default(), RecordingNotifier::default(), Policy::default());
    let source = FixedSource(vec![User { created_at: None, ..zach() }]);

    let report = r.run(&source).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.total(), 1);
    assert_eq!(
      r.notifier().texts(),
      vec!["Congratulations, you have a beautiful new baby named Zach Taylor"]
    );
    let users = r.store().users.lock().unwrap().clone();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].created_at, Some(now()));
  }

  #[tokio::test]
  async fn unchanged_snapshot_does_nothing() {
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let report = r.run(&FixedSource(vec![zach()])).await.unwrap();

    assert_eq!(report.total(), 0);
    assert!(r.notifier().texts().is_empty());
  }

  #[tokio::test]
  async fn removal_tombstones_the_record() {
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let observed = User { deleted: true, ..zach() };
    let report = r.run(&FixedSource(vec![observed])).await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(r.notifier().texts(), vec!["After 10 days, Zach Taylor died of Typhoid Fever"]);
    let stored = r.store().users.lock().unwrap()[0].clone();
    assert!(stored.deleted);
    assert_eq!(stored.deleted_at, Some(now()));
  }

  #[tokio::test]
  async fn restoration_clears_the_tombstone() {
    let dead = User { deleted: true, deleted_at: Some(now()), ..zach() };
    let store = MemoryStore { users: Mutex::new(vec![dead]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let report = r.run(&FixedSource(vec![zach()])).await.unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(report.removed, 0);
    let stored = r.store().users.lock().unwrap()[0].clone();
    assert!(!stored.deleted);
    assert!(stored.deleted_at.is_none());
  }

  #[tokio::test]
  async fn rename_then_removal_keeps_both_in_order() {
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let observed = User { display_name: "zach".into(), deleted: true, ..zach() };
    r.run(&FixedSource(vec![observed])).await.unwrap();

    assert_eq!(r.notifier().texts(), vec![
      "Zach Taylor changed their handle from zt to zach".to_owned(),
      "After 10 days, Zach Taylor died of Typhoid Fever".to_owned(),
    ]);
    let stored = r.store().users.lock().unwrap()[0].clone();
    assert_eq!(stored.display_name, "zach");
    assert!(stored.deleted);
  }

  #[tokio::test]
  async fn noisy_status_is_persisted_silently() {
    let policy = Policy {
      tracking: TrackingPolicy { track_user_status: true, ..TrackingPolicy::default() },
      ..Policy::default()
    };
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), policy);

    let observed = User { status: ":bus: Commuting".into(), ..zach() };
    let report = r.run(&FixedSource(vec![observed])).await.unwrap();

    assert_eq!(report.changed, 1);
    assert_eq!(report.suppressed, 1);
    assert!(r.notifier().texts().is_empty());
    assert_eq!(r.store().users.lock().unwrap()[0].status, ":bus: Commuting");
  }

  #[tokio::test]
  async fn ordinary_status_is_announced_once() {
    let policy = Policy {
      tracking: TrackingPolicy { track_user_status: true, ..TrackingPolicy::default() },
      ..Policy::default()
    };
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), policy);

    let observed = User { status: ":coffee: Coffee".into(), ..zach() };
    let report = r.run(&FixedSource(vec![observed])).await.unwrap();

    assert_eq!(report.suppressed, 0);
    assert_eq!(r.notifier().texts().len(), 1);
  }

  #[tokio::test]
  async fn vanished_emoji_is_deleted() {
    let known = vec![Emoji::new("smile"), Emoji::new("wave")];
    let store = MemoryStore { emojis: Mutex::new(known), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let report = r.run(&FixedSource(vec![Emoji::new("smile")])).await.unwrap();

    assert_eq!(report.gone, 1);
    assert_eq!(r.notifier().texts(), vec![":wave:"]);
    let names: Vec<String> =
      r.store().emojis.lock().unwrap().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["smile"]);
  }

  #[tokio::test]
  async fn supervisor_change_names_both_supervisors() {
    let known = vec![
      Employee::new("a", "Alice"),
      Employee::new("b", "Bob"),
      Employee { supervisor_id: "a".into(), ..Employee::new("e", "Eve") },
    ];
    let mut observed = known.clone();
    observed[2].supervisor_id = "b".into();

    let store = MemoryStore { employees: Mutex::new(known), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());
    let report = r.run(&FixedSource(observed)).await.unwrap();

    assert_eq!(report.changed, 1);
    assert_eq!(r.notifier().texts(), vec!["Eve's supervisor changed from Alice to Bob"]);
    let eve = r.store().employees.lock().unwrap()[2].clone();
    assert_eq!(eve.supervisor_id, "b");
  }

  // ─── Side-effect ordering and failures ──────────────────────────────────

  #[tokio::test]
  async fn announcement_precedes_persistence() {
    let journal = Journal::default();
    let store = MemoryStore { journal: Some(&journal), ..MemoryStore::default() };
    let notifier = RecordingNotifier { journal: Some(&journal), ..RecordingNotifier::default() };
    let r = reconciler(store, notifier, Policy::default());

    r.run(&FixedSource(vec![Emoji::new("parrot")])).await.unwrap();

    assert_eq!(journal.entries(), vec!["notify :parrot:", "persist parrot"]);
  }

  #[tokio::test]
  async fn failed_announcement_persists_nothing() {
    let journal = Journal::default();
    let store = MemoryStore { journal: Some(&journal), ..MemoryStore::default() };
    let notifier = RecordingNotifier {
      journal: Some(&journal),
      fail: true,
      ..RecordingNotifier::default()
    };
    let r = reconciler(store, notifier, Policy::default());

    let source = FixedSource(vec![Emoji::new("parrot"), Emoji::new("doge")]);
    let err = r.run(&source).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Notify);
    let context = err.context().unwrap();
    assert_eq!(context.operation, Operation::Announce(ChangeKind::Created));
    assert_eq!(context.entity.as_deref(), Some("parrot"));
    assert_eq!(journal.entries(), vec!["notify :parrot:"]);
    assert!(r.store().emojis.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn failed_persist_halts_after_the_announcement() {
    let store = MemoryStore { fail_writes: true, ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let source = FixedSource(vec![Emoji::new("parrot"), Emoji::new("doge")]);
    let err = r.run(&source).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(
      err.context().unwrap().operation,
      Operation::Persist(ChangeKind::Created)
    );
    // The first announcement went out; the second change never started.
    assert_eq!(r.notifier().texts(), vec![":parrot:"]);
  }

  #[tokio::test]
  async fn unreachable_source_is_a_transport_error() {
    let r = reconciler(MemoryStore::default(), RecordingNotifier::default(), Policy::default());
    let err = r.run::<User, _>(&DownSource).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
      err.context().unwrap().operation,
      Operation::FetchObserved(EntityKind::User)
    );
  }

  #[tokio::test]
  async fn field_change_errors_name_the_field() {
    let store = MemoryStore { users: Mutex::new(vec![zach()]), ..MemoryStore::default() };
    let notifier = RecordingNotifier { fail: true, ..RecordingNotifier::default() };
    let r = reconciler(store, notifier, Policy::default());

    let observed = User { title: "CTO".into(), ..zach() };
    let err = r.run(&FixedSource(vec![observed])).await.unwrap_err();

    assert_eq!(
      err.context().unwrap().operation,
      Operation::Announce(ChangeKind::FieldChanged(Field::Title))
    );
    assert_eq!(r.store().users.lock().unwrap()[0].title, "");
  }

  // ─── Initialization ─────────────────────────────────────────────────────

  #[tokio::test]
  async fn initialize_is_silent() {
    let r = reconciler(MemoryStore::default(), RecordingNotifier::default(), Policy::default());
    let source = FixedSource(vec![User::new("a", "ann"), User { deleted: true, ..User::new("b", "bo") }]);

    let count = r.initialize(&source).await.unwrap();

    assert_eq!(count, 2);
    assert!(r.notifier().texts().is_empty());
    let users = r.store().users.lock().unwrap().clone();
    assert!(users.iter().all(|u| u.created_at == Some(now())));
    assert_eq!(users[1].deleted_at, Some(now()));
  }

  #[tokio::test]
  async fn initialize_refuses_a_populated_store() {
    let store = MemoryStore { emojis: Mutex::new(vec![Emoji::new("wave")]), ..MemoryStore::default() };
    let r = reconciler(store, RecordingNotifier::default(), Policy::default());

    let err = r.initialize(&FixedSource(vec![Emoji::new("smile")])).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
    assert!(matches!(err, Error::AlreadyInitialized { kind: EntityKind::Emoji, count: 1 }));
    assert_eq!(r.store().emojis.lock().unwrap().len(), 1);
  }
}
