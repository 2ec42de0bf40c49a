//! The shared rule index.
//!
//! Every rule of a construction pass is registered here exactly once. Rules
//! are constructed on demand: [`RuleIndex::require`] returns the registered
//! rule or asks the [`RuleFactory`] to construct it.
//!
//! # Concurrency
//!
//! The index is shared between threads. All flavors of one base target (a
//! *family*) are constructed under a single re-entrant lock, so:
//!
//! - concurrent first requests for a target construct it once; later callers
//!   block, then receive the same [`RuleHandle`]
//! - a factory may require sibling flavors of the target it is constructing
//!   on the same thread
//! - a rule becomes visible only once fully constructed
//!
//! Requiring a target that is already under construction on the current
//! thread is a dependency cycle. Two threads can only wait on each other's
//! families if the families depend on each other, which is also a cycle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::GraphError;
use crate::rule::RuleHandle;
use crate::target::Target;
use crate::util::hash::Hashable;

/// Constructs rules the index does not have yet.
///
/// `create_rule` must not register `target` itself; the index does that with
/// the returned rule. It may require other rules and register companions
/// under other targets.
pub trait RuleFactory: Send + Sync {
  fn create_rule(&self, target: &Target, index: &RuleIndex) -> Result<RuleHandle, GraphError>;
}

pub struct RuleIndex {
  factory: Arc<dyn RuleFactory>,
  rules: Mutex<BTreeMap<Target, RuleHandle>>,
  families: Mutex<HashMap<String, Arc<ReentrantMutex<()>>>>,
  in_progress: Mutex<BTreeSet<Target>>,
}

impl RuleIndex {
  pub fn new(factory: Arc<dyn RuleFactory>) -> Self {
    Self {
      factory,
      rules: Mutex::new(BTreeMap::new()),
      families: Mutex::new(HashMap::new()),
      in_progress: Mutex::new(BTreeSet::new()),
    }
  }

  /// The registered rule for `target`, if any. Never constructs.
  pub fn get(&self, target: &Target) -> Option<RuleHandle> {
    self.rules.lock().get(target).cloned()
  }

  pub fn contains(&self, target: &Target) -> bool {
    self.rules.lock().contains_key(target)
  }

  pub fn len(&self) -> usize {
    self.rules.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.lock().is_empty()
  }

  /// Registered targets, in order.
  pub fn targets(&self) -> Vec<Target> {
    self.rules.lock().keys().cloned().collect()
  }

  /// Return the rule for `target`, constructing and registering it first if
  /// needed.
  pub fn require(&self, target: &Target) -> Result<RuleHandle, GraphError> {
    if let Some(rule) = self.get(target) {
      return Ok(rule);
    }

    let family = self.family_lock(target.base());
    let _guard = family.lock();

    // Another thread may have finished it while we waited.
    if let Some(rule) = self.get(target) {
      return Ok(rule);
    }

    if !self.in_progress.lock().insert(target.clone()) {
      return Err(GraphError::CycleDetected(target.clone()));
    }

    debug!(target = %target, "constructing rule");
    let created = self.factory.create_rule(target, self);
    self.in_progress.lock().remove(target);

    let rule = created?;
    self.add_to_index(rule.clone())?;
    Ok(rule)
  }

  /// Register a fully constructed rule.
  ///
  /// Fails with [`GraphError::DuplicateRule`] if its target is taken.
  pub fn add_to_index(&self, rule: RuleHandle) -> Result<(), GraphError> {
    let mut rules = self.rules.lock();
    if rules.contains_key(rule.target()) {
      return Err(GraphError::DuplicateRule(rule.target().clone()));
    }

    info!(target = %rule.target(), kind = rule.kind_name(), "registered rule");
    rules.insert(rule.target().clone(), rule);
    Ok(())
  }

  /// A serializable listing of every registered rule.
  pub fn snapshot(&self) -> GraphSnapshot {
    let rules = self.rules.lock();
    GraphSnapshot {
      rules: rules.values().map(RuleSummary::from).collect(),
    }
  }

  fn family_lock(&self, base: &str) -> Arc<ReentrantMutex<()>> {
    self
      .families
      .lock()
      .entry(base.to_string())
      .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
      .clone()
  }
}

impl std::fmt::Debug for RuleIndex {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RuleIndex").field("rules", &self.targets()).finish()
  }
}

/// One registered rule, flattened for display and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
  pub target: Target,
  pub kind: &'static str,
  pub build_deps: Vec<Target>,
  pub output: Option<PathBuf>,
}

impl From<&RuleHandle> for RuleSummary {
  fn from(rule: &RuleHandle) -> Self {
    Self {
      target: rule.target().clone(),
      kind: rule.kind_name(),
      build_deps: rule.build_deps().iter().map(|dep| dep.target().clone()).collect(),
      output: rule.output().map(|p| p.to_path_buf()),
    }
  }
}

/// The registered graph, in target order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
  pub rules: Vec<RuleSummary>,
}

impl Hashable for GraphSnapshot {}
