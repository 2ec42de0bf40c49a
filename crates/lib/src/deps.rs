//! Dependency closures.
//!
//! A library names its deps in three roles (see [`DependencyDeclaration`]).
//! From those the resolver derives:
//!
//! 1. the *first-order* set: declared, compiler-declared, and provided deps
//! 2. the *unfiltered* closure: first-order plus everything they export,
//!    transitively
//! 3. the *full* closure: the unfiltered closure minus rules without compiled
//!    classes
//! 4. the *abi* closure: each full-closure member swapped for its ABI rule
//!    when compiling against ABIs, otherwise the full closure itself
//!
//! Everything is a `BTreeSet<RuleHandle>`, ordered by target.

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::GraphError;
use crate::index::RuleIndex;
use crate::rule::RuleHandle;

/// A library's deps by role.
///
/// - `declared`: needed to compile this library
/// - `exported`: re-exposed to anything depending on this library
/// - `provided`: compile-time only; never propagated to dependents
#[derive(Debug, Clone, Default)]
pub struct DependencyDeclaration {
  pub declared: BTreeSet<RuleHandle>,
  pub exported: BTreeSet<RuleHandle>,
  pub provided: BTreeSet<RuleHandle>,
}

impl DependencyDeclaration {
  /// The library's own compile-time inputs.
  pub fn first_order(&self, compiler_declared: &BTreeSet<RuleHandle>) -> BTreeSet<RuleHandle> {
    self
      .declared
      .iter()
      .chain(compiler_declared)
      .chain(&self.provided)
      .cloned()
      .collect()
  }

  /// Every dep in any role, plus `extra`.
  pub fn initial_build_deps(&self, extra: &BTreeSet<RuleHandle>) -> BTreeSet<RuleHandle> {
    self
      .declared
      .iter()
      .chain(&self.exported)
      .chain(&self.provided)
      .chain(extra)
      .cloned()
      .collect()
  }
}

/// Everything exported by `rules`, following export chains.
pub fn exported_rules(rules: &BTreeSet<RuleHandle>) -> BTreeSet<RuleHandle> {
  let mut exported = BTreeSet::new();
  let mut pending: Vec<RuleHandle> = rules
    .iter()
    .filter_map(|rule| rule.exported_deps())
    .flatten()
    .cloned()
    .collect();

  while let Some(rule) = pending.pop() {
    if let Some(next) = rule.exported_deps() {
      pending.extend(next.iter().filter(|dep| !exported.contains(*dep)).cloned());
    }
    exported.insert(rule);
  }

  exported
}

/// The three closure views of one library.
#[derive(Debug, Clone)]
pub struct Closures {
  pub unfiltered: BTreeSet<RuleHandle>,
  pub full: BTreeSet<RuleHandle>,
  pub abi: BTreeSet<RuleHandle>,
}

impl Closures {
  pub fn resolve(
    first_order: &BTreeSet<RuleHandle>,
    index: &RuleIndex,
    compile_against_abis: bool,
  ) -> Result<Self, GraphError> {
    let mut unfiltered = first_order.clone();
    unfiltered.extend(exported_rules(first_order));

    let full: BTreeSet<RuleHandle> = unfiltered.iter().filter(|rule| rule.has_java_abi()).cloned().collect();

    let abi = if compile_against_abis {
      abi_rules(index, &full)?
    } else {
      full.clone()
    };

    trace!(
      unfiltered = unfiltered.len(),
      full = full.len(),
      abi = abi.len(),
      "resolved closures"
    );

    Ok(Self { unfiltered, full, abi })
  }
}

/// Swap each rule for its ABI rule, requiring it through the index.
///
/// Rules without an ABI target pass through unchanged.
pub fn abi_rules(index: &RuleIndex, rules: &BTreeSet<RuleHandle>) -> Result<BTreeSet<RuleHandle>, GraphError> {
  rules
    .iter()
    .map(|rule| match rule.abi_target() {
      Some(target) => index.require(&target),
      None => Ok(rule.clone()),
    })
    .collect()
}

/// Inputs of [`build_time_deps`].
pub struct BuildDepsInputs<'a> {
  pub initial: &'a BTreeSet<RuleHandle>,
  pub closures: &'a Closures,
  pub compiler_build_deps: &'a BTreeSet<RuleHandle>,
  pub compile_against_abis: bool,
}

/// The rules that must be built before this library compiles.
///
/// Full-closure members only appear through their ABI, unless the compiler
/// can't compile against ABIs.
pub fn build_time_deps(inputs: &BuildDepsInputs<'_>) -> BTreeSet<RuleHandle> {
  let full = &inputs.closures.full;

  let mut deps: BTreeSet<RuleHandle> = inputs.initial.difference(full).cloned().collect();
  deps.extend(inputs.closures.unfiltered.difference(full).cloned());
  deps.extend(inputs.compiler_build_deps.iter().cloned());
  deps.extend(inputs.closures.abi.iter().cloned());

  if !inputs.compile_against_abis {
    deps.extend(full.iter().cloned());
  }

  deps
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::target::Target;
  use crate::util::testutil::{TestFactory, export_file, index_with, library, prebuilt_jar};

  fn targets(rules: &BTreeSet<RuleHandle>) -> Vec<String> {
    rules.iter().map(|r| r.target().to_string()).collect()
  }

  fn set(rules: &[&RuleHandle]) -> BTreeSet<RuleHandle> {
    rules.iter().map(|r| (*r).clone()).collect()
  }

  mod propagation {
    use super::*;

    #[test]
    fn exported_deps_reach_dependents() {
      let c = library("//lib:c", &[], &[], &[]);
      let b = library("//lib:b", &[&c], &[&c], &[]);

      let first_order = set(&[&b]);
      let exported = exported_rules(&first_order);
      assert_eq!(targets(&exported), vec!["//lib:c"]);
    }

    #[test]
    fn export_chains_are_followed() {
      let d = library("//lib:d", &[], &[], &[]);
      let c = library("//lib:c", &[&d], &[&d], &[]);
      let b = library("//lib:b", &[&c], &[&c], &[]);

      let exported = exported_rules(&set(&[&b]));
      assert_eq!(targets(&exported), vec!["//lib:c", "//lib:d"]);
    }

    #[test]
    fn provided_deps_stop_at_declaring_library() {
      let c = library("//lib:c", &[], &[], &[]);
      let b = library("//lib:b", &[], &[], &[&c]);

      let index = index_with(TestFactory::new().with_rule(&b).with_rule(&c));
      let closures = Closures::resolve(&set(&[&b]), &index, false).unwrap();
      assert_eq!(targets(&closures.unfiltered), vec!["//lib:b"]);
    }

    #[test]
    fn provided_deps_are_first_order_for_the_declaring_library() {
      let c = library("//lib:c", &[], &[], &[]);
      let deps = DependencyDeclaration {
        provided: set(&[&c]),
        ..Default::default()
      };
      assert_eq!(targets(&deps.first_order(&BTreeSet::new())), vec!["//lib:c"]);
    }
  }

  mod closures {
    use super::*;

    #[test]
    fn full_closure_drops_data_rules() {
      let data = export_file("//res:data");
      let jar = prebuilt_jar("//third_party:guava");
      let index = index_with(TestFactory::new().with_rule(&jar));

      let closures = Closures::resolve(&set(&[&data, &jar]), &index, true).unwrap();
      assert_eq!(targets(&closures.unfiltered), vec!["//res:data", "//third_party:guava"]);
      assert_eq!(targets(&closures.full), vec!["//third_party:guava"]);
      assert_eq!(targets(&closures.abi), vec!["//third_party:guava#class-abi"]);
    }

    #[test]
    fn abi_closure_mirrors_full_closure() {
      let d = library("//lib:d", &[], &[], &[]);
      let c = library("//lib:c", &[&d], &[&d], &[]);
      let b = library("//lib:b", &[], &[], &[]);
      let jar = prebuilt_jar("//third_party:jar");
      let data = export_file("//res:data");
      let index = index_with(
        TestFactory::new()
          .with_rule(&b)
          .with_rule(&c)
          .with_rule(&d)
          .with_rule(&jar),
      );

      let closures = Closures::resolve(&set(&[&b, &c, &jar, &data]), &index, true).unwrap();

      let full: BTreeSet<Target> = closures.full.iter().map(|r| r.target().clone()).collect();
      let stripped: BTreeSet<Target> = closures.abi.iter().map(|r| r.target().library_target()).collect();
      assert_eq!(stripped, full);
      assert_eq!(closures.abi.len(), closures.full.len());
      assert!(closures.abi.iter().all(|r| r.target().flavor().is_abi()));
    }

    #[test]
    fn abi_rules_are_reused_from_the_index() {
      let b = library("//lib:b", &[], &[], &[]);
      let factory = TestFactory::new().with_rule(&b);
      let calls = factory.calls();
      let index = index_with(factory);

      let first = Closures::resolve(&set(&[&b]), &index, true).unwrap();
      let before = calls.load(std::sync::atomic::Ordering::SeqCst);
      let second = Closures::resolve(&set(&[&b]), &index, true).unwrap();

      assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), before);
      let a = first.abi.iter().next().unwrap();
      let b = second.abi.iter().next().unwrap();
      assert!(RuleHandle::ptr_eq(a, b));
    }

    #[test]
    fn library_without_output_passes_through() {
      let empty = crate::util::testutil::library_without_output("//lib:empty");
      let index = index_with(TestFactory::new());

      let closures = Closures::resolve(&set(&[&empty]), &index, true).unwrap();
      assert_eq!(targets(&closures.abi), vec!["//lib:empty"]);
    }

    #[test]
    fn no_abi_compilation_reuses_full_closure() {
      let b = library("//lib:b", &[], &[], &[]);
      let index = index_with(TestFactory::new());

      let closures = Closures::resolve(&set(&[&b]), &index, false).unwrap();
      assert_eq!(targets(&closures.abi), vec!["//lib:b"]);
      assert!(index.is_empty());
    }
  }

  mod build_deps {
    use super::*;

    fn resolve(
      deps: &DependencyDeclaration,
      index: &RuleIndex,
      compile_against_abis: bool,
      compiler_build_deps: &BTreeSet<RuleHandle>,
    ) -> BTreeSet<RuleHandle> {
      let first_order = deps.first_order(&BTreeSet::new());
      let closures = Closures::resolve(&first_order, index, compile_against_abis).unwrap();
      build_time_deps(&BuildDepsInputs {
        initial: &deps.initial_build_deps(&BTreeSet::new()),
        closures: &closures,
        compiler_build_deps,
        compile_against_abis,
      })
    }

    #[test]
    fn abi_compilation_depends_on_abis_only() {
      let b = library("//lib:b", &[], &[], &[]);
      let data = export_file("//res:data");
      let index = index_with(TestFactory::new().with_rule(&b));
      let deps = DependencyDeclaration {
        declared: set(&[&b, &data]),
        ..Default::default()
      };

      let build = resolve(&deps, &index, true, &BTreeSet::new());
      assert_eq!(targets(&build), vec!["//lib:b#class-abi", "//res:data"]);
    }

    #[test]
    fn full_compilation_depends_on_full_jars() {
      let b = library("//lib:b", &[], &[], &[]);
      let deps = DependencyDeclaration {
        declared: set(&[&b]),
        ..Default::default()
      };
      let index = index_with(TestFactory::new());

      let build = resolve(&deps, &index, false, &BTreeSet::new());
      assert_eq!(targets(&build), vec!["//lib:b"]);
    }

    #[test]
    fn compiler_build_deps_are_always_included() {
      let processor = prebuilt_jar("//tools:processor");
      let index = index_with(TestFactory::new());

      let build = resolve(&DependencyDeclaration::default(), &index, true, &set(&[&processor]));
      assert_eq!(targets(&build), vec!["//tools:processor"]);
    }

    #[test]
    fn exported_through_dependency_joins_build_deps() {
      let c = library("//lib:c", &[], &[], &[]);
      let b = library("//lib:b", &[&c], &[&c], &[]);
      let index = index_with(TestFactory::new().with_rule(&b).with_rule(&c));
      let deps = DependencyDeclaration {
        declared: set(&[&b]),
        ..Default::default()
      };

      let build = resolve(&deps, &index, true, &BTreeSet::new());
      assert_eq!(targets(&build), vec!["//lib:b#class-abi", "//lib:c#class-abi"]);
    }

    #[test]
    fn provided_dep_with_abi_compilation() {
      let p = library("//lib:provided", &[], &[], &[]);
      let index = index_with(TestFactory::new().with_rule(&p));
      let deps = DependencyDeclaration {
        provided: set(&[&p]),
        ..Default::default()
      };

      let build = resolve(&deps, &index, true, &BTreeSet::new());
      assert_eq!(targets(&build), vec!["//lib:provided#class-abi"]);
    }

    #[test]
    fn provided_dep_without_abi_compilation() {
      let p = library("//lib:provided", &[], &[], &[]);
      let index = index_with(TestFactory::new());
      let deps = DependencyDeclaration {
        provided: set(&[&p]),
        ..Default::default()
      };

      let build = resolve(&deps, &index, false, &BTreeSet::new());
      assert_eq!(targets(&build), vec!["//lib:provided"]);
    }

    #[test]
    fn provided_data_dep_is_kept_either_way() {
      let data = export_file("//res:schema");
      let index = index_with(TestFactory::new());
      let deps = DependencyDeclaration {
        provided: set(&[&data]),
        ..Default::default()
      };

      for compile_against_abis in [true, false] {
        let build = resolve(&deps, &index, compile_against_abis, &BTreeSet::new());
        assert_eq!(targets(&build), vec!["//res:schema"]);
      }
    }
  }
}
