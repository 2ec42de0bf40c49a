//! Workspace manifests.
//!
//! A workspace is a `kiln.toml` declaring every rule of a project:
//!
//! ```toml
//! [[java_library]]
//! name = "//app:main"
//! srcs = ["app/Main.java"]
//! deps = ["//lib:util"]
//!
//! [[java_library]]
//! name = "//lib:util"
//! srcs = ["lib/Util.java"]
//! exported_deps = ["//third_party:guava"]
//!
//! [[prebuilt_jar]]
//! name = "//third_party:guava"
//! binary_jar = "third_party/guava.jar"
//!
//! [[export_file]]
//! name = "//res:schema"
//! src = "res/schema.json"
//! ```
//!
//! A loaded [`Workspace`] is the [`RuleFactory`] of a [`RuleIndex`]: rules are
//! constructed from their definitions the first time they are required.

mod types;

pub use types::*;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use tracing::{debug, info};

use crate::compiler::StandardCompilerFactory;
use crate::config::KilnConfig;
use crate::deps::DependencyDeclaration;
use crate::error::GraphError;
use crate::index::{RuleFactory, RuleIndex};
use crate::library::{FsResourceValidator, LibraryContext, LibraryDescriptor, LibraryRules};
use crate::rule::abi::class_abi_rule;
use crate::rule::steps::RemoveClassesMatcher;
use crate::rule::{BuildRule, ExportFileRule, PrebuiltJarRule, RuleHandle, RuleKind};
use crate::target::{Flavor, Target};

pub struct Workspace {
  root: PathBuf,
  config: KilnConfig,
  out: PathBuf,
  compiler: StandardCompilerFactory,
  validator: FsResourceValidator,
  definitions: BTreeMap<Target, Definition>,
}

impl Workspace {
  /// Load and validate a workspace manifest. Relative paths in it resolve
  /// against the manifest's directory.
  pub fn load(path: &Path, config: KilnConfig) -> Result<Self, WorkspaceError> {
    let content = std::fs::read_to_string(path).map_err(|source| WorkspaceError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Self::from_toml_str(&root, &content, config)
  }

  pub fn from_toml_str(root: &Path, content: &str, config: KilnConfig) -> Result<Self, WorkspaceError> {
    let manifest: WorkspaceManifest = toml::from_str(content)?;
    Self::from_manifest(root, manifest, config)
  }

  pub fn from_manifest(root: &Path, manifest: WorkspaceManifest, config: KilnConfig) -> Result<Self, WorkspaceError> {
    let mut definitions = BTreeMap::new();

    let mut define = |name: &Target, definition: Definition| -> Result<(), WorkspaceError> {
      if !name.is_library() {
        return Err(WorkspaceError::FlavoredName(name.clone()));
      }
      if definitions.insert(name.clone(), definition).is_some() {
        return Err(WorkspaceError::DuplicateTarget(name.clone()));
      }
      Ok(())
    };

    for def in manifest.java_library {
      let classes_to_remove =
        RemoveClassesMatcher::new(&def.remove_classes).map_err(|source| WorkspaceError::InvalidPattern {
          target: def.name.clone(),
          source,
        })?;
      let name = def.name.clone();
      define(&name, Definition::Library { def, classes_to_remove })?;
    }
    for def in manifest.prebuilt_jar {
      let name = def.name.clone();
      define(&name, Definition::PrebuiltJar(def))?;
    }
    for def in manifest.export_file {
      let name = def.name.clone();
      define(&name, Definition::ExportFile(def))?;
    }

    validate(&definitions, &config)?;

    info!(rules = definitions.len(), root = %root.display(), "loaded workspace");

    Ok(Self {
      root: root.to_path_buf(),
      out: config.out_dir(),
      compiler: StandardCompilerFactory::new(config.compiler.clone()),
      validator: FsResourceValidator::new(root),
      config,
      definitions,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn out_dir(&self) -> &Path {
    &self.out
  }

  pub fn config(&self) -> &KilnConfig {
    &self.config
  }

  /// Every defined base target, in order.
  pub fn targets(&self) -> Vec<Target> {
    self.definitions.keys().cloned().collect()
  }

  pub fn definition(&self, target: &Target) -> Option<&Definition> {
    self.definitions.get(&target.library_target())
  }

  /// An index constructing rules from this workspace.
  pub fn into_index(self) -> RuleIndex {
    RuleIndex::new(Arc::new(self))
  }

  fn descriptor(
    &self,
    def: &LibraryDef,
    classes_to_remove: &RemoveClassesMatcher,
    index: &RuleIndex,
  ) -> Result<LibraryDescriptor, GraphError> {
    let require_all = |targets: &BTreeSet<Target>| -> Result<BTreeSet<RuleHandle>, GraphError> {
      targets.iter().map(|t| index.require(t)).collect()
    };

    let exported = require_all(&def.exported_deps)?;
    // Exported deps are also compiled against.
    let mut declared = require_all(&def.deps)?;
    declared.extend(exported.iter().cloned());

    Ok(LibraryDescriptor {
      srcs: def.srcs.clone(),
      resources: def.resources.clone(),
      resources_root: def.resources_root.clone(),
      manifest_file: def.manifest_file.clone(),
      proguard_config: def.proguard_config.clone(),
      postprocess_commands: def.postprocess_commands.clone(),
      maven_coords: def.maven_coords.clone(),
      tests: def.tests.clone(),
      classes_to_remove: classes_to_remove.clone(),
      source_abis_allowed: def.source_abis_allowed,
      required_for_source_abi: def.required_for_source_abi,
      compiler_options: def.compiler.clone(),
      deps: Some(DependencyDeclaration {
        declared,
        exported,
        provided: require_all(&def.provided_deps)?,
      }),
      extra_deps: BTreeSet::new(),
    })
  }

  fn prebuilt_jar(&self, def: &PrebuiltJarDef) -> RuleHandle {
    let jar = self.root.join(&def.binary_jar);
    RuleHandle::new(BuildRule::new(
      def.name.clone(),
      RuleKind::PrebuiltJar(PrebuiltJarRule {
        binary_jar: jar.clone(),
        maven_coords: def.maven_coords.clone(),
      }),
      BTreeSet::new(),
      Some(jar),
    ))
  }

  fn export_file(&self, def: &ExportFileDef) -> RuleHandle {
    let src = self
      .root
      .join(def.src.clone().unwrap_or_else(|| PathBuf::from(def.name.short_name())));
    RuleHandle::new(BuildRule::new(
      def.name.clone(),
      RuleKind::ExportFile(ExportFileRule { src: src.clone() }),
      BTreeSet::new(),
      Some(src),
    ))
  }
}

impl RuleFactory for Workspace {
  fn create_rule(&self, target: &Target, index: &RuleIndex) -> Result<RuleHandle, GraphError> {
    let definition = self
      .definition(target)
      .ok_or_else(|| GraphError::UnknownTarget(target.clone()))?;

    debug!(target = %target, kind = definition.kind_name(), "creating rule from definition");

    match (definition, target.flavor()) {
      (Definition::Library { def, classes_to_remove }, _) => {
        let descriptor = self.descriptor(def, classes_to_remove, index)?;
        let ctx = LibraryContext {
          index,
          compiler_factory: &self.compiler,
          java: &self.config.java,
          out: &self.out,
        };
        LibraryRules::new(target.clone(), descriptor, ctx, &self.validator)?.build()
      }
      (Definition::PrebuiltJar(def), Flavor::Library) => Ok(self.prebuilt_jar(def)),
      (Definition::PrebuiltJar(_), Flavor::ClassAbi) => {
        let jar = index.require(&target.library_target())?;
        class_abi_rule(target.clone(), &jar, &self.out, false)
      }
      (Definition::ExportFile(def), Flavor::Library) => Ok(self.export_file(def)),
      _ => Err(GraphError::UnknownTarget(target.clone())),
    }
  }
}

fn validate(definitions: &BTreeMap<Target, Definition>, config: &KilnConfig) -> Result<(), WorkspaceError> {
  for dep in &config.compiler.runtime_deps {
    if !definitions.contains_key(dep) {
      return Err(WorkspaceError::UnknownRuntimeDep(dep.clone()));
    }
  }

  let mut graph = DiGraph::<Target, ()>::new();
  let nodes: HashMap<Target, _> = definitions
    .keys()
    .map(|target| (target.clone(), graph.add_node(target.clone())))
    .collect();

  for (target, definition) in definitions {
    let Definition::Library { def, .. } = definition else {
      continue;
    };
    for dep in def.referenced_targets().chain(&config.compiler.runtime_deps) {
      let Some(&dep_idx) = nodes.get(dep) else {
        return Err(WorkspaceError::UnknownDependency {
          target: target.clone(),
          dep: dep.clone(),
        });
      };
      graph.add_edge(dep_idx, nodes[target], ());
    }
  }

  toposort(&graph, None).map_err(|cycle| WorkspaceError::Cycle(graph[cycle.node_id()].clone()))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{JavaConfig, VerificationMode};
  use std::fs;
  use tempfile::TempDir;

  const APP: &str = r#"
[[java_library]]
name = "//app:main"
srcs = ["app/Main.java"]
deps = ["//lib:util", "//res:schema"]

[[java_library]]
name = "//lib:util"
srcs = ["lib/Util.java"]
exported_deps = ["//lib:base"]

[[java_library]]
name = "//lib:base"
srcs = ["lib/Base.java"]
provided_deps = ["//third_party:servlet"]

[[prebuilt_jar]]
name = "//third_party:servlet"
binary_jar = "third_party/servlet.jar"

[[export_file]]
name = "//res:schema"
src = "res/schema.json"
"#;

  fn config() -> KilnConfig {
    KilnConfig {
      out_dir: Some(PathBuf::from("/out")),
      ..KilnConfig::default()
    }
  }

  fn load(content: &str, config: KilnConfig) -> Result<Workspace, WorkspaceError> {
    Workspace::from_toml_str(Path::new("/repo"), content, config)
  }

  fn names(rules: &BTreeSet<RuleHandle>) -> Vec<String> {
    rules.iter().map(|r| r.target().to_string()).collect()
  }

  mod loading {
    use super::*;

    #[test]
    fn lists_defined_targets_in_order() {
      let ws = load(APP, config()).unwrap();
      let targets: Vec<_> = ws.targets().iter().map(|t| t.to_string()).collect();
      assert_eq!(
        targets,
        vec!["//app:main", "//lib:base", "//lib:util", "//res:schema", "//third_party:servlet"]
      );
    }

    #[test]
    fn load_reads_relative_to_manifest() {
      let temp = TempDir::new().unwrap();
      let path = temp.path().join("kiln.toml");
      fs::write(&path, APP).unwrap();

      let ws = Workspace::load(&path, config()).unwrap();
      assert_eq!(ws.root(), temp.path());
    }

    #[test]
    fn rejects_unknown_dependency() {
      let err = load("[[java_library]]\nname = \"//a:a\"\ndeps = [\"//b:b\"]\n", config()).err().unwrap();
      assert!(matches!(err, WorkspaceError::UnknownDependency { dep, .. } if dep.to_string() == "//b:b"));
    }

    #[test]
    fn rejects_duplicate_names() {
      let content = "[[java_library]]\nname = \"//a:a\"\n\n[[export_file]]\nname = \"//a:a\"\n";
      assert!(matches!(load(content, config()), Err(WorkspaceError::DuplicateTarget(_))));
    }

    #[test]
    fn rejects_flavored_names() {
      let content = "[[java_library]]\nname = \"//a:a#class-abi\"\n";
      assert!(matches!(load(content, config()), Err(WorkspaceError::FlavoredName(_))));
    }

    #[test]
    fn rejects_cycles() {
      let content = r#"
[[java_library]]
name = "//a:a"
deps = ["//b:b"]

[[java_library]]
name = "//b:b"
exported_deps = ["//a:a"]
"#;
      assert!(matches!(load(content, config()), Err(WorkspaceError::Cycle(_))));
    }

    #[test]
    fn rejects_invalid_remove_classes_pattern() {
      let content = "[[java_library]]\nname = \"//a:a\"\nremove_classes = [\"(\"]\n";
      assert!(matches!(load(content, config()), Err(WorkspaceError::InvalidPattern { .. })));
    }

    #[test]
    fn rejects_undefined_runtime_dep() {
      let mut cfg = config();
      cfg.compiler.runtime_deps = vec!["//third_party:stdlib".parse().unwrap()];
      assert!(matches!(load(APP, cfg), Err(WorkspaceError::UnknownRuntimeDep(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
      assert!(matches!(
        load("[[java_library]]\nname = \"//a:a\"\nsource = []\n", config()),
        Err(WorkspaceError::Parse(_))
      ));
    }
  }

  mod building {
    use super::*;

    #[test]
    fn exported_deps_reach_dependents_but_provided_do_not() {
      let index = load(APP, config()).unwrap().into_index();
      let app = index.require(&"//app:main".parse().unwrap()).unwrap();

      assert_eq!(
        names(app.build_deps()),
        vec!["//lib:base#class-abi", "//lib:util#class-abi", "//res:schema"]
      );
      assert!(index.get(&"//third_party:servlet#class-abi".parse().unwrap()).is_some());
      assert!(!app.build_deps().iter().any(|d| d.target().base() == "//third_party:servlet"));
    }

    #[test]
    fn exported_deps_are_declared_too() {
      let index = load(APP, config()).unwrap().into_index();
      let util = index.require(&"//lib:util".parse().unwrap()).unwrap();
      let lib = util.as_library().unwrap();

      assert_eq!(names(&lib.declared_deps), vec!["//lib:base"]);
      assert_eq!(names(&lib.exported_deps), vec!["//lib:base"]);
    }

    #[test]
    fn prebuilt_jar_has_class_abi() {
      let index = load(APP, config()).unwrap().into_index();
      let abi = index.require(&"//third_party:servlet#class-abi".parse().unwrap()).unwrap();

      assert_eq!(names(abi.build_deps()), vec!["//third_party:servlet"]);
      match abi.kind() {
        RuleKind::ClassAbi(class) => assert_eq!(class.library_output, PathBuf::from("/repo/third_party/servlet.jar")),
        other => panic!("expected class ABI, got {:?}", other),
      }
    }

    #[test]
    fn export_file_has_no_abi() {
      let index = load(APP, config()).unwrap().into_index();
      let err = index.require(&"//res:schema#class-abi".parse().unwrap()).unwrap_err();
      assert!(matches!(err, GraphError::UnknownTarget(_)));
    }

    #[test]
    fn source_abis_from_config() {
      let cfg = KilnConfig {
        java: JavaConfig {
          generate_abis_from_source: true,
          source_abi_verification: VerificationMode::Off,
        },
        ..config()
      };
      let index = load(APP, cfg).unwrap().into_index();
      let app = index.require(&"//app:main".parse().unwrap()).unwrap();

      assert!(index.contains(&"//app:main#source-abi".parse().unwrap()));
      assert_eq!(
        names(app.build_deps()),
        vec![
          "//app:main#source-abi",
          "//lib:base#source-abi",
          "//lib:util#source-abi",
          "//res:schema"
        ]
      );
    }

    #[test]
    fn whole_workspace_builds_in_parallel_without_duplicates() {
      let ws = load(APP, config()).unwrap();
      let targets = ws.targets();
      let index = ws.into_index();

      std::thread::scope(|s| {
        for target in &targets {
          let index = &index;
          s.spawn(move || index.require(target).unwrap());
        }
      });

      for target in &targets {
        assert!(index.contains(target));
      }
    }

    #[test]
    fn missing_resources_fail_the_library() {
      let content = "[[java_library]]\nname = \"//a:a\"\nresources = [\"res/missing.txt\"]\n";
      let temp = TempDir::new().unwrap();
      let index = Workspace::from_toml_str(temp.path(), content, config())
        .unwrap()
        .into_index();

      let err = index.require(&"//a:a".parse().unwrap()).unwrap_err();
      assert!(matches!(err, GraphError::Resource(_)));
      assert!(index.is_empty());
    }
  }
}
