//! The schema: every registered unit plus what is resolved from them.
//!
//! A [`Schema`] is built in two steps. [`Schema::parse_into_schema`]
//! registers the parsed units, links submodules to their owners and runs the
//! relationship checks; unless configured otherwise it then calls
//! [`Schema::process_parsed_modules`], which runs the resolution passes in
//! their fixed order. Each schema resolves exactly once.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tracing::{debug, info, warn};

use crate::check::perform_checks;
use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::finding::{FAIL_FAST, Finding, FindingType, FindingsManager};
use crate::input::UnitInput;
use crate::registry::{
    AnnotationRegistry, IdentityRegistry, ModuleAndNamespaceResolver, ModuleRegistry,
};
use crate::resolve;
use crate::statement::{NodeId, StatementTree};
use crate::unit::{ModuleIdentity, Unit, UnitId};

/// Result type of [`SchemaHook`] callbacks.
pub type HookResult = std::result::Result<(), Box<dyn Error + Send + Sync>>;

/// Extension point invoked around the resolution passes.
///
/// `pre_process` runs after the relationship checks (and only when the run
/// did not stop early), `post_process` after every pass including registry
/// population. A failing hook is reported as a finding and the remaining
/// hooks still run.
pub trait SchemaHook {
    fn pre_process(&mut self, _schema: &mut Schema) -> HookResult {
        Ok(())
    }

    fn post_process(&mut self, _schema: &mut Schema) -> HookResult {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookPhase {
    Pre,
    Post,
}

/// Registered units, the shared statement arena, the registries and the
/// findings produced while resolving them.
pub struct Schema {
    config: ResolverConfig,
    pub(crate) tree: StatementTree,
    pub(crate) registry: ModuleRegistry,
    pub(crate) resolver: ModuleAndNamespaceResolver,
    pub(crate) identities: IdentityRegistry,
    pub(crate) annotations: AnnotationRegistry,
    pub(crate) findings: FindingsManager,
    hooks: Vec<Box<dyn SchemaHook>>,
    processed: bool,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("units", &self.registry.len())
            .field("nodes", &self.tree.len())
            .field("findings", &self.findings.len())
            .field("hooks", &self.hooks.len())
            .field("processed", &self.processed)
            .finish()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl Schema {
    /// Creates an empty schema. Finding suppression is set up from `config`;
    /// with fail-fast enabled, the fail-fast finding types cannot be
    /// suppressed.
    pub fn new(config: ResolverConfig) -> Self {
        let mut findings = FindingsManager::new();
        findings.set_suppress_all(config.suppress_all);
        for finding_type in &config.suppressed_finding_types {
            findings.suppress_type(*finding_type);
        }
        if config.fail_fast {
            for finding_type in FAIL_FAST {
                findings.add_non_suppressible_type(*finding_type);
            }
        }

        Self {
            config,
            tree: StatementTree::new(),
            registry: ModuleRegistry::new(),
            resolver: ModuleAndNamespaceResolver::new(),
            identities: IdentityRegistry::new(),
            annotations: AnnotationRegistry::new(),
            findings,
            hooks: Vec::new(),
            processed: false,
        }
    }

    pub fn add_hook(&mut self, hook: impl SchemaHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Registers `inputs`, checks their relationships and, unless
    /// [`stop_after_initial_parse`](ResolverConfig::stop_after_initial_parse)
    /// is set, resolves them.
    ///
    /// Problems with the modules themselves are reported as findings.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInput`](ResolveError::InvalidInput) if an input tree
    /// contains an unknown statement or its root is not a named module or
    /// submodule, and [`AlreadyProcessed`](ResolveError::AlreadyProcessed) if
    /// this schema has already been resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use yang_resolver_core::{ConformanceType, ParsedStatement, ResolverConfig, Schema, UnitInput};
    ///
    /// let module = ParsedStatement::new("module", "acme").with_children([
    ///     ParsedStatement::new("namespace", "urn:acme"),
    ///     ParsedStatement::new("prefix", "ac"),
    ///     ParsedStatement::new("container", "system"),
    /// ]);
    ///
    /// let mut schema = Schema::new(ResolverConfig::default());
    /// schema
    ///     .parse_into_schema(vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)])
    ///     .unwrap();
    ///
    /// let system = schema.lookup("acme", "system").unwrap();
    /// assert_eq!(schema.tree().node(system).effective.namespace.as_deref(), Some("urn:acme"));
    /// ```
    pub fn parse_into_schema(&mut self, inputs: impl IntoIterator<Item = UnitInput>) -> Result<()> {
        if self.processed {
            return Err(ResolveError::AlreadyProcessed);
        }

        let mut seen: HashSet<String> = HashSet::new();
        for input in inputs {
            if !seen.insert(input.source.clone()) {
                self.findings.add_finding(Finding::on_input(
                    &input.source,
                    FindingType::DuplicateInput,
                    format!(
                        "Model Input '{}' supplied more than once. Remove duplicate from input.",
                        input.source
                    ),
                ));
                continue;
            }
            self.register(input)?;
        }
        info!(units = self.registry.len(), "inputs registered");

        self.guarded(|schema| {
            schema.link_submodules();
            perform_checks(&schema.registry, &schema.tree, &mut schema.findings);
            Ok(())
        });

        if self.config.fail_fast && self.findings.has_finding_of_any(FAIL_FAST) {
            self.findings.retain_finding_types(FAIL_FAST);
            self.findings.add_finding(Finding::general(
                FindingType::FailFast,
                "Parsing has been stopped early due to significant findings with the input. Address these findings first, and then retry your operation.",
            ));
            info!(findings = self.findings.len(), "stopped early after relationship checks");
            return Ok(());
        }

        self.guarded(|schema| {
            schema.run_hooks(HookPhase::Pre);
            Ok(())
        });

        if self.config.stop_after_initial_parse {
            debug!("stopping after initial parse");
            return Ok(());
        }
        self.process_parsed_modules()
    }

    /// Runs the resolution passes over the registered units.
    ///
    /// A broken tree invariant or a panic inside a pass is reported as one
    /// [`UnspecifiedError`](FindingType::UnspecifiedError) finding and the
    /// remaining passes are skipped; the trees are then left partially
    /// resolved.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyProcessed`](ResolveError::AlreadyProcessed) on a
    /// second call.
    pub fn process_parsed_modules(&mut self) -> Result<()> {
        if self.processed {
            return Err(ResolveError::AlreadyProcessed);
        }
        self.processed = true;

        info!(units = self.registry.len(), "resolving schema");
        self.guarded(resolve::run_passes);
        info!(findings = self.findings.len(), "schema resolved");
        Ok(())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn tree(&self) -> &StatementTree {
        &self.tree
    }

    /// Mutable access to the statement arena, for hooks.
    pub fn tree_mut(&mut self) -> &mut StatementTree {
        &mut self.tree
    }

    pub fn module_registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn namespace_resolver(&self) -> &ModuleAndNamespaceResolver {
        &self.resolver
    }

    pub fn identity_registry(&self) -> &IdentityRegistry {
        &self.identities
    }

    pub fn annotation_registry(&self) -> &AnnotationRegistry {
        &self.annotations
    }

    pub fn findings(&self) -> &FindingsManager {
        &self.findings
    }

    pub fn findings_mut(&mut self) -> &mut FindingsManager {
        &mut self.findings
    }

    /// Whether [`process_parsed_modules`](Self::process_parsed_modules) has
    /// run.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// The first registered unit named `name`.
    pub fn module(&self, name: &str) -> Option<&Unit> {
        self.registry
            .by_name(name)
            .first()
            .map(|id| self.registry.get(*id))
    }

    /// Follows a `/`-separated path of schema node identifiers from the root
    /// of unit `module`. Prefixes on the steps are ignored.
    pub fn lookup(&self, module: &str, path: &str) -> Option<NodeId> {
        let mut current = self.module(module)?.root();
        for step in path.trim_matches('/').split('/').filter(|s| !s.is_empty()) {
            let name = step.rsplit(':').next().unwrap_or(step);
            current = self.tree.children(current).iter().copied().find(|child| {
                let stmt = self.tree.node(*child);
                stmt.kind().defines_schema_node() && stmt.schema_node_name() == name
            })?;
        }
        Some(current)
    }

    fn register(&mut self, input: UnitInput) -> Result<()> {
        let id = self.registry.next_id();
        let root = input.root.insert_into(&mut self.tree, id)?;
        let unit = Unit::from_tree(id, input.source, input.conformance, &self.tree, root)?;
        if let (true, Some(namespace)) = (unit.is_module(), unit.declared_namespace()) {
            self.resolver.record_module_mapping(unit.name(), namespace);
            self.resolver.record_namespace_mapping(namespace, unit.name());
        }
        debug!(module = %unit.identity(), source = unit.source(), "registering unit");
        self.registry.add(&mut self.findings, unit);
        Ok(())
    }

    /// Sets the owner of every submodule whose `belongs-to` names exactly one
    /// registered module.
    fn link_submodules(&mut self) {
        let submodules: Vec<UnitId> = self
            .registry
            .all()
            .iter()
            .filter(|u| u.is_submodule())
            .map(Unit::id)
            .collect();
        for id in submodules {
            let owner = self.registry.get(id).belongs_to().and_then(|b| {
                match self.registry.by_name(&b.module).as_slice() {
                    [single] if self.registry.get(*single).is_module() => Some(*single),
                    _ => None,
                }
            });
            if let Some(owner) = owner {
                if let Some(namespace) = self.registry.get(owner).declared_namespace() {
                    let namespace = namespace.to_string();
                    let name = self.registry.get(id).name().to_string();
                    self.resolver.record_module_mapping(name, namespace);
                }
            }
            self.registry.get_mut(id).owner = owner;
        }
    }

    /// Runs `step`, turning an error or a panic into a single finding.
    fn guarded(&mut self, step: impl FnOnce(&mut Self) -> Result<()>) {
        let message = match catch_panic(|| step(self)) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("ResolveError: {err}"),
            Err(panic) => panic,
        };
        warn!(%message, "processing abandoned");
        self.findings
            .add_finding(Finding::general(FindingType::UnspecifiedError, message));
    }

    /// Runs every hook for `phase`. A hook that fails or panics is reported
    /// and the remaining hooks still run.
    pub(crate) fn run_hooks(&mut self, phase: HookPhase) {
        let mut hooks = std::mem::take(&mut self.hooks);
        for hook in &mut hooks {
            let outcome = catch_panic(|| match phase {
                HookPhase::Pre => hook.pre_process(self),
                HookPhase::Post => hook.post_process(self),
            });
            let cause = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic,
            };
            warn!(cause = %cause, ?phase, "hook failed");
            self.findings.add_finding(Finding::general(
                FindingType::UnspecifiedError,
                format!("Custom processor exception: {cause}"),
            ));
        }
        hooks.append(&mut self.hooks);
        self.hooks = hooks;
    }

    /// Reports a finding on `node`, located in the input the node was
    /// written in.
    pub(crate) fn report(&mut self, node: NodeId, finding_type: FindingType, message: impl Into<String>) {
        let stmt = self.tree.node(node);
        let source = self.registry.get(stmt.unit()).source().to_string();
        let finding = Finding::on_node(source, stmt.line(), node, finding_type, message);
        self.findings.add_finding(finding);
    }

    /// The unit `node` was written in.
    pub(crate) fn unit_of(&self, node: NodeId) -> &Unit {
        self.registry.get(self.tree.node(node).unit())
    }

    /// Namespace of `unit`; a submodule has the namespace of its owner.
    pub(crate) fn unit_namespace(&self, unit: UnitId) -> Option<String> {
        let unit = self.registry.get(unit);
        if unit.is_module() {
            return unit.declared_namespace().map(str::to_string);
        }
        unit.owner()
            .and_then(|owner| self.registry.get(owner).declared_namespace())
            .map(str::to_string)
    }

    /// Resolves `prefix` as written in the unit of `node`.
    pub(crate) fn module_for_prefix(&self, node: NodeId, prefix: &str) -> Option<ModuleIdentity> {
        self.unit_of(node).module_for_prefix(prefix)
    }

    /// Roots of all registered units, in registration order.
    pub(crate) fn unit_roots(&self) -> Vec<NodeId> {
        self.registry.all().iter().map(Unit::root).collect()
    }

    /// Submodules linked to `module`.
    pub(crate) fn owned_submodules(&self, module: UnitId) -> Vec<UnitId> {
        self.registry
            .all()
            .iter()
            .filter(|u| u.owner() == Some(module))
            .map(Unit::id)
            .collect()
    }
}

thread_local! {
    static PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static LOCATION_HOOK: Once = Once::new();

/// Chains a panic hook that remembers where the current thread panicked.
fn record_panic_locations() {
    LOCATION_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
            PANIC_LOCATION.with(|slot| *slot.borrow_mut() = location);
            previous(info);
        }));
    });
}

/// Runs `f`, describing a panic as `panic at file:line:col: message`.
fn catch_panic<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    record_panic_locations();
    PANIC_LOCATION.with(|slot| *slot.borrow_mut() = None);
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        match PANIC_LOCATION.with(|slot| slot.borrow_mut().take()) {
            Some(location) => format!("panic at {location}: {message}"),
            None => format!("panic: {message}"),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ParsedStatement;
    use crate::unit::ConformanceType;

    fn module(name: &str) -> ParsedStatement {
        ParsedStatement::new("module", name).with_children([
            ParsedStatement::new("namespace", format!("urn:{name}")),
            ParsedStatement::new("prefix", name),
        ])
    }

    fn input(source: &str, root: ParsedStatement) -> UnitInput {
        UnitInput::new(source, ConformanceType::Implement, root)
    }

    struct Failing;

    impl SchemaHook for Failing {
        fn pre_process(&mut self, _schema: &mut Schema) -> HookResult {
            Err("boom".into())
        }
    }

    #[derive(Default)]
    struct Counting(std::rc::Rc<std::cell::Cell<u32>>);

    impl SchemaHook for Counting {
        fn pre_process(&mut self, _schema: &mut Schema) -> HookResult {
            self.0.set(self.0.get() + 1);
            Ok(())
        }

        fn post_process(&mut self, schema: &mut Schema) -> HookResult {
            assert!(schema.is_processed());
            self.0.set(self.0.get() + 10);
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_source_reported_once() {
        let mut schema = Schema::default();
        schema
            .parse_into_schema(vec![input("a.yang", module("a")), input("a.yang", module("a"))])
            .unwrap();
        assert_eq!(schema.module_registry().len(), 1);
        assert_eq!(schema.findings().of_type(FindingType::DuplicateInput).count(), 1);
    }

    #[test]
    fn test_second_processing_is_rejected() {
        let mut schema = Schema::default();
        schema.parse_into_schema(vec![input("a.yang", module("a"))]).unwrap();
        assert!(matches!(
            schema.process_parsed_modules(),
            Err(ResolveError::AlreadyProcessed)
        ));
    }

    #[test]
    fn test_stop_after_initial_parse() {
        let config = ResolverConfig {
            stop_after_initial_parse: true,
            ..Default::default()
        };
        let mut schema = Schema::new(config);
        schema.parse_into_schema(vec![input("a.yang", module("a"))]).unwrap();
        assert!(!schema.is_processed());
        let root = schema.module("a").unwrap().root();
        assert_eq!(schema.tree().node(root).effective.namespace, None);
        schema.process_parsed_modules().unwrap();
        assert_eq!(
            schema.tree().node(root).effective.namespace.as_deref(),
            Some("urn:a")
        );
    }

    #[test]
    fn test_failing_hook_does_not_stop_others() {
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut schema = Schema::default();
        schema.add_hook(Failing);
        schema.add_hook(Counting(count.clone()));
        schema.parse_into_schema(vec![input("a.yang", module("a"))]).unwrap();
        assert_eq!(count.get(), 11);
        let finding = schema
            .findings()
            .of_type(FindingType::UnspecifiedError)
            .next()
            .unwrap();
        assert_eq!(finding.message, "Custom processor exception: boom");
    }

    struct Panicking;

    impl SchemaHook for Panicking {
        fn post_process(&mut self, _schema: &mut Schema) -> HookResult {
            panic!("hook blew up");
        }
    }

    #[test]
    fn test_panicking_hook_does_not_stop_others() {
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut schema = Schema::default();
        schema.add_hook(Panicking);
        schema.add_hook(Counting(count.clone()));
        schema.parse_into_schema(vec![input("a.yang", module("a"))]).unwrap();

        assert_eq!(count.get(), 11);
        assert_eq!(schema.hooks.len(), 2);
        let messages: Vec<&str> = schema
            .findings()
            .of_type(FindingType::UnspecifiedError)
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Custom processor exception: panic at "));
        assert!(messages[0].contains("schema.rs:"));
        assert!(messages[0].ends_with(": hook blew up"));
    }

    #[test]
    fn test_panic_reports_its_location() {
        let mut schema = Schema::default();
        schema.guarded(|_| -> Result<()> { panic!("broken invariant") });
        let finding = schema
            .findings()
            .of_type(FindingType::UnspecifiedError)
            .next()
            .unwrap();
        assert!(finding.message.starts_with("panic at "), "{}", finding.message);
        assert!(finding.message.contains("schema.rs:"));
        assert!(finding.message.ends_with(": broken invariant"));
    }

    #[test]
    fn test_unknown_keyword_is_invalid_input() {
        let mut schema = Schema::default();
        let bad = module("a").with_child(ParsedStatement::new("bogus", "x"));
        assert!(matches!(
            schema.parse_into_schema(vec![input("a.yang", bad)]),
            Err(ResolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_submodule_linked_to_owner() {
        let owner = module("a").with_child(ParsedStatement::new("include", "a-sub"));
        let sub = ParsedStatement::new("submodule", "a-sub").with_child(
            ParsedStatement::new("belongs-to", "a").with_child(ParsedStatement::new("prefix", "a")),
        );
        let mut schema = Schema::default();
        schema
            .parse_into_schema(vec![input("a.yang", owner), input("a-sub.yang", sub)])
            .unwrap();
        let sub = schema.module("a-sub").unwrap();
        assert_eq!(sub.owner(), schema.module("a").map(Unit::id));
        assert_eq!(schema.namespace_resolver().namespace_for_module("a-sub"), Some("urn:a"));
        assert_eq!(schema.namespace_resolver().module_for_namespace("urn:a"), Some("a"));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
