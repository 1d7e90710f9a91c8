//! End-to-end declaration tests: a realistic schema tree is declared the
//! way an application would at startup, closed, and finished.

use input_schema::{
    Abstract, Array, DefaultValue, DoubleType, FileNameType, Instance, IntegerType, Parameter,
    Record, Registry, SchemaError, SchemaNode, Selection, StringType, Tuple, TypeRef,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Declare the full schema of a small simulation input: an abstract solver
/// with two descendants, a mesh record with file and region keys, and a
/// root record tying them together through a forward reference.
fn declare_simulation_schema(registry: &Registry) -> Arc<SchemaNode> {
    Abstract::new("Solver", "Family of linear solvers.")
        .declare_key(
            "max_it",
            IntegerType::bounded(1, 100_000),
            DefaultValue::Declaration("1000".to_string()),
            "Iteration limit.",
        )
        .close(registry);

    let parent = registry.abstract_by_name("Solver").unwrap();
    Record::new("Cg", "Conjugate gradient solver.")
        .derive_from(&parent)
        .declare_key(
            "tolerance",
            DoubleType::bounded(0.0, 1.0),
            DefaultValue::Declaration("1e-7".to_string()),
            "Relative residual tolerance.",
        )
        .close(registry);
    Record::new("Lu", "Direct sparse LU factorization.")
        .derive_from(&parent)
        .close(registry);

    let mesh = Record::new("Mesh", "Computational mesh input.")
        .declare_key(
            "mesh_file",
            FileNameType::input(),
            DefaultValue::Obligatory,
            "Path to the mesh file.",
        )
        .declare_key(
            "regions",
            Array::any(StringType::new()).close(registry),
            DefaultValue::Optional,
            "Region labels to load.",
        )
        .close(registry);

    Record::new("Simulation", "Root of the simulation input.")
        .declare_key("mesh", &mesh, DefaultValue::Obligatory, "")
        .declare_key(
            "solver",
            TypeRef::deferred("Solver"),
            DefaultValue::Obligatory,
            "",
        )
        .close(registry)
}

#[test]
fn test_full_schema_declares_and_finishes() {
    init_tracing();
    let registry = Registry::new();
    let root = declare_simulation_schema(&registry);

    registry.lazy_finish().unwrap();
    assert!(registry.is_finished());

    assert_eq!(root.type_name(), "Simulation");
    assert_eq!(
        registry.descendant_names("Solver"),
        vec!["Cg".to_string(), "Lu".to_string()]
    );
    // The deferred solver key resolves through the registry after finish.
    let solver_key = root.as_record().unwrap().key("solver").unwrap();
    let resolved = solver_key.type_ref.resolve(&registry, "Simulation").unwrap();
    assert_eq!(resolved.type_name(), "Solver");
}

#[test]
fn test_redeclaration_collapses_to_canonical_instance() {
    init_tracing();
    let registry = Registry::new();
    let first = declare_simulation_schema(&registry);
    let second = declare_simulation_schema(&registry);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_hash_is_stable_across_registries() {
    let a = declare_simulation_schema(&Registry::new());
    let b = declare_simulation_schema(&Registry::new());
    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn test_finish_reports_missing_abstract() {
    let registry = Registry::new();
    Record::new("Orphan", "")
        .declare_key(
            "solver",
            TypeRef::deferred("NeverDeclared"),
            DefaultValue::Obligatory,
            "",
        )
        .close(&registry);
    let err = registry.lazy_finish().unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnresolvedReference {
            name: "NeverDeclared".to_string(),
            referrer: "Orphan".to_string(),
        }
    );
}

#[test]
fn test_selection_round_trip_through_registry() {
    let registry = Registry::new();
    let node = Selection::new("TimeUnit", "Units for time values.")
        .add_value(0, "seconds", "")
        .add_value(1, "hours", "")
        .close(&registry);
    assert!(Arc::ptr_eq(
        &registry.selection_by_hash(node.content_hash()).unwrap(),
        &node
    ));
    let sel = node.as_selection().unwrap();
    assert_eq!(sel.name_to_int("hours").unwrap(), 1);
    assert_eq!(sel.int_to_name(0).unwrap(), "seconds");
}

#[test]
fn test_tuple_positions_follow_declaration_order() {
    let registry = Registry::new();
    let node = Tuple::new("TimeGrid", "Start, end and step of a time grid.")
        .declare_key("start", DoubleType::new(), DefaultValue::Obligatory, "")
        .declare_key("end", DoubleType::new(), DefaultValue::Obligatory, "")
        .declare_key(
            "step",
            DoubleType::new(),
            DefaultValue::Declaration("1.0".to_string()),
            "",
        )
        .close(&registry);
    let rec = node.as_record().unwrap();
    assert_eq!(rec.key("start").unwrap().index, 0);
    assert_eq!(rec.key("step").unwrap().index, 2);
}

#[test]
fn test_generic_template_instantiates_per_binding() {
    let registry = Registry::new();
    let template = Record::new("FieldConstant", "Field with one constant value.")
        .declare_key("value", Parameter::new("element"), DefaultValue::Obligatory, "")
        .close(&registry);

    let scalar_field = Instance::new(&template)
        .bind("element", DoubleType::new())
        .close(&registry);
    let index_field = Instance::new(&template)
        .bind("element", IntegerType::bounded(0, 1 << 20))
        .close(&registry);

    assert!(template.is_generic());
    assert!(!scalar_field.is_generic());
    assert_ne!(scalar_field.content_hash(), index_field.content_hash());
    // Both instances are published as ordinary records.
    assert!(registry.record_by_hash(scalar_field.content_hash()).is_some());
    assert!(registry.record_by_hash(index_field.content_hash()).is_some());
}
