use pathcodec::{
    BindingGroup, BranchAcquisition, DecodeRoot, EncodeRoot, FallbackPolicy, FieldCustomization,
    FieldDescriptor, Mutability, PlanError, PlannerOptions, Statement, StructDeclaration,
    TypeDescriptor,
};

fn int(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, TypeDescriptor::integer())
}

fn plan(decl: StructDeclaration) -> pathcodec::StructPlan {
    decl.plan(&PlannerOptions::default()).unwrap()
}

fn decoded_fields(statements: &[Statement]) -> Vec<&str> {
    statements
        .iter()
        .filter_map(|statement| match statement {
            Statement::Decode(decode) => Some(decode.field.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn nested_container_guarded_by_only_policy_present() {
    pathcodec_testhelpers::setup();

    let fallback = FallbackPolicy::OnlyIfMissing(vec![Statement::AssignDefault {
        field: "c".into(),
        value: pathcodec::DefaultExpr::new("0"),
    }]);
    let plan = plan(
        StructDeclaration::new("Item")
            .with_field(int("a"))
            .with_field(int("b").coded_at(["meta", "id"]))
            .with_field(int("c").coded_at(["meta", "kind"]).with_fallback(fallback.clone())),
    );

    assert_eq!(plan.decode.root, DecodeRoot::Acquire);
    assert_eq!(decoded_fields(&plan.decode.body.statements), ["a"]);
    assert!(plan.decode.body.setup.is_empty());

    let [meta] = plan.decode.body.branches.as_slice() else {
        panic!("expected one nested container");
    };
    assert_eq!(meta.key.name, "meta");
    assert_eq!(meta.acquisition, BranchAcquisition::Guarded);
    assert_eq!(meta.fallback, fallback);
    assert_eq!(decoded_fields(&meta.body.statements), ["b", "c"]);

    insta::assert_snapshot!(plan.to_string(), @r#"
    struct Item
    keys: a="a", meta="meta", b="id", c="kind"
    decode:
      container = decoder.keyed()
      a = container["a"] as Int
      try meta_container = container.nested("meta") else missing {c = 0}:
        b = meta_container["id"] as Int
        c = meta_container["kind"] as Int else missing {c = 0}
      required: a, b
    encode:
      let container = encoder.keyed()
      container["a"] <- a as Int
      let meta_container = container.nested("meta"):
        meta_container["id"] <- b as Int
        meta_container["kind"] <- c as Int
    "#);
}

#[test]
fn required_subtrees_are_hoisted() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Pair")
            .with_field(int("left").coded_at(["pair", "l"]))
            .with_field(int("right").coded_at(["pair", "r"])),
    );
    assert_eq!(plan.decode.body.setup.len(), 1);
    assert_eq!(plan.decode.body.setup[0].container, "pair_container");
    assert_eq!(
        plan.decode.body.branches[0].acquisition,
        BranchAcquisition::Hoisted
    );
    assert_eq!(plan.decode.body.acquisition_count(), 1);
}

#[test]
fn dependency_on_deeper_field_is_deferred() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Invoice")
            .with_field(int("total").depends_on("price"))
            .with_field(int("price").coded_at(["meta", "price"])),
    );
    assert!(plan.decode.body.statements.is_empty());
    assert_eq!(decoded_fields(&plan.decode.body.deferred), ["total"]);

    insta::assert_snapshot!(plan.decode.to_string(), @r#"
    container = decoder.keyed()
    meta_container = container.nested("meta")
    in meta_container:
      price = meta_container["price"] as Int
    deferred:
      total = container["total"] as Int
    required: total, price
    "#);
}

#[test]
fn crossing_subtree_dependencies_are_rejected() {
    pathcodec_testhelpers::setup();

    let err = StructDeclaration::new("Tangle")
        .with_field(int("f1").coded_at(["x", "f1"]).depends_on("g2"))
        .with_field(int("f2").coded_at(["x", "f2"]))
        .with_field(int("g1").coded_at(["y", "g1"]).depends_on("f2"))
        .with_field(int("g2").coded_at(["y", "g2"]))
        .plan(&PlannerOptions::default())
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::UnorderableDependency {
            field: "f1".into(),
            dependency: "g2".into(),
        }
    );
}

#[test]
fn providing_subtree_is_visited_first() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Ordered")
            .with_field(int("late").coded_at(["first", "late"]).depends_on("early"))
            .with_field(int("early").coded_at(["second", "early"])),
    );
    let order: Vec<_> = plan
        .decode
        .body
        .branches
        .iter()
        .map(|branch| branch.key.name.as_str())
        .collect();
    assert_eq!(order, ["second", "first"]);
}

#[test]
fn value_and_container_on_one_path_is_rejected() {
    pathcodec_testhelpers::setup();

    let err = StructDeclaration::new("Clash")
        .with_field(int("a").coded_at(["x"]))
        .with_field(int("b").coded_at(["x", "y"]))
        .plan(&PlannerOptions::default())
        .unwrap_err();
    assert!(matches!(err, PlanError::PathConflict { .. }), "{err}");
}

#[test]
fn write_only_subtree_is_never_acquired() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Audit")
            .with_field(int("id"))
            .with_field(int("stamp").coded_at(["audit", "at"]).ignore_decoding()),
    );
    assert_eq!(plan.decode.body.acquisition_count(), 0);
    assert!(plan.decode.body.branches.is_empty());
    // still written
    assert_eq!(plan.encode.body.container_count(), 1);
}

#[test]
fn read_only_subtree_creates_no_container() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Input")
            .with_field(int("legacy").coded_at(["old", "value"]).ignore_encoding()),
    );
    assert_eq!(plan.encode.root, EncodeRoot::Skip);
    assert_eq!(plan.encode.body.container_count(), 0);
    assert_eq!(plan.decode.root, DecodeRoot::Acquire);
}

#[test]
fn unused_keys_are_pruned() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Sparse")
            .with_field(int("kept"))
            .with_field(int("gone").coded_at(["nowhere", "gone"]).ignore_coding()),
    );
    let names: Vec<_> = plan.keys.iter().map(|key| key.name.as_str()).collect();
    assert_eq!(names, ["kept"]);
}

#[test]
fn ignored_sibling_keys_are_pruned() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Sparse")
            .with_field(int("kept"))
            .with_field(int("gone").ignore_coding())
            .with_field(int("written").coded_at(["out"]).ignore_decoding()),
    );
    let names: Vec<_> = plan.keys.iter().map(|key| key.name.as_str()).collect();
    assert_eq!(names, ["kept", "out"]);
}

#[test]
fn conditional_encoding_makes_containers_mutable() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Profile")
            .with_field(int("id"))
            .with_field(
                FieldDescriptor::new("nick", TypeDescriptor::string().optional())
                    .coded_at(["extra", "nick"])
                    .skip_encoding_if("nick_is_empty"),
            )
            .with_field(int("age").coded_at(["stats", "age"])),
    );
    assert_eq!(plan.encode.root, EncodeRoot::Create(Mutability::Mutable));
    let mutability: Vec<_> = plan
        .encode
        .body
        .branches
        .iter()
        .map(|branch| (branch.key.name.as_str(), branch.mutability))
        .collect();
    assert_eq!(
        mutability,
        [
            ("extra", Mutability::Mutable),
            ("stats", Mutability::Immutable)
        ]
    );
}

#[test]
fn conditional_decoding_and_placeholders() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Settings")
            .with_field(FieldDescriptor::new("version", TypeDescriptor::integer()))
            .with_field(
                FieldDescriptor::new("theme", TypeDescriptor::string())
                    .with_default("\"light\"")
                    .decode_when("is_v2")
                    .depends_on("version"),
            )
            .with_field(
                FieldDescriptor::new("cache", TypeDescriptor::any().optional()).ignore_decoding(),
            ),
    );

    insta::assert_snapshot!(plan.decode.to_string(), @r#"
    cache = none
    container = decoder.keyed()
    version = container["version"] as Int
    if is_v2:
      theme = container["theme"] as String else missing {theme = "light"}
    else:
      theme = "light"
    required: version
    "#);
}

#[test]
fn flattened_fields_read_the_container_coder() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Wrapper")
            .with_field(FieldDescriptor::new("inner", TypeDescriptor::named("Inner")).flattened()),
    );
    assert_eq!(plan.decode.root, DecodeRoot::Skip);
    assert_eq!(plan.encode.root, EncodeRoot::Skip);
    assert!(plan.keys.is_empty());
    match &plan.decode.body.statements[..] {
        [Statement::Decode(decode)] => assert!(decode.key.is_none()),
        other => panic!("unexpected statements: {other:?}"),
    }
}

#[test]
fn binding_groups_expand() {
    pathcodec_testhelpers::setup();

    let group = BindingGroup::new(["width", "height"], TypeDescriptor::integer())
        .with_default("0")
        .with(FieldCustomization::CodedAt(vec!["size".into()]));
    let plan = plan(StructDeclaration::new("Size").with_group(&group).unwrap());
    let names: Vec<_> = plan.keys.iter().map(|key| key.name.as_str()).collect();
    assert_eq!(names, ["size", "width", "height"]);
    assert!(plan.decode.required.is_empty());

    let bad = BindingGroup::new(["x", "y", "z"], TypeDescriptor::integer())
        .with_default("0")
        .with_default("1");
    assert_eq!(
        StructDeclaration::new("Bad").with_group(&bad).unwrap_err(),
        PlanError::DefaultCountMismatch {
            bindings: vec!["x".into(), "y".into(), "z".into()],
            defaults: 2,
        }
    );
}

#[test]
fn duplicate_field_names_are_rejected() {
    pathcodec_testhelpers::setup();

    let err = StructDeclaration::new("Twice")
        .with_field(int("a"))
        .with_field(int("a").coded_at(["other"]))
        .plan(&PlannerOptions::default())
        .unwrap_err();
    assert_eq!(err, PlanError::DuplicateField { name: "a".into() });
}

#[test]
fn identifiers_avoid_reserved_words_and_clashes() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Event")
            .with_field(int("kind").coded_at(["type"]))
            .with_field(int("at").coded_at(["meta-data", "at"]))
            .with_field(int("loop").coded_at(["loop"])),
    );
    let keys: Vec<_> = plan
        .keys
        .iter()
        .map(|key| (key.ident.as_str(), key.name.as_str()))
        .collect();
    assert_eq!(
        keys,
        [
            ("kind", "type"),
            ("metaData", "meta-data"),
            ("at", "at"),
            ("loop1", "loop"),
        ]
    );
}

#[test]
fn plans_persist_as_json() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Stored")
            .with_field(int("a").coded_at(["x", "a"]).with_default("1"))
            .with_field(int("b").coded_by("hex")),
    );
    let json = serde_json::to_string(&plan).unwrap();
    let back: pathcodec::StructPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, plan);
}
