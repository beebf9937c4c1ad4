use pathcodec::{
    DefaultExpr, FallbackPolicy, FieldDescriptor, PlannerOptions, Statement, StructDeclaration,
    StructPlan, TypeDescriptor,
};
use pathcodec_json::{
    DecodeErrorKind, EncodeErrorKind, FnConverter, Hooks, Record, decode_struct, encode_struct,
};
use serde_json::{Value, json};

fn int(name: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, TypeDescriptor::integer())
}

fn plan(decl: StructDeclaration) -> StructPlan {
    decl.plan(&PlannerOptions::default()).unwrap()
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("not an object: {other}"),
    }
}

fn item() -> StructPlan {
    let fallback = FallbackPolicy::OnlyIfMissing(vec![Statement::AssignDefault {
        field: "c".into(),
        value: DefaultExpr::new("0"),
    }]);
    plan(
        StructDeclaration::new("Item")
            .with_field(int("a"))
            .with_field(int("b").coded_at(["meta", "id"]))
            .with_field(int("c").coded_at(["meta", "kind"]).with_fallback(fallback)),
    )
}

#[test]
fn nested_values_round_trip() {
    pathcodec_testhelpers::setup();

    let plan = item();
    let hooks = Hooks::new();
    let document = json!({"a": 1, "meta": {"id": 2, "kind": 3}});

    let decoded = decode_struct(&plan, &document, &hooks).unwrap();
    assert_eq!(decoded, record(json!({"a": 1, "b": 2, "c": 3})));
    assert_eq!(encode_struct(&plan, &decoded, &hooks).unwrap(), document);
}

#[test]
fn missing_key_falls_back_to_default() {
    pathcodec_testhelpers::setup();

    let decoded = decode_struct(
        &item(),
        &json!({"a": 1, "meta": {"id": 2}}),
        &Hooks::new(),
    )
    .unwrap();
    assert_eq!(decoded["c"], json!(0));
}

#[test]
fn missing_container_runs_recovery_then_reports_required_field() {
    pathcodec_testhelpers::setup();

    let err = decode_struct(&item(), &json!({"a": 1}), &Hooks::new()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::MissingField { field: "b".into() });
    insta::assert_snapshot!(err.to_string(), @"missing field 'b' (at <root>)");
}

#[test]
fn hoisted_container_must_exist() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Pair")
            .with_field(int("left").coded_at(["pair", "l"]))
            .with_field(int("right").coded_at(["pair", "r"])),
    );
    let err = decode_struct(&plan, &json!({"pair": 5}), &Hooks::new()).unwrap_err();
    assert_eq!(
        err.kind,
        DecodeErrorKind::NotAContainer {
            key: Some("pair".into()),
            found: "number",
        }
    );

    let err = decode_struct(&plan, &json!({"pair": {"l": 1}}), &Hooks::new()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::MissingKey { key: "r".into() });
    assert_eq!(err.path.to_string(), "pair");
}

#[test]
fn defaults_on_error_replace_invalid_values() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Counter")
            .with_field(int("count").with_default_on_error("0"))
            .with_field(int("limit").with_default("10")),
    );
    let hooks = Hooks::new();

    let decoded = decode_struct(&plan, &json!({"count": "many"}), &hooks).unwrap();
    assert_eq!(decoded, record(json!({"count": 0, "limit": 10})));

    // a plain default only covers absence
    let err = decode_struct(&plan, &json!({"limit": "x"}), &hooks).unwrap_err();
    assert!(
        matches!(&err.kind, DecodeErrorKind::TypeMismatch { field, found: "string", .. } if field == "limit"),
        "{err}"
    );
}

#[test]
fn optional_fields_read_and_write_if_present() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Contact")
            .with_field(FieldDescriptor::new("name", TypeDescriptor::string()))
            .with_field(
                FieldDescriptor::new("email", TypeDescriptor::string().optional())
                    .coded_at(["channels", "email"]),
            ),
    );
    let hooks = Hooks::new();

    let decoded = decode_struct(&plan, &json!({"name": "ada"}), &hooks).unwrap();
    assert_eq!(decoded["email"], Value::Null);
    assert_eq!(
        encode_struct(&plan, &decoded, &hooks).unwrap(),
        json!({"name": "ada", "channels": {}})
    );
}

#[test]
fn deferred_reads_see_nested_values() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Invoice")
            .with_field(int("total").depends_on("price"))
            .with_field(int("price").coded_at(["meta", "price"])),
    );
    let decoded = decode_struct(
        &plan,
        &json!({"total": 10, "meta": {"price": 4}}),
        &Hooks::new(),
    )
    .unwrap();
    let order: Vec<_> = decoded.keys().map(String::as_str).collect();
    assert_eq!(order, ["price", "total"]);
}

#[test]
fn converters_replace_default_coding() {
    pathcodec_testhelpers::setup();

    let plan = plan(StructDeclaration::new("Color").with_field(int("rgb").coded_by("hex")));
    let hooks = Hooks::new().with_converter(
        "hex",
        FnConverter::new(
            |value: &Value| {
                let text = value.as_str().ok_or("expected a string")?;
                i64::from_str_radix(text, 16)
                    .map(Value::from)
                    .map_err(|err| err.to_string())
            },
            |value: &Value| {
                let number = value.as_i64().ok_or("expected an integer")?;
                Ok(Value::from(format!("{number:x}")))
            },
        ),
    );

    let decoded = decode_struct(&plan, &json!({"rgb": "ff00"}), &hooks).unwrap();
    assert_eq!(decoded["rgb"], json!(0xff00));
    assert_eq!(
        encode_struct(&plan, &decoded, &hooks).unwrap(),
        json!({"rgb": "ff00"})
    );

    let err = decode_struct(&plan, &json!({"rgb": "zz"}), &hooks).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::Converter { .. }), "{err}");

    let err = decode_struct(&plan, &json!({"rgb": "ff"}), &Hooks::new()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnknownConverter("hex".into()));
}

#[test]
fn decode_conditions_see_earlier_fields() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Settings")
            .with_field(int("version"))
            .with_field(
                FieldDescriptor::new("theme", TypeDescriptor::string())
                    .with_default("\"light\"")
                    .decode_when("is_v2")
                    .depends_on("version"),
            ),
    );
    let hooks = Hooks::new()
        .with_decode_predicate("is_v2", |fields: &Record| fields["version"] == json!(2));

    let v1 = decode_struct(&plan, &json!({"version": 1, "theme": "dark"}), &hooks).unwrap();
    assert_eq!(v1["theme"], json!("light"));

    let v2 = decode_struct(&plan, &json!({"version": 2, "theme": "dark"}), &hooks).unwrap();
    assert_eq!(v2["theme"], json!("dark"));

    let err = decode_struct(&plan, &json!({"version": 2}), &Hooks::new()).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnknownPredicate("is_v2".into()));
}

#[test]
fn conditional_writes_leave_no_empty_containers() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Profile")
            .with_field(int("id"))
            .with_field(
                FieldDescriptor::new("nick", TypeDescriptor::string())
                    .coded_at(["extra", "nick"])
                    .skip_encoding_if("nick_is_empty"),
            )
            .with_field(int("age").coded_at(["stats", "age"])),
    );
    let hooks = Hooks::new()
        .with_encode_predicate("nick_is_empty", |fields: &Record| fields["nick"] == json!(""));

    let quiet = record(json!({"id": 1, "nick": "", "age": 30}));
    assert_eq!(
        encode_struct(&plan, &quiet, &hooks).unwrap(),
        json!({"id": 1, "stats": {"age": 30}})
    );

    let named = record(json!({"id": 1, "nick": "ace", "age": 30}));
    assert_eq!(
        encode_struct(&plan, &named, &hooks).unwrap(),
        json!({"id": 1, "extra": {"nick": "ace"}, "stats": {"age": 30}})
    );

    let err = encode_struct(&plan, &record(json!({"nick": "ace", "age": 30})), &hooks).unwrap_err();
    assert_eq!(err.kind, EncodeErrorKind::MissingField { field: "id".into() });
}

#[test]
fn flattened_fields_merge_into_the_container() {
    pathcodec_testhelpers::setup();

    let plan = plan(
        StructDeclaration::new("Tagged")
            .with_field(FieldDescriptor::new("label", TypeDescriptor::string()))
            .with_field(FieldDescriptor::new("extra", TypeDescriptor::any()).flattened()),
    );
    let hooks = Hooks::new();

    let document = json!({"label": "x", "size": 3});
    let decoded = decode_struct(&plan, &document, &hooks).unwrap();
    assert_eq!(decoded["extra"], document);

    let encoded = encode_struct(
        &plan,
        &record(json!({"label": "x", "extra": {"size": 3}})),
        &hooks,
    )
    .unwrap();
    assert_eq!(encoded, document);

    let err = encode_struct(&plan, &record(json!({"label": "x", "extra": 3})), &hooks).unwrap_err();
    assert_eq!(
        err.kind,
        EncodeErrorKind::NotAnObject {
            field: "extra".into(),
            found: "number",
        }
    );
}
