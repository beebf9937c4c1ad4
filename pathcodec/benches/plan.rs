//! Planning cost for wide and deep declarations, one by one and in batches.

use divan::{Bencher, black_box};
use pathcodec::{
    CaseDescriptor, Declaration, EnumDeclaration, FieldDescriptor, PlannerOptions,
    StructDeclaration, TaggingRequest, TypeDescriptor, plan_all,
};

fn main() {
    divan::main();
}

/// `width` fields spread over `width / 4` nested containers, every other one
/// defaulted and each depending on its predecessor.
fn wide(width: usize) -> StructDeclaration {
    let fields = (0..width).map(|i| {
        let field = FieldDescriptor::new(format!("f{i}"), TypeDescriptor::integer())
            .coded_at([format!("group{}", i / 4), format!("key-{i}")]);
        let field = if i % 2 == 0 {
            field.with_default("0")
        } else {
            field
        };
        if i > 0 {
            field.depends_on(format!("f{}", i - 1))
        } else {
            field
        }
    });
    StructDeclaration::new("Wide").with_fields(fields)
}

/// One field per depth level along a single path.
fn deep(depth: usize) -> StructDeclaration {
    let fields = (1..=depth).map(|level| {
        let mut path: Vec<String> = (0..level).map(|d| format!("level{d}")).collect();
        path.push(format!("value{level}"));
        FieldDescriptor::new(format!("v{level}"), TypeDescriptor::string().optional())
            .coded_at(path)
    });
    StructDeclaration::new("Deep").with_fields(fields)
}

fn tagged(cases: usize) -> EnumDeclaration {
    (0..cases).fold(
        EnumDeclaration::new("Tagged").tagged(TaggingRequest::TagAt(vec!["type".into()])),
        |decl, i| {
            decl.with_case(
                CaseDescriptor::new(format!("Case{i}")).with_field(
                    FieldDescriptor::new(format!("payload{i}"), TypeDescriptor::integer())
                        .coded_at(["data".to_string(), format!("p{i}")]),
                ),
            )
        },
    )
}

#[divan::bench(args = [8, 64, 256])]
fn struct_wide(bencher: Bencher, width: usize) {
    let decl = wide(width);
    let options = PlannerOptions::default();
    bencher.bench(|| black_box(decl.plan(&options)));
}

#[divan::bench(args = [4, 16, 64])]
fn struct_deep(bencher: Bencher, depth: usize) {
    let decl = deep(depth);
    let options = PlannerOptions::default();
    bencher.bench(|| black_box(decl.plan(&options)));
}

#[divan::bench(args = [4, 32, 128])]
fn enum_internal(bencher: Bencher, cases: usize) {
    let decl = tagged(cases);
    let options = PlannerOptions::default();
    bencher.bench(|| black_box(decl.plan(&options)));
}

#[divan::bench(args = [16, 256])]
fn batch(bencher: Bencher, count: usize) {
    let declarations: Vec<Declaration> = (0..count)
        .map(|i| {
            if i % 2 == 0 {
                wide(32).into()
            } else {
                tagged(8).into()
            }
        })
        .collect();
    let options = PlannerOptions::default();
    bencher.bench(|| black_box(plan_all(&declarations, &options)));
}
