//! Performance benchmarks for module emission.
//!
//! Workloads drive the emitter directly, the way a code generator would:
//! - Straight-line code of growing size
//! - Branch-heavy code (loops, switches, try/finally)
//! - Many classes with traits and metadata
//! - Constant pool interning under heavy reuse
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```
//!
//! The hot paths (pool interning, method finishing, serialization) are
//! instrumented with `profiling::function`.

use abc_emit::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
use std::collections::HashMap;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[cfg(feature = "profile-with-puffin")]
fn collect_scopes(
    stream: &puffin::Stream,
    scope: &puffin::Scope,
    scopes: &puffin::ScopeCollection,
    timings: &mut HashMap<String, i64>,
) {
    use puffin::Reader;

    if let Some(details) = scopes.fetch_by_id(&scope.id) {
        *timings.entry(details.name().to_string()).or_insert(0) += scope.record.duration_ns;
    }
    if scope.child_begin_position < scope.child_end_position
        && let Ok(reader) = Reader::with_offset(stream, scope.child_begin_position)
        && let Ok(children) = reader.read_top_scopes()
    {
        for child in children {
            collect_scopes(stream, &child, scopes, timings);
        }
    }
}

/// Print per-scope time summed over every recorded frame.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        return;
    };
    let view = frame_view.lock();
    let mut timings = HashMap::new();
    let mut frames = 0i64;
    for frame in view.recent_frames() {
        frames += 1;
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_, stream_info) in unpacked.thread_streams.iter() {
            if let Ok(scopes) = Reader::from_start(&stream_info.stream).read_top_scopes() {
                for scope in scopes {
                    collect_scopes(
                        &stream_info.stream,
                        &scope,
                        view.scope_collection(),
                        &mut timings,
                    );
                }
            }
        }
    }

    let mut entries: Vec<_> = timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    println!("\n=== Emission profile ({frames} frames) ===");
    for (name, ns) in entries {
        let avg = std::time::Duration::from_nanos((ns / frames.max(1)) as u64);
        println!("  {name:40} {avg:>10.2?} avg");
    }
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

// =============================================================================
// Workloads
// =============================================================================

/// One method of `statements` `local = local + <n>` statements.
fn straight_line(statements: u32) -> Vec<u8> {
    let mut e = AbcEmitter::new(EmitterConfig::new());
    e.start_method("$init", FrameLayout::new(0, 1)).unwrap();
    e.load_this();
    e.push_scope();
    for n in 0..statements {
        e.get_local(1);
        e.push_number(&NumberLiteral::Int(n as i32 * 37));
        e.invoke_binary(BinaryOp::Add, &NumberUsage::default());
        e.set_local(1);
    }
    e.return_void();
    let init = e.finish_method("$init", &MethodSignature::default()).unwrap();
    e.finish_program("", init, &TraitOwner::default()).unwrap();
    e.finish().unwrap()
}

/// Nested loops with a switch and a try/finally per iteration.
fn branchy(loops: u32) -> Vec<u8> {
    let mut e = AbcEmitter::new(EmitterConfig::new());
    e.start_method("$init", FrameLayout::new(0, 1)).unwrap();
    for _ in 0..loops {
        e.loop_begin().unwrap();
        e.try_begin(true).unwrap();

        e.switch_begin().unwrap();
        e.case_label(false).unwrap();
        e.break_loop(1).unwrap();
        e.case_label(true).unwrap();
        e.continue_loop(0).unwrap();
        let table = e.ip();
        e.patch_switch_begin(table).unwrap();
        e.get_local(1);
        e.switch_table().unwrap();
        e.patch_break(1).unwrap();

        e.push_byte(-1);
        e.catch_clauses_begin().unwrap();
        e.catch_clauses_end().unwrap();
        e.finally_clause_begin().unwrap();
        e.finally_clause_end().unwrap();

        let test = e.ip();
        e.patch_continue(0).unwrap();
        e.patch_loop_begin(test).unwrap();
        e.get_local(1);
        e.loop_end(BranchKind::IfTrue).unwrap();
        e.patch_break(0).unwrap();
    }
    e.return_void();
    let init = e.finish_method("$init", &MethodSignature::default()).unwrap();
    e.finish_program("", init, &TraitOwner::default()).unwrap();
    e.finish().unwrap()
}

/// `classes` classes with a handful of members each.
fn classes(classes: u32) -> Vec<u8> {
    let mut e = AbcEmitter::new(EmitterConfig::new());
    let package = Namespace::package("bench");
    let event = MetadataEntry::new("Event").with_pair("name", "change");
    let mut definitions = Vec::new();

    for i in 0..classes {
        let name = QName::new(package.clone(), format!("C{i}"));
        let full = name.to_string();
        for suffix in ["$cinit", "$iinit", "/update"] {
            let method = format!("{full}{suffix}");
            e.start_method(&method, FrameLayout::default()).unwrap();
            e.return_void();
            e.finish_method(&method, &MethodSignature::default()).unwrap();
        }

        let mut class = ClassDecl::new(name.clone());
        class.base = Some(QName::public("Object"));
        class.instance = TraitOwner::new(vec![
            MemberDecl::Slot(
                SlotDecl::var("count", Namespace::public(), Some(TypeName::public("int")))
                    .with_metadata(event.clone()),
            ),
            MemberDecl::Slot(SlotDecl::constant(
                "LIMIT",
                Namespace::public(),
                Some(TypeName::public("uint")),
                DefaultValue::Uint(i),
            )),
            MemberDecl::Method(MethodDecl::new(
                "update",
                Namespace::public(),
                MethodKind::Method,
                format!("{full}/update"),
            )),
        ]);
        e.finish_class(&class).unwrap();

        let mut slot = SlotDecl::var(name.name.clone(), package.clone(), None);
        slot.value = SlotValue::Class(name);
        definitions.push(MemberDecl::Slot(slot));
    }

    e.start_method("$init", FrameLayout::default()).unwrap();
    e.return_void();
    let init = e.finish_method("$init", &MethodSignature::default()).unwrap();
    e.finish_program("bench", init, &TraitOwner::new(definitions))
        .unwrap();
    e.finish().unwrap()
}

/// `pushes` string pushes cycling over a small vocabulary.
fn interning(pushes: u32) -> Vec<u8> {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"];
    let mut e = AbcEmitter::new(EmitterConfig::new());
    e.start_method("$init", FrameLayout::default()).unwrap();
    for i in 0..pushes {
        e.push_string(words[i as usize % words.len()]);
        e.pop();
    }
    e.return_void();
    let init = e.finish_method("$init", &MethodSignature::default()).unwrap();
    e.finish_program("", init, &TraitOwner::default()).unwrap();
    e.finish().unwrap()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn size_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("emit/straight_line");
    for statements in [10u32, 100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(statements as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(statements),
            &statements,
            |b, &n| {
                b.iter(|| {
                    let bytes = straight_line(black_box(n));
                    end_profiling_frame();
                    black_box(bytes.len())
                });
            },
        );
    }
    group.finish();
}

fn control_flow_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/control_flow");
    for loops in [10u32, 100, 500] {
        group.throughput(Throughput::Elements(loops as u64));
        group.bench_with_input(BenchmarkId::from_parameter(loops), &loops, |b, &n| {
            b.iter(|| {
                let bytes = branchy(black_box(n));
                end_profiling_frame();
                black_box(bytes.len())
            });
        });
    }
    group.finish();
}

fn class_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/classes");
    for count in [10u32, 100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let bytes = classes(black_box(n));
                end_profiling_frame();
                black_box(bytes.len())
            });
        });
    }
    group.finish();
}

fn pool_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit/interning");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("strings_10000", |b| {
        b.iter(|| {
            let bytes = interning(black_box(10_000));
            end_profiling_frame();
            black_box(bytes.len())
        });
    });
    group.finish();
    print_profiling_stats();
}

criterion_group!(
    benches,
    size_benchmarks,
    control_flow_benchmarks,
    class_benchmarks,
    pool_benchmarks
);

criterion_main!(benches);
