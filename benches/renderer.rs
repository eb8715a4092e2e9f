use criterion::{Criterion, criterion_group, criterion_main};
use react_workflow_diagram::config::RenderConfig;
use react_workflow_diagram::render::{render_png, render_svg};
use react_workflow_diagram::theme::Theme;
use react_workflow_diagram::workflow::react_workflow;
use std::hint::black_box;

fn bench_svg(c: &mut Criterion) {
    let theme = Theme::react();
    c.bench_function("build_and_render_svg", |b| {
        b.iter(|| {
            let canvas = react_workflow(black_box(&theme)).expect("canvas");
            black_box(render_svg(&canvas, &theme))
        })
    });
}

fn bench_png(c: &mut Criterion) {
    let theme = Theme::react();
    let canvas = react_workflow(&theme).expect("canvas");
    let svg = render_svg(&canvas, &theme);
    let mut group = c.benchmark_group("png");
    group.sample_size(10);
    for dpi in [72.0f32, 300.0] {
        let render_cfg = RenderConfig {
            dpi,
            ..RenderConfig::default()
        };
        group.bench_function(format!("render_png_{dpi}dpi"), |b| {
            b.iter(|| black_box(render_png(black_box(&svg), &render_cfg, &theme).expect("png")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_svg, bench_png);
criterion_main!(benches);
