//! Routing benchmarks.
//!
//! Run with: `cargo bench --bench routing`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use radix_mux::{Handler, Method, Mux, Request, Response, Router, RoutingContext};
use std::hint::black_box;

fn build_router(num_routes: usize) -> Mux {
    let mut mux = Mux::new();
    let noop = Handler::from_fn(|_, _| {});

    for i in 0..num_routes / 3 {
        mux.handle_method(Method::GET, &format!("/api/v1/resource{i}"), noop.clone())
            .expect("static route");
        mux.handle_method(Method::GET, &format!("/api/v1/resource{i}/{{id}}"), noop.clone())
            .expect("param route");
        mux.handle_method(
            Method::GET,
            &format!("/api/v1/org/{{orgId}}/resource{i}/{{id:[0-9]+}}"),
            noop.clone(),
        )
        .expect("regexp route");
    }
    mux.handle_method(Method::GET, "/static/*", noop)
        .expect("wildcard route");

    mux
}

fn bench_match(c: &mut Criterion) {
    let mux = build_router(99);
    let cases = [
        ("static", "/api/v1/resource32"),
        ("param", "/api/v1/resource25/12345"),
        ("nested_regexp", "/api/v1/org/acme-corp/resource10/12345"),
        ("wildcard", "/static/css/site/main.css"),
        ("miss", "/api/v1/nonexistent/path"),
    ];

    let mut group = c.benchmark_group("match_route");
    for (name, path) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), path, |b, path| {
            b.iter(|| {
                let mut rctx = RoutingContext::new();
                black_box(mux.match_route(&mut rctx, Method::GET, black_box(path)))
            });
        });
    }
    group.finish();
}

fn bench_serve(c: &mut Criterion) {
    let mux = build_router(99);

    c.bench_function("serve_param", |b| {
        b.iter(|| {
            let mut req = Request::new(Method::GET, "/api/v1/resource25/12345");
            let mut resp = Response::new();
            mux.serve(&mut req, &mut resp);
            black_box(resp.status)
        });
    });
}

fn bench_route_count_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_count_scaling");

    for num_routes in [30, 150, 600] {
        let mux = build_router(num_routes);
        let path = format!("/api/v1/resource{}/42", num_routes / 6);

        group.bench_with_input(BenchmarkId::from_parameter(num_routes), &path, |b, path| {
            b.iter(|| {
                let mut rctx = RoutingContext::new();
                black_box(mux.match_route(&mut rctx, Method::GET, path))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_match, bench_serve, bench_route_count_scaling);
criterion_main!(benches);
